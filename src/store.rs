//! Document store access.
//!
//! [`DocumentStore`] and [`PendingCursor`] are the seams between the driver
//! and MongoDB, so the loop can be exercised against in-memory fakes. The
//! pending query filters at the store level (`$exists: false`) and streams
//! results through a cursor — the collection may be large and is never
//! materialized client-side.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Collection, Cursor};
use serde::Deserialize;

use crate::config::Config;

/// A document eligible for backfill: its id plus the embedding input text.
///
/// `_id` is carried as an opaque [`Bson`] value rather than an `ObjectId`
/// so collections keyed by strings or numbers round-trip unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct PendingDoc {
    #[serde(rename = "_id")]
    pub id: Bson,
    #[serde(default)]
    pub title: Option<String>,
}

/// Lazy pull-based iteration over pending documents. Finite per run, not
/// re-entrant.
#[async_trait]
pub trait PendingCursor: Send {
    /// Pull the next pending document, or `None` when exhausted.
    async fn try_next(&mut self) -> Result<Option<PendingDoc>>;
}

/// Store operations the backfill driver needs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a cursor over documents missing the embedding field, optionally
    /// capped at `limit` documents.
    async fn pending(&self, limit: Option<usize>) -> Result<Box<dyn PendingCursor>>;

    /// Count documents still missing the embedding field.
    async fn count_pending(&self) -> Result<u64>;

    /// Count documents that already carry the embedding field.
    async fn count_embedded(&self) -> Result<u64>;

    /// Set the embedding field on one document, matched by id. No other
    /// field is touched.
    async fn write_embedding(&self, id: &Bson, vector: &[f32]) -> Result<()>;

    /// Release the underlying connection. Invoked exactly once per command,
    /// on the success and error path alike.
    async fn close(&self);
}

/// MongoDB-backed [`DocumentStore`].
pub struct MongoStore {
    client: Client,
    collection: Collection<PendingDoc>,
    embedding_field: String,
}

impl MongoStore {
    /// Connect to the deployment and verify it is reachable with a `ping`.
    /// A failure here is fatal to the whole run.
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = Client::with_uri_str(&config.mongodb_uri)
            .await
            .context("invalid MongoDB connection string")?;

        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .context("could not connect to MongoDB")?;

        let collection = database.collection::<PendingDoc>(&config.collection);

        Ok(Self {
            client,
            collection,
            embedding_field: config.embedding_field.clone(),
        })
    }

    fn pending_filter(&self) -> Document {
        let field = self.embedding_field.as_str();
        doc! { field: { "$exists": false } }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn pending(&self, limit: Option<usize>) -> Result<Box<dyn PendingCursor>> {
        let mut find = self.collection.find(self.pending_filter());
        if let Some(n) = limit {
            find = find.limit(n as i64);
        }
        let cursor = find.await.context("pending query failed")?;
        Ok(Box::new(MongoPendingCursor { cursor }))
    }

    async fn count_pending(&self) -> Result<u64> {
        self.collection
            .count_documents(self.pending_filter())
            .await
            .context("failed to count pending documents")
    }

    async fn count_embedded(&self) -> Result<u64> {
        let field = self.embedding_field.as_str();
        self.collection
            .count_documents(doc! { field: { "$exists": true } })
            .await
            .context("failed to count embedded documents")
    }

    async fn write_embedding(&self, id: &Bson, vector: &[f32]) -> Result<()> {
        // BSON arrays have no f32 element type; widen on write.
        let values: Vec<f64> = vector.iter().map(|&v| f64::from(v)).collect();
        let field = self.embedding_field.as_str();
        self.collection
            .update_one(
                doc! { "_id": id.clone() },
                doc! { "$set": { field: values } },
            )
            .await
            .with_context(|| format!("failed to write embedding for document {}", id))?;
        Ok(())
    }

    async fn close(&self) {
        // Client handles are reference-counted; shutting down a clone
        // shuts down the shared pool.
        self.client.clone().shutdown().await;
    }
}

struct MongoPendingCursor {
    cursor: Cursor<PendingDoc>,
}

#[async_trait]
impl PendingCursor for MongoPendingCursor {
    async fn try_next(&mut self) -> Result<Option<PendingDoc>> {
        TryStreamExt::try_next(&mut self.cursor)
            .await
            .context("failed to read next pending document")
    }
}
