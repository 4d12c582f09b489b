//! Sequential backfill driver.
//!
//! Walks the pending cursor one document at a time: embed the title, write
//! the vector back, pause. Each document resolves to an explicit
//! [`DocOutcome`] — a failure is data the loop branches on, never an abort.
//! Only setup errors (connection, cursor) escape to the caller.

use anyhow::Result;
use std::time::Duration;

use crate::embedding::Embedder;
use crate::store::{DocumentStore, PendingDoc};

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct BackfillOptions {
    /// Pause applied after each embedding call actually made, successful
    /// or not (a failed call still consumed provider request budget), and
    /// never after a title skip.
    pub delay: Duration,
    /// Cap on the number of pending documents pulled this run.
    pub limit: Option<usize>,
    /// Report the pending count and stop before embedding anything.
    pub dry_run: bool,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(200),
            limit: None,
            dry_run: false,
        }
    }
}

/// Outcome of processing one pending document.
#[derive(Debug)]
pub enum DocOutcome {
    /// Embedded and written back.
    Updated,
    /// No usable title; the embedder was never called.
    SkippedNoTitle,
    /// Embedding or write-back failed; the document is left unmodified and
    /// remains eligible for a future run.
    Failed(String),
}

/// Totals for one run. `embedded` is the count the job reports on exit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillSummary {
    pub scanned: u64,
    pub embedded: u64,
    pub skipped_no_title: u64,
    pub failed: u64,
}

/// Run the backfill and release the store connection afterwards, on the
/// success and error path alike. This is the entry point the binary uses.
pub async fn run_backfill_and_close(
    store: &dyn DocumentStore,
    embedder: &dyn Embedder,
    options: &BackfillOptions,
) -> Result<BackfillSummary> {
    let result = run_backfill(store, embedder, options).await;
    store.close().await;
    result
}

/// Run the backfill: stream pending documents and process them strictly in
/// cursor order, one at a time.
pub async fn run_backfill(
    store: &dyn DocumentStore,
    embedder: &dyn Embedder,
    options: &BackfillOptions,
) -> Result<BackfillSummary> {
    if options.dry_run {
        let pending = store.count_pending().await?;
        println!("backfill (dry-run)");
        println!("  documents missing embeddings: {}", pending);
        return Ok(BackfillSummary::default());
    }

    let mut cursor = store.pending(options.limit).await?;
    let mut summary = BackfillSummary::default();

    while let Some(doc) = cursor.try_next().await? {
        summary.scanned += 1;

        let outcome = process_document(store, embedder, &doc).await;
        match &outcome {
            DocOutcome::Updated => {
                summary.embedded += 1;
                println!("Updated document {} with embedding", doc.id);
            }
            DocOutcome::SkippedNoTitle => {
                summary.skipped_no_title += 1;
                eprintln!("Warning: document {} has no title, skipping", doc.id);
            }
            DocOutcome::Failed(message) => {
                summary.failed += 1;
                eprintln!("Error: document {}: {}", doc.id, message);
            }
        }

        // A failed call still consumed provider-side request budget, so it
        // is paced the same as a successful one.
        if !matches!(outcome, DocOutcome::SkippedNoTitle) && !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }
    }

    println!("Backfill complete: {} documents updated", summary.embedded);
    Ok(summary)
}

/// Process one document. Missing or blank titles skip without a provider
/// call; any failure after that point is captured, not propagated.
async fn process_document(
    store: &dyn DocumentStore,
    embedder: &dyn Embedder,
    doc: &PendingDoc,
) -> DocOutcome {
    let title = match doc.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return DocOutcome::SkippedNoTitle,
    };

    let vector = match embedder.embed(title).await {
        Ok(v) => v,
        Err(e) => return DocOutcome::Failed(format!("{:#}", e)),
    };

    match store.write_embedding(&doc.id, &vector).await {
        Ok(()) => DocOutcome::Updated,
        Err(e) => DocOutcome::Failed(format!("{:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PendingCursor;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use mongodb::bson::Bson;
    use std::sync::Mutex;

    fn pending(id: &str, title: Option<&str>) -> PendingDoc {
        PendingDoc {
            id: Bson::String(id.to_string()),
            title: title.map(str::to_string),
        }
    }

    struct FakeCursor {
        docs: std::vec::IntoIter<PendingDoc>,
    }

    #[async_trait]
    impl PendingCursor for FakeCursor {
        async fn try_next(&mut self) -> Result<Option<PendingDoc>> {
            Ok(self.docs.next())
        }
    }

    struct FakeStore {
        docs: Vec<PendingDoc>,
        writes: Mutex<Vec<(Bson, Vec<f32>)>>,
        fail_writes: bool,
    }

    impl FakeStore {
        fn with_docs(docs: Vec<PendingDoc>) -> Self {
            Self {
                docs,
                writes: Mutex::new(Vec::new()),
                fail_writes: false,
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn pending(&self, limit: Option<usize>) -> Result<Box<dyn PendingCursor>> {
            let mut docs = self.docs.clone();
            if let Some(n) = limit {
                docs.truncate(n);
            }
            Ok(Box::new(FakeCursor {
                docs: docs.into_iter(),
            }))
        }

        async fn count_pending(&self) -> Result<u64> {
            Ok(self.docs.len() as u64)
        }

        async fn count_embedded(&self) -> Result<u64> {
            Ok(0)
        }

        async fn write_embedding(&self, id: &Bson, vector: &[f32]) -> Result<()> {
            if self.fail_writes {
                return Err(anyhow!("write refused"));
            }
            self.writes
                .lock()
                .unwrap()
                .push((id.clone(), vector.to_vec()));
            Ok(())
        }

        async fn close(&self) {}
    }

    struct FakeEmbedder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeEmbedder {
        fn ok() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake-model"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(anyhow!("provider unavailable"))
            } else {
                Ok(vec![0.1, 0.2, 0.3])
            }
        }
    }

    fn no_delay() -> BackfillOptions {
        BackfillOptions {
            delay: Duration::ZERO,
            ..BackfillOptions::default()
        }
    }

    #[tokio::test]
    async fn test_titleless_documents_never_reach_the_provider() {
        let store = FakeStore::with_docs(vec![
            pending("a", None),
            pending("b", Some("")),
            pending("c", Some("   ")),
        ]);
        let embedder = FakeEmbedder::ok();

        let summary = run_backfill(&store, &embedder, &no_delay()).await.unwrap();

        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.embedded, 0);
        assert_eq!(summary.skipped_no_title, 3);
        assert!(embedder.calls.lock().unwrap().is_empty());
        assert!(store.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_title_is_trimmed_before_embedding() {
        let store = FakeStore::with_docs(vec![pending("a", Some("  Red Mug  "))]);
        let embedder = FakeEmbedder::ok();

        run_backfill(&store, &embedder, &no_delay()).await.unwrap();

        assert_eq!(*embedder.calls.lock().unwrap(), vec!["Red Mug"]);
    }

    #[tokio::test]
    async fn test_write_failure_is_counted_not_fatal() {
        let mut store = FakeStore::with_docs(vec![
            pending("a", Some("Red Mug")),
            pending("b", Some("Blue Pen")),
        ]);
        store.fail_writes = true;
        let embedder = FakeEmbedder::ok();

        let summary = run_backfill(&store, &embedder, &no_delay()).await.unwrap();

        assert_eq!(summary.embedded, 0);
        assert_eq!(summary.failed, 2);
        // The embedding is recomputed on a future run, not cached.
        assert_eq!(embedder.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_limit_caps_the_scan() {
        let store = FakeStore::with_docs(vec![
            pending("a", Some("one")),
            pending("b", Some("two")),
            pending("c", Some("three")),
        ]);
        let embedder = FakeEmbedder::ok();
        let options = BackfillOptions {
            limit: Some(2),
            ..no_delay()
        };

        let summary = run_backfill(&store, &embedder, &options).await.unwrap();

        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.embedded, 2);
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let store = FakeStore::with_docs(vec![pending("a", Some("Red Mug"))]);
        let embedder = FakeEmbedder::failing();
        let options = BackfillOptions {
            dry_run: true,
            ..no_delay()
        };

        let summary = run_backfill(&store, &embedder, &options).await.unwrap();

        assert_eq!(summary, BackfillSummary::default());
        assert!(embedder.calls.lock().unwrap().is_empty());
        assert!(store.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_writes_document_id_and_vector() {
        let store = FakeStore::with_docs(vec![pending("a", Some("Red Mug"))]);
        let embedder = FakeEmbedder::ok();

        run_backfill(&store, &embedder, &no_delay()).await.unwrap();

        let writes = store.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, Bson::String("a".to_string()));
        assert_eq!(writes[0].1, vec![0.1, 0.2, 0.3]);
    }
}
