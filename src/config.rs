use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Runtime configuration, read once from the process environment at startup
/// and passed explicitly into the store and embedder constructors.
///
/// The four connection values are required; the rest default sensibly and
/// exist so operators can tune pacing without a rebuild.
#[derive(Debug, Clone)]
pub struct Config {
    /// `MONGODB_URI` — connection string for the deployment.
    pub mongodb_uri: String,
    /// `MONGODB_DATABASE` — target database name.
    pub database: String,
    /// `MONGODB_COLLECTION` — target collection name.
    pub collection: String,
    /// `OPENAI_API_KEY` — bearer token for the embeddings API.
    pub openai_api_key: String,
    /// `EMBEDDING_FIELD` — document field the vector is written to.
    pub embedding_field: String,
    /// `EMBEDDING_MODEL` — model identifier sent to the provider.
    pub embedding_model: String,
    /// `REQUEST_DELAY_MS` — pause between embedding calls.
    pub request_delay_ms: u64,
    /// `REQUEST_TIMEOUT_SECS` — per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

const DEFAULT_EMBEDDING_FIELD: &str = "embedding";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_REQUEST_DELAY_MS: u64 = 200;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Fails before any connection attempt if a required variable is absent
    /// or blank, naming every missing variable in the error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary lookup function.
    ///
    /// `from_env` delegates here; tests supply a map-backed closure instead
    /// of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing: Vec<&str> = Vec::new();
        let mut require = |key: &'static str| match present(&lookup, key) {
            Some(value) => value,
            None => {
                missing.push(key);
                String::new()
            }
        };

        let mongodb_uri = require("MONGODB_URI");
        let database = require("MONGODB_DATABASE");
        let collection = require("MONGODB_COLLECTION");
        let openai_api_key = require("OPENAI_API_KEY");

        if !missing.is_empty() {
            bail!(
                "incomplete configuration — missing required environment variables: {}",
                missing.join(", ")
            );
        }

        Ok(Self {
            mongodb_uri,
            database,
            collection,
            openai_api_key,
            embedding_field: present(&lookup, "EMBEDDING_FIELD")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_FIELD.to_string()),
            embedding_model: present(&lookup, "EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            request_delay_ms: parse_u64(&lookup, "REQUEST_DELAY_MS", DEFAULT_REQUEST_DELAY_MS)?,
            request_timeout_secs: parse_u64(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }

    /// Pause applied between embedding calls.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Look up a variable, treating blank values the same as absent ones.
fn present<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match present(lookup, key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, value)),
        None => Ok(default),
    }
}
