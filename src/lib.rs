//! # Embedding Backfill
//!
//! A one-shot batch job that populates an embedding vector field on MongoDB
//! documents that lack one. Each eligible document's `title` is sent to the
//! OpenAI embeddings API and the resulting vector is written back onto the
//! same document.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   MongoDB    │──▶│   Backfill   │──▶│   OpenAI     │
//! │ find missing │   │   driver     │   │ /embeddings  │
//! └──────┬───────┘   └──────┬───────┘   └──────────────┘
//!        │                  │
//!        ◀── update_one ────┘
//! ```
//!
//! The driver is strictly sequential: one document is embedded and written
//! back before the next is pulled from the cursor, with a fixed pause
//! between provider calls. Per-document failures are logged and skipped;
//! only configuration and connection errors abort the run.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment-derived configuration |
//! | [`embedding`] | OpenAI embedding client |
//! | [`store`] | MongoDB access behind trait seams |
//! | [`backfill`] | The sequential driver loop |
//! | [`stats`] | Collection coverage summary |

pub mod backfill;
pub mod config;
pub mod embedding;
pub mod stats;
pub mod store;
