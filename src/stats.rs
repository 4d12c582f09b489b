//! Collection coverage overview.
//!
//! Quick summary of how far the backfill has converged: how many documents
//! already carry the embedding field and how many are still pending. Used
//! by `embedfill status`.

use anyhow::Result;

use crate::store::DocumentStore;

/// Query the store and print a coverage summary.
pub async fn run_status(
    store: &dyn DocumentStore,
    database: &str,
    collection: &str,
) -> Result<()> {
    let pending = store.count_pending().await?;
    let embedded = store.count_embedded().await?;
    let total = pending + embedded;

    println!("Embedding Backfill — Collection Status");
    println!("======================================");
    println!();
    println!("  Collection:  {}.{}", database, collection);
    println!();
    println!("  Documents:   {}", total);
    println!(
        "  Embedded:    {} / {} ({}%)",
        embedded,
        total,
        if total > 0 { embedded * 100 / total } else { 0 }
    );
    println!("  Pending:     {}", pending);

    Ok(())
}
