//! # Batch Jobs
//!
//! Maintenance work that runs outside the request path.
//!
//! ## Reindex
//! The search index is a derived copy of the `products` table. Writes through the
//! admin API keep it in sync, but a failed sync only logs. Reindexing pulls every
//! product from Supabase, drops documents whose product is gone and replaces the
//! rest in batches.
//!
//! - Effective prices are computed at reindex time, so a promo that started or
//!   ended since the last product write is picked up here
//! - Inactive products are indexed too and filtered out at query time
//!
//! ## Lock Status
//! Prints what the storefront would answer on `/site/status` right now, read
//! straight from Supabase without the Redis cache.
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};

use server::{
    catalog::fetch_all_products,
    config::Config,
    search::{delete_products, indexed_product_ids, init_meilisearch, stale_ids, upsert_products},
    site_lock::{LockReason, LockStatus, evaluate, fetch_settings},
    supabase::Supabase,
};

pub const DEFAULT_BATCH: usize = 200;

pub async fn reindex_catalog(batch: usize) -> Result<usize> {
    let config = Config::load();
    let supabase = Supabase::new(&config.supabase_url, &config.supabase_key)?;
    let meili_client = init_meilisearch(&config.meili_url, &config.meili_key)
        .await
        .context("Failed to connect to Meilisearch")?;

    let products = fetch_all_products(&supabase)
        .await
        .context("Failed to load products")?;

    println!("Loaded Products: {}\n", products.len());

    let indexed = indexed_product_ids(&meili_client)
        .await
        .context("Failed to list indexed products")?;
    let stale = stale_ids(&indexed, &products);

    delete_products(&meili_client, &stale)
        .await
        .context("Failed to drop deleted products")?;
    println!("Dropped Stale Documents: {}\n", stale.len());

    let batch = batch.max(1);
    let pb = ProgressBar::new(products.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    for chunk in products.chunks(batch) {
        pb.set_message(format!("Indexing {} products", chunk.len()));

        upsert_products(&meili_client, chunk)
            .await
            .context("Failed to upsert batch")?;

        #[cfg(feature = "verbose")]
        println!("Indexed ids {:?}", chunk.iter().map(|p| p.id).collect::<Vec<_>>());

        pb.inc(chunk.len() as u64);
    }

    pb.finish_with_message("Done");
    Ok(products.len())
}

pub async fn lock_status() -> Result<LockStatus> {
    let config = Config::load();
    let supabase = Supabase::new(&config.supabase_url, &config.supabase_key)?;

    let settings = fetch_settings(&supabase, config.site_lock_day)
        .await
        .context("Failed to load site settings")?;

    Ok(evaluate(&settings, Utc::now()))
}

pub fn describe(status: &LockStatus) -> String {
    let mut lines = vec![format!("Now (WIB): {}", status.now_wib.format("%Y-%m-%d %H:%M:%S"))];

    lines.push(match status.reason {
        Some(LockReason::Manual) => "Locked: manual".to_string(),
        Some(LockReason::Scheduled) => "Locked: scheduled".to_string(),
        None => "Open".to_string(),
    });

    if status.locked {
        lines.push(format!("Message: {}", status.message));
    }

    match (&status.next_lock_at, &status.countdown) {
        (Some(at), Some(countdown)) => lines.push(format!(
            "Next lock: {} (in {countdown})",
            at.format("%Y-%m-%d %H:%M")
        )),
        _ => lines.push("Next lock: none scheduled".to_string()),
    }

    lines.join("\n")
}
