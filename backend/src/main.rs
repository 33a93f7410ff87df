#[tokio::main]
async fn main() {
    #[cfg(feature = "reindex")]
    {
        match process::reindex_catalog(process::DEFAULT_BATCH).await {
            Ok(total) => println!("Reindexed {total} products"),
            Err(e) => eprintln!("Reindex failed, serving the existing index: {e:#}"),
        }
    }

    server::start_server().await;
}
