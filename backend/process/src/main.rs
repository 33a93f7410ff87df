use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use process::{DEFAULT_BATCH, describe, lock_status, reindex_catalog};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the product search index from Supabase.
    Reindex {
        #[arg(long, default_value_t = DEFAULT_BATCH)]
        batch: usize,
    },
    /// Print the current storefront lock state.
    LockStatus,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match Args::parse().command {
        Command::Reindex { batch } => {
            let total = reindex_catalog(batch).await?;
            println!("Indexed Products: {total}");
        }
        Command::LockStatus => println!("{}", describe(&lock_status().await?)),
    }

    Ok(())
}
