use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use wser_scraper::config::Config;
use wser_scraper::observability::logging::init_logging;
use wser_scraper::pipeline::{self, IngestContext};
use wser_scraper::sources::SkipPolicy;

#[derive(Parser)]
#[command(name = "wser-scraper")]
#[command(about = "Scrapes historical race data into normalized JSON documents")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a range of years
    Ingest {
        /// First year to ingest
        #[arg(long)]
        from: i32,
        /// Last year to ingest (defaults to the upcoming race year)
        #[arg(long)]
        to: Option<i32>,
        /// Regenerate documents even when cached
        #[arg(long)]
        force: bool,
    },
    /// Ingest a single year
    Year {
        year: i32,
        /// Regenerate documents even when cached
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    init_logging();

    let config = Config::from_env();
    let policy = SkipPolicy::default();
    let upcoming = policy.upcoming_year;
    let ctx = Arc::new(IngestContext::new(config, policy)?);

    match cli.command {
        Commands::Ingest { from, to, force } => {
            let to = to.unwrap_or(upcoming);
            info!("🕷️ ingesting years {from}..={to}");
            pipeline::ingest(ctx, from, to, force).await?;
            info!("✅ ingestion complete for years {from}..={to}");
        }
        Commands::Year { year, force } => {
            info!("🕷️ ingesting year {year}");
            pipeline::ingest(ctx, year, year, force).await?;
            info!("✅ ingestion complete for year {year}");
        }
    }

    Ok(())
}
