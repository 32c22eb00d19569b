use clap::Parser;
use devcade_tools::config::StorageConfig;
use devcade_tools::infrastructure::storage;
use devcade_tools::services::upload::{render_listing, upload_and_list};
use dotenvy::dotenv;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upload a file to the devcade-games bucket and list its contents.
#[derive(Parser, Debug)]
#[command(name = "upload", version)]
struct Args {
    /// Path to your data
    #[arg(long)]
    path: PathBuf,

    /// Object key
    #[arg(long)]
    key: String,

    /// Print the bucket listing as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upload=info,devcade_tools=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match StorageConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let storage = storage::setup_storage(&config).await;

    match upload_and_list(&*storage, &args.path, &args.key).await {
        Ok(objects) => {
            println!("{}", render_listing(&objects, args.json)?);
            info!("✅ Done.");
            Ok(())
        }
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    }
}
