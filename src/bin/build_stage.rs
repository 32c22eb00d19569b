use clap::Parser;
use devcade_tools::config::StageConfig;
use devcade_tools::services::command::{ProcessRunner, StatusPolicy};
use devcade_tools::services::stage::run_pipeline;
use dotenvy::dotenv;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the onboard frontend and backend and stage them for the launcher.
#[derive(Parser, Debug)]
#[command(name = "build_stage", version)]
struct Args {
    /// Directory holding publish/ and publish.bak/ (default: /home/devcade)
    #[arg(long)]
    home: Option<PathBuf>,

    /// Checkout containing frontend/, backend/ and the onboard launcher
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Keep going when a build toolchain exits with a failure status
    #[arg(long)]
    ignore_build_status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "build_stage=info,devcade_tools=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Flags win over DEVCADE_HOME / DEVCADE_SOURCE_ROOT
    let from_env = StageConfig::from_env();
    let config = StageConfig::for_home(
        args.home.unwrap_or(from_env.home_dir),
        args.source_root.unwrap_or(from_env.source_root),
    );

    let policy = if args.ignore_build_status {
        StatusPolicy::Ignore
    } else {
        StatusPolicy::Enforce
    };

    info!(
        "🚀 Staging {} into {}",
        config.source_root.display(),
        config.publish_dir.display()
    );

    match run_pipeline(&config, &ProcessRunner, policy).await {
        Ok(report) => {
            for entry in &report.entries {
                info!("  {}", entry.display());
            }
            info!("✅ Build & stage finished.");
            Ok(())
        }
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    }
}
