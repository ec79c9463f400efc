//! npm publish plugin CLI
//!
//! Publishes the package (or workspaces) in the current directory.

use anyhow::{Context, Result};
use clap::Parser;
use npm_publish_plugin::{ConfigFlags, ConfigLoader, LogSettings, OsFileSystem, PackagePublisher};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Publish NodeJS packages to an npm registry
#[derive(Parser)]
#[command(name = "npm-publish-plugin")]
#[command(version)]
#[command(about = "Publish NodeJS packages to an npm registry", long_about = None)]
struct Cli {
    #[command(flatten)]
    flags: ConfigFlags,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(settings: &LogSettings) {
    let filter = EnvFilter::builder()
        .with_default_directive(settings.level().into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // CI log viewers do not render ANSI and need wall-clock times
    if settings.ci {
        builder.with_ansi(false).init();
    } else {
        builder.compact().without_time().init();
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let fs = OsFileSystem::current_dir().context("failed to resolve the working directory")?;
    let loader = ConfigLoader::new(std::env::vars().collect(), &fs);

    let settings = loader.log_settings(&cli.flags);
    init_tracing(&settings);

    let config = loader.load(&cli.flags)?;
    info!(version = env!("CARGO_PKG_VERSION"), "npm publish plugin starting");

    let project_dir = std::env::current_dir().context("failed to resolve the working directory")?;
    let mut publisher = PackagePublisher::new(config, &project_dir)?;

    match publisher.exec().await {
        Ok(report) => {
            info!(
                published = report.published.len(),
                dry_run = report.dry_run,
                "publish run complete"
            );
            Ok(())
        }
        Err(e) => {
            for action in e.suggested_actions() {
                info!(code = e.code(), "{action}");
            }
            Err(e.into())
        }
    }
}
