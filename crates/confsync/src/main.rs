use clap::Parser;
use confsync::{Config, Registry, SyncDriver};
use confsync_gsheets::SheetsConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let (sync, credentials) = config.into_sync_config();

    info!("Starting confsync ({:?})", sync.mode);
    info!("  From: {}", sync.source_kind);
    info!("  Source: {}", sync.source);
    info!("  Directory: {}", sync.directory.display());

    let driver = SyncDriver::new(Registry::with_defaults(SheetsConfig::default()), credentials);

    // Unrecognized sources fail here, before the directory is touched
    let report = driver.run(&sync).await?;

    for line in report.status_lines() {
        println!("{}", line);
    }

    let code = report.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
