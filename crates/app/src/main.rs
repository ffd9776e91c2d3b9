use anyhow::Context;
use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use flashback_app::config::Config;
use flashback_app::runtime;
use flashback_foundation::ShutdownHandler;

fn init_logging() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "flashback.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    // Keep the appender guard alive for the process lifetime.
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = Config::parse();
    config.validate().context("invalid configuration")?;
    tracing::info!(
        "Starting flashback: pre-roll {}s, post-roll {}s, preferred rate {} Hz, output {:?}",
        config.pre_roll_secs,
        config.post_roll_secs,
        config.sample_rate,
        config.output_dir
    );

    let shutdown = ShutdownHandler::new().install().await;
    runtime::run(config, shutdown)
        .await
        .context("flashback terminated with a fatal error")?;

    Ok(())
}
