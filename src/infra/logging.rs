// Console + file logging.
//
//   stdout               ANSI, human readable
//   {output_dir}/run.log same events, no colour codes
//
// The default level comes from --log-level; RUST_LOG, when set,
// takes precedence. The returned guard flushes the file writer
// on drop, so main keeps it alive for the whole run.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE: &str = "run.log";

pub fn init(output_dir: &Path, level: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Cannot create output directory '{}'", output_dir.display()))?;

    let level: tracing::Level = level
        .parse()
        .with_context(|| format!("Invalid log level '{level}'"))?;

    let file_appender = tracing_appender::rolling::never(output_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(guard)
}
