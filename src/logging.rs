use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Result;

/// Send logs to `path`. The terminal belongs to the UI, so nothing goes to
/// stdout. The level comes from `RUST_LOG` and defaults to `info`.
pub fn setup_logging(path: &Path) -> Result<()> {
    let log_file = OpenOptions::new().create(true).append(true).open(path)?;

    let file_log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_log)
        .init();
    Ok(())
}
