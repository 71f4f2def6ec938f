use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// `RUST_LOG` wins over the configured level when both are set.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| anyhow!("install tracing subscriber: {err}"))
}

/// Keeps SQL in log lines readable.
pub fn truncate_sql(sql: &str) -> String {
    const MAX: usize = 200;
    if sql.chars().count() <= MAX {
        return sql.to_string();
    }
    let mut out: String = sql.chars().take(MAX).collect();
    out.push_str("...");
    out
}
