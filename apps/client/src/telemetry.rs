use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Installs the fmt subscriber. `RUST_LOG` wins when set; otherwise the
/// configured level applies to this crate only.
pub fn init_tracing(config: &Config) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config)))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

fn default_filter(config: &Config) -> EnvFilter {
    EnvFilter::new(format!("skillmatch_client={}", config.rust_log))
}
