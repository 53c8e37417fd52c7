use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Calling this again after a subscriber is installed is a no-op.
pub fn init(default_filter: &str) -> Result<()> {
  let filter = match EnvFilter::try_from_default_env() {
    Ok(filter) => filter,
    Err(_) => EnvFilter::try_new(default_filter).map_err(|e| anyhow!("invalid log filter {default_filter:?}: {e}"))?,
  };

  if tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_target(false))
    .try_init()
    .is_err()
  {
    tracing::debug!("subscriber already installed");
  }
  Ok(())
}
