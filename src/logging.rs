//! Logging setup for the driver. The library only emits events.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a stderr subscriber.
///
/// `verbosity` 0 keeps `RUST_LOG` (default `warn`), 1 forces DEBUG and 2 or
/// more TRACE for this crate.
pub fn init(verbosity: u8) {
  let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  let level = match verbosity {
    0 => None,
    1 => Some(Level::DEBUG),
    _ => Some(Level::TRACE),
  };
  if let Some(level) = level
    && let Ok(directive) = format!("keic={level}").parse()
  {
    filter = filter.add_directive(directive);
  }

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
    .init();
}
