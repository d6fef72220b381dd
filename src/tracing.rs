//! Tracing (logging)

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise tracing (logging)
///
/// Applies a filter based on the `RUST_LOG` environment variable, falling back
/// to enable info logging for this crate if not set. The active filter
/// directives are logged once so multi-rank runs can confirm which directives
/// took effect on each process.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "obsdist=info".into());
    let directives = filter.to_string();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(filter = directives.as_str(), "tracing initialised");
}
