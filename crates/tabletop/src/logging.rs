//! Logging setup for the server binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 7] = [
    "tabletop",
    "tabletop_server",
    "tabletop_transport",
    "tabletop_session",
    "tabletop_room",
    "tabletop_games",
    "tabletop_timer",
];

/// The filter used when `RUST_LOG` is unset: `level` for every Tabletop
/// crate, dependencies stay at their defaults.
pub fn default_filter(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` overrides `default_level`. Calling this twice is harmless;
/// the second call leaves the first subscriber in place.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(default_level)));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
