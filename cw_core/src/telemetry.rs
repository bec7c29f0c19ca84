use std::sync::Once;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the global tracing subscriber; later calls are no-ops.
///
/// Production gets JSON lines so the per-frame fields stay machine
/// readable; everything else gets pretty output. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_tracing(env: &str, service: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);
        if env == "production" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }

        tracing::info!(service = %service, env = %env, "Tracing initialized");
    });
}
