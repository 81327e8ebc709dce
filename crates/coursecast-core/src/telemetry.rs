use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with an env-filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "coursecast=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("Tracing initialized");
}
