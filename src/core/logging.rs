use tracing::metadata::LevelFilter;

pub const LOG_ENV: &str = "ONNX_HUB_LOG";

/// Installs a compact fmt subscriber at the level named by `ONNX_HUB_LOG`
/// (default INFO). Does nothing if a global subscriber is already set.
pub fn init_logging() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LevelFilter::INFO);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
