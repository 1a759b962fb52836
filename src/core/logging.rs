use tracing::metadata::LevelFilter;

pub const LOG_ENV: &str = "BBOX_LOG";

/// Installs the global fmt subscriber. Level comes from `BBOX_LOG`, INFO otherwise.
pub fn setup_logging() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LevelFilter::INFO);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
