use tracing_subscriber::EnvFilter;

/// Level for a `-v` count, starting from `base` when no flag is given.
pub fn level_for(verbose: u8, base: &str) -> String {
    match verbose {
        0 => base.to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the stderr subscriber. `RUST_LOG` overrides `level`.
pub fn init(level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}
