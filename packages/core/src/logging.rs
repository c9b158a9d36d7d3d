use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Initialize structured logging for the application.
///
/// Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
/// takes precedence over the `verbose` default.
///
/// This must be called once at startup (in main.rs).
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!("Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_info() {
        assert_eq!(default_level(false), "info");
    }

    #[test]
    fn verbose_raises_level_to_debug() {
        assert_eq!(default_level(true), "debug");
    }
}
