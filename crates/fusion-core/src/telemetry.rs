use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// Honors `RUST_LOG` (default `info`) and switches to JSON lines when
/// `RUST_LOG_FORMAT=json`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    crate::config::load_dotenv();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if installed.is_ok() {
        tracing::debug!(json = json_logging, "Tracing initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::info!("still logging");
    }
}
