// Tracing subscriber setup for the binaries

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `level` when set. Calling this more than once is a no-op.
pub fn init_logging(level: &str, json: bool) {
    INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

        let result = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };

        if let Err(e) = result {
            eprintln!("Logging already configured: {}", e);
        }
    });
}
