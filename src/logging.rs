//! tracing-subscriber initialisation for the CLI.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global subscriber once. `RUST_LOG` overrides `level`; events
/// go to stderr so stdout stays reserved for program output.
pub fn init(level: &str) {
    INIT.call_once(|| {
        let env = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
        let filter = tracing_subscriber::EnvFilter::try_new(env)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    });
}
