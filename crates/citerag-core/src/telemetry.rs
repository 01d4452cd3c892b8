use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global `tracing` subscriber, writing to stderr.
///
/// `verbosity` 0 honours `RUST_LOG` (falling back to `warn`); 1, 2 and 3+
/// select `info`, `debug` and `trace`. Calling it twice is harmless.
pub fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}
