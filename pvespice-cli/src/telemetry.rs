use tracing_subscriber::{fmt, EnvFilter};

/// Initialize stderr logging.
///
/// `RUST_LOG` wins when set; otherwise the level follows `-v` flags
/// (`warn` by default, `info` for `-v`, `debug` for `-vv` and more).
/// Stdout is left to operator progress and the final diagnostic line.
pub fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}
