//! Logger initialization
//!
//! Leveled text lines on standard output, optionally prefixed with a timestamp.

use std::io::Write;

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `level` when it is set. Calling this more
/// than once is harmless; later calls are ignored.
///
/// # Parameters
///
/// * `level` - Default log level (error, warn, info, debug, trace)
/// * `timestamp` - Prefix every line with a millisecond timestamp
pub fn init_logger(level: &str, timestamp: bool) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    let mut builder = env_logger::Builder::from_env(env);
    builder.target(env_logger::Target::Stdout);

    if timestamp {
        builder.format_timestamp_millis();
    } else {
        builder.format(|buf, record| {
            writeln!(buf, "[{} {}] {}", record.level(), record.target(), record.args())
        });
    }

    let _ = builder.try_init();
}
