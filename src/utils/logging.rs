//! Logging setup.
//!
//! `roomcast` logs through `tracing` with structured fields (`connection`,
//! `chat_id`, `subject_id`). The binary installs a plain fmt subscriber at the
//! level named by `logging.level`; embedding applications that already own a
//! subscriber can skip [`init`] entirely.

use tracing::Level;

/// Map a configured level name onto a `tracing` level. Unknown names fall
/// back to `INFO`.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" | "warning" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Install the global fmt subscriber.
///
/// Uses `try_init` so tests and libraries can call this multiple times
/// without panicking.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(parse_level(level))
        .with_target(false)
        .try_init();
}
