pub mod error;
pub mod plates;

pub use error::EngineError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current wall-clock time as Unix milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
