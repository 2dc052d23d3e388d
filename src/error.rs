use thiserror::Error;

/// Rejections surfaced to the caller. Upstream trouble never lands here; it
/// degrades the result instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActivityError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid time window: start {start} is after end {end}")]
    InvalidWindow { start: u64, end: u64 },
}
