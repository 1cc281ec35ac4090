//! Core error types shared across the analyzer.

use thiserror::Error;

/// The analysis was canceled by the host.
///
/// Cancellation always propagates to the top; partially produced results
/// must be discarded by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("analysis canceled")]
pub struct Canceled;

/// Error type for URI encoding operations.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// A `%` escape was truncated or contained non-hex digits.
    #[error("invalid percent escape at byte {0}")]
    InvalidEscape(usize),

    /// The decoded byte sequence was not valid UTF-8.
    #[error("decoded text is not valid UTF-8")]
    InvalidUtf8,
}
