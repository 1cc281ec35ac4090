//! Fade messages.
//!
//! Some analysis outcomes are not diagnostics but editor hints that a
//! region of source is inactive: statements consumed by a preprocessor,
//! macro definitions never called, branches never taken.

use hlac_util::span::Range;
use hlac_util::Id;

/// Why a region faded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeReason {
    /// The statement was consumed by a preprocessor.
    Preprocessor,
    /// The macro defined here was never called.
    UnusedMacro,
    /// Conditional-assembly processing never reached this statement.
    InactiveBranch,
}

/// One faded source region.
#[derive(Clone, Debug, PartialEq)]
pub struct FadeMessage {
    pub file: Id,
    pub range: Range,
    pub reason: FadeReason,
}

impl FadeMessage {
    pub fn new(file: Id, range: Range, reason: FadeReason) -> Self {
        Self { file, range, reason }
    }
}
