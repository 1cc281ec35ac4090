//! Diagnostic reporting infrastructure.
//!
//! Diagnostics are created close to the code that detects the problem via
//! the constructor functions in [`codes`] (one per stable diagnostic code),
//! then routed through a [`DiagnosticCollector`]. A collector can carry a
//! retention cap: once the cap is reached further diagnostics are counted
//! but not stored.
//!
//! A diagnostic optionally carries the processing stack active when it was
//! emitted (the outer-to-inner chain of open code, copy members, and macro
//! invocations) so that a problem inside a nested expansion can be traced
//! back to the statement that caused it.

pub mod codes;

use std::fmt;

use crate::span::{Location, Range};
use crate::symbol::Id;

/// Diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// A problem that makes the analysis result unreliable.
    Error,
    /// A suspicious construct; analysis continues normally.
    Warning,
    /// Informational message (MNOTE output, listing notes).
    Info,
    /// Low-priority hint (faded code, style notes).
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
            Severity::Hint => write!(f, "hint"),
        }
    }
}

/// One frame of the processing stack captured with a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    /// Where processing entered this frame.
    pub location: Location,
    /// What kind of member this frame expands, if any.
    pub member: Option<StackMember>,
}

/// Nested member kind of a processing-stack frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackMember {
    /// Expansion of the named macro.
    Macro(Id),
    /// Inclusion of the named copy member.
    Copy(Id),
}

/// A diagnostic message tied to a source range.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// Stable short code, e.g. `E047`.
    pub code: &'static str,
    /// Severity level.
    pub severity: Severity,
    /// File the range refers to.
    pub file: Id,
    /// Source range of the offending construct.
    pub range: Range,
    /// Human-readable message.
    pub message: String,
    /// Processing stack at emit time, outermost frame first.
    pub stack: Vec<StackFrame>,
}

impl Diagnostic {
    /// Create a diagnostic with no file or stack attached yet.
    pub fn new(
        code: &'static str,
        severity: Severity,
        range: Range,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            file: Id::EMPTY,
            range,
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Attach the file the range refers to.
    pub fn in_file(mut self, file: Id) -> Self {
        self.file = file;
        self
    }

    /// Attach the processing stack captured at emit time.
    pub fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.stack = stack;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} {}: {}",
            self.file,
            self.range.start.line + 1,
            self.range.start.column + 1,
            self.severity,
            self.code,
            self.message
        )
    }
}

/// Collects diagnostics, honoring an optional retention cap.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diags: Vec<Diagnostic>,
    limit: Option<usize>,
    suppressed: usize,
}

impl DiagnosticCollector {
    /// Create an unbounded collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector that retains at most `limit` diagnostics.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            diags: Vec::new(),
            limit: Some(limit),
            suppressed: 0,
        }
    }

    /// Add a diagnostic. Past the cap it is counted, not retained.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        match self.limit {
            Some(limit) if self.diags.len() >= limit => self.suppressed += 1,
            _ => self.diags.push(diagnostic),
        }
    }

    /// Move every diagnostic from `other` into this collector.
    pub fn absorb(&mut self, other: DiagnosticCollector) {
        for d in other.diags {
            self.add(d);
        }
        self.suppressed += other.suppressed;
    }

    /// Retained diagnostics, in emit order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    /// Consume the collector, yielding retained diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diags
    }

    /// Number of diagnostics dropped by the cap.
    pub fn suppressed_count(&self) -> usize {
        self.suppressed
    }

    /// Returns true if any retained diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of retained error diagnostics.
    pub fn error_count(&self) -> usize {
        self.diags
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Position;

    fn sample(code: &'static str, severity: Severity) -> Diagnostic {
        Diagnostic::new(code, severity, Range::point(Position::new(0, 0)), "test")
    }

    #[test]
    fn test_collector_add() {
        let mut c = DiagnosticCollector::new();
        c.add(sample("E047", Severity::Error));
        c.add(sample("W010", Severity::Warning));
        assert_eq!(c.diagnostics().len(), 2);
        assert!(c.has_errors());
        assert_eq!(c.error_count(), 1);
        assert_eq!(c.suppressed_count(), 0);
    }

    #[test]
    fn test_collector_limit() {
        let mut c = DiagnosticCollector::with_limit(2);
        for _ in 0..5 {
            c.add(sample("E049", Severity::Error));
        }
        assert_eq!(c.diagnostics().len(), 2);
        assert_eq!(c.suppressed_count(), 3);
    }

    #[test]
    fn test_collector_absorb_carries_suppressed() {
        let mut child = DiagnosticCollector::with_limit(1);
        child.add(sample("E045", Severity::Error));
        child.add(sample("E045", Severity::Error));

        let mut parent = DiagnosticCollector::new();
        parent.add(sample("E047", Severity::Error));
        parent.absorb(child);

        assert_eq!(parent.diagnostics().len(), 2);
        assert_eq!(parent.suppressed_count(), 1);
    }

    #[test]
    fn test_display_is_one_based() {
        let d = sample("E047", Severity::Error).in_file(Id::intern("A.hlasm"));
        let shown = d.to_string();
        assert!(shown.contains("A.hlasm:1:1"), "{shown}");
        assert!(shown.contains("error E047"), "{shown}");
    }
}
