//! hlac-util - Core Utilities and Foundation Types
//!
//! This crate provides the foundation types shared by every phase of the
//! analyzer: source positions and ranges, interned identifiers, diagnostics
//! with processing-stack context, typed arenas, instruction-set versions,
//! cooperative cancellation, and URI encoding helpers.
//!
//! Everything here is deliberately leaf-level: no module in this crate knows
//! anything about tokens, statements, or the processing pipeline.

pub mod cancel;
pub mod diagnostic;
pub mod encoding;
pub mod error;
pub mod index_vec;
pub mod instr_set;
pub mod span;
pub mod symbol;

pub use cancel::CancellationToken;
pub use diagnostic::{Diagnostic, DiagnosticCollector, Severity, StackFrame, StackMember};
pub use error::Canceled;
pub use index_vec::{Arena, Idx};
pub use instr_set::InstructionSetVersion;
pub use span::{Location, Position, Range};
pub use symbol::Id;
