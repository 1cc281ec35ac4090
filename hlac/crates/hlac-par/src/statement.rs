//! Structured statement model.
//!
//! A statement is first parsed in *initial mode*: label and instruction
//! fields are classified, the operand field is kept as raw text, and the
//! result is a [`DeferredStatement`]. Once the instruction resolves to a
//! processing format, the field is reparsed into typed operands and the
//! statement becomes a [`ResolvedStatement`].

use std::sync::Arc;

use hlac_util::span::Range;
use hlac_util::{Diagnostic, Id};

use crate::form::ProcessingFormat;
use crate::operand::Operands;

/// Label field of a statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Label {
    /// No label.
    Empty,
    /// An ordinary symbol.
    Ord { name: Id, range: Range },
    /// A sequence symbol, `.NAME`.
    Seq { name: Id, range: Range },
    /// A variable symbol, `&NAME` with an optional subscript text.
    Var {
        name: Id,
        subscript: Option<String>,
        range: Range,
    },
    /// Text containing variable references; resolved by substitution.
    Concat { text: String, range: Range },
}

impl Label {
    pub fn range(&self) -> Option<Range> {
        match self {
            Label::Empty => None,
            Label::Ord { range, .. }
            | Label::Seq { range, .. }
            | Label::Var { range, .. }
            | Label::Concat { range, .. } => Some(*range),
        }
    }

    /// The sequence symbol name, when the label is one.
    pub fn sequence_symbol(&self) -> Option<(Id, Range)> {
        match self {
            Label::Seq { name, range } => Some((*name, *range)),
            _ => None,
        }
    }
}

/// Instruction field of a statement.
#[derive(Clone, Debug, PartialEq)]
pub enum InstructionField {
    /// Blank instruction field (label-only or empty line).
    Empty(Range),
    /// An ordinary instruction name.
    Ord { name: Id, range: Range },
    /// Text containing variable references; resolved by substitution.
    Concat { text: String, range: Range },
}

impl InstructionField {
    pub fn range(&self) -> Range {
        match self {
            InstructionField::Empty(range) => *range,
            InstructionField::Ord { range, .. } => *range,
            InstructionField::Concat { range, .. } => *range,
        }
    }

    pub fn name(&self) -> Option<Id> {
        match self {
            InstructionField::Ord { name, .. } => Some(*name),
            _ => None,
        }
    }
}

/// A statement whose operand field has not been parsed yet.
#[derive(Clone, Debug, PartialEq)]
pub struct DeferredStatement {
    pub label: Label,
    pub instruction: InstructionField,
    /// Raw operand field text, remarks included, continuations flattened.
    pub deferred_text: String,
    /// Source range of the operand field.
    pub deferred_range: Range,
    /// Range of the whole logical line.
    pub stmt_range: Range,
}

impl DeferredStatement {
    /// True when the operand text contains variable references and must be
    /// substituted per expansion instead of served from the cache.
    pub fn needs_substitution(&self) -> bool {
        self.deferred_text.contains('&')
            || matches!(self.label, Label::Concat { .. } | Label::Var { .. })
            || matches!(self.instruction, InstructionField::Concat { .. })
    }
}

/// A statement with a fully parsed, typed operand list.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedStatement {
    pub label: Label,
    pub instruction: InstructionField,
    pub operands: Operands,
    /// Trailing remark ranges.
    pub remarks: Vec<Range>,
    /// Range of the whole logical line.
    pub stmt_range: Range,
    /// Format the operand field was parsed under.
    pub format: ProcessingFormat,
    /// Diagnostics produced by the reparse; emitted when the statement is
    /// actually processed, so a cached parse replays them deterministically.
    pub parse_diags: Vec<Diagnostic>,
}

/// A statement synthesized by a preprocessor. Opaque to the assembler
/// except for its instruction identity.
#[derive(Clone, Debug, PartialEq)]
pub struct PreprocStatement {
    pub instruction: Id,
    pub text: String,
    pub range: Range,
}

/// The structured statement handed between providers and processors.
#[derive(Clone, Debug)]
pub enum Statement {
    /// Fully parsed.
    Resolved(Arc<ResolvedStatement>),
    /// Operand field parse postponed until the processing form is known.
    Deferred(Arc<DeferredStatement>),
    /// Emitted by a preprocessor.
    Preproc(Arc<PreprocStatement>),
    /// Located but malformed; carries its parse diagnostics.
    Error {
        range: Range,
        diags: Vec<Diagnostic>,
    },
    /// Provider exhaustion sentinel.
    Eof,
}

impl Statement {
    pub fn range(&self) -> Option<Range> {
        match self {
            Statement::Resolved(s) => Some(s.stmt_range),
            Statement::Deferred(s) => Some(s.stmt_range),
            Statement::Preproc(s) => Some(s.range),
            Statement::Error { range, .. } => Some(*range),
            Statement::Eof => None,
        }
    }

    pub fn label(&self) -> Option<&Label> {
        match self {
            Statement::Resolved(s) => Some(&s.label),
            Statement::Deferred(s) => Some(&s.label),
            _ => None,
        }
    }

    pub fn instruction(&self) -> Option<&InstructionField> {
        match self {
            Statement::Resolved(s) => Some(&s.instruction),
            Statement::Deferred(s) => Some(&s.instruction),
            _ => None,
        }
    }
}
