//! Processing forms.
//!
//! A deferred operand field cannot be parsed until the instruction is
//! resolved; the processing format names the grammar the field is parsed
//! under once it is. The (form, occurrence) pair is the key of the
//! statement cache: reparsing the same field under the same format is a
//! pure function.

use hlac_util::Id;

/// What part of the pipeline a statement is processed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessingKind {
    Ordinary,
    Lookahead,
    Macro,
    Copy,
}

/// Grammar category of an operand field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessingForm {
    Unknown,
    Mach,
    AsmGeneric,
    AsmAlias,
    AsmEnd,
    AsmUsing,
    Mac,
    Ca,
    Dat,
    Ignored,
    Deferred,
}

/// Whether the instruction takes an operand field at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperandOccurrence {
    Present,
    Absent,
}

/// How a statement should be processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcessingFormat {
    pub kind: ProcessingKind,
    pub form: ProcessingForm,
    pub occurrence: OperandOccurrence,
}

impl ProcessingFormat {
    pub const fn new(kind: ProcessingKind, form: ProcessingForm) -> Self {
        Self {
            kind,
            form,
            occurrence: OperandOccurrence::Present,
        }
    }

    pub const fn without_operands(kind: ProcessingKind, form: ProcessingForm) -> Self {
        Self {
            kind,
            form,
            occurrence: OperandOccurrence::Absent,
        }
    }

    /// The cache key: identical (form, occurrence) means an identical
    /// reparse result for the same deferred text.
    pub fn reparse_key(&self) -> (ProcessingForm, OperandOccurrence) {
        (self.form, self.occurrence)
    }
}

/// The resolved operation code of a statement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpCode {
    pub name: Id,
}

impl OpCode {
    pub fn new(name: Id) -> Self {
        Self { name }
    }
}

/// Processing format plus resolved opcode; what a processor answers when
/// asked how to treat an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessingStatus {
    pub format: ProcessingFormat,
    pub opcode: OpCode,
}

impl ProcessingStatus {
    pub fn new(format: ProcessingFormat, opcode: OpCode) -> Self {
        Self { format, opcode }
    }
}
