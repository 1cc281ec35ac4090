//! The copy-definition processor.
//!
//! Accumulates the statements of one copy member, verifying that nested
//! MACRO/MEND pairs stay balanced, and registers the member on
//! finalization. Repeated COPY references then reuse the registered
//! statement list.

use hlac_ctx::cache::CachedStatement;
use hlac_ctx::copy_member::CopyMember;
use hlac_ctx::HlasmContext;
use hlac_par::form::{
    OpCode, OperandOccurrence, ProcessingForm, ProcessingFormat, ProcessingKind, ProcessingStatus,
};
use hlac_par::statement::{InstructionField, Statement};
use hlac_util::diagnostic::codes;
use hlac_util::span::{Location, Range};
use hlac_util::Id;

use super::Action;

pub struct CopydefProcessor {
    name: Id,
    location: Location,
    body: Vec<CachedStatement>,
    nest: usize,
    invalid: bool,
}

impl CopydefProcessor {
    pub fn new(name: Id, location: Location) -> Self {
        Self {
            name,
            location,
            body: Vec::new(),
            nest: 0,
            invalid: false,
        }
    }

    pub fn finished(&self) -> bool {
        false // runs until its provider is exhausted
    }

    pub fn get_processing_status(
        &self,
        _ctx: &HlasmContext,
        instr_name: Option<Id>,
        has_operands: bool,
    ) -> ProcessingStatus {
        ProcessingStatus::new(
            ProcessingFormat {
                kind: ProcessingKind::Copy,
                form: ProcessingForm::Deferred,
                occurrence: if has_operands {
                    OperandOccurrence::Present
                } else {
                    OperandOccurrence::Absent
                },
            },
            OpCode::new(instr_name.unwrap_or_default()),
        )
    }

    pub fn process_statement(
        &mut self,
        _ctx: &mut HlasmContext,
        statement: Statement,
    ) -> Vec<Action> {
        match statement
            .instruction()
            .and_then(InstructionField::name)
            .map(|n| n.as_str())
        {
            Some("MACRO") => self.nest += 1,
            Some("MEND") => {
                if self.nest == 0 {
                    self.invalid = true;
                } else {
                    self.nest -= 1;
                }
            }
            _ => {}
        }
        if let Statement::Deferred(base) = statement {
            self.body.push(CachedStatement::new(base));
        }
        Vec::new()
    }

    /// Register the member; unbalanced MACRO/MEND leaves it invalid with
    /// an empty body.
    pub fn end_processing(&mut self, ctx: &mut HlasmContext) {
        let invalid = self.invalid || self.nest != 0;
        if invalid {
            ctx.add_diagnostic(codes::e046(Range::point(self.location.pos)));
        }
        ctx.add_copy_member(CopyMember {
            name: self.name,
            body: if invalid {
                Vec::new()
            } else {
                std::mem::take(&mut self.body)
            },
            location: self.location,
            invalid,
        });
    }
}
