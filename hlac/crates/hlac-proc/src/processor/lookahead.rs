//! The lookahead processor.
//!
//! A forward scan over source that resolves a forward reference without
//! committing semantic effects. Two flavors: SEQ hunts a sequence symbol
//! for AGO/AIF, ORD pre-resolves attributes of forward-referenced
//! ordinary symbols mid-expression.
//!
//! The scan records sequence-symbol definitions it passes (the manager
//! queues their redefinition diagnostics), follows COPY members, and
//! counts MACRO/MEND pairs so macro bodies are skipped structurally;
//! statements that would themselves branch are skipped, not executed.

use hlac_ctx::ordinary::SymbolAttributes;
use hlac_ctx::{AsmOpCode, HlasmContext, ResolvedOpcode};
use hlac_par::form::{
    OpCode, OperandOccurrence, ProcessingForm, ProcessingFormat, ProcessingKind, ProcessingStatus,
};
use hlac_par::mach::MachExpr;
use hlac_par::operand::{AsmOperand, Operand};
use hlac_par::statement::{Label, ResolvedStatement, Statement};
use hlac_util::span::Range;
use hlac_util::Id;

use hlac_ctx::source_ctx::{SourcePosition, SourceSnapshot};

use super::Action;

/// What the lookahead hunts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookaheadAction {
    /// A sequence symbol (AGO/AIF target).
    Seq,
    /// Attributes of forward-referenced ordinary symbols.
    Ord,
}

/// Data to launch a lookahead.
#[derive(Debug)]
pub struct LookaheadStart {
    pub action: LookaheadAction,
    /// SEQ target, or a placeholder for ORD.
    pub target: Id,
    /// ORD symbols whose attributes are wanted.
    pub targets: Vec<Id>,
    pub range: Range,
    /// Where processing resumes when the scan ends.
    pub statement_position: SourcePosition,
    pub snapshot: SourceSnapshot,
    /// ORD: the statement to replay once attributes are known.
    pub pending_statement: Option<Statement>,
}

/// Result handed to the manager when the lookahead pops.
#[derive(Debug)]
pub struct LookaheadResult {
    pub action: LookaheadAction,
    pub success: bool,
    pub target: Id,
    pub range: Range,
    pub statement_position: SourcePosition,
    pub snapshot: SourceSnapshot,
    pub pending_statement: Option<Statement>,
}

pub struct LookaheadProcessor {
    pub action: LookaheadAction,
    target: Id,
    to_find: Vec<Id>,
    range: Range,
    statement_position: SourcePosition,
    snapshot: SourceSnapshot,
    pending_statement: Option<Statement>,
    macro_nest: usize,
    success: bool,
    finished: bool,
}

impl LookaheadProcessor {
    pub fn new(start: LookaheadStart) -> Self {
        Self {
            action: start.action,
            target: start.target,
            to_find: start.targets,
            range: start.range,
            statement_position: start.statement_position,
            snapshot: start.snapshot,
            pending_statement: start.pending_statement,
            macro_nest: 0,
            success: false,
            finished: false,
        }
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn get_processing_status(
        &self,
        ctx: &HlasmContext,
        instr_name: Option<Id>,
        has_operands: bool,
    ) -> ProcessingStatus {
        // Only the statements that can define attributes (or change the
        // scan structurally) get their operands parsed; the rest is a
        // structural skip.
        let form = match instr_name.and_then(|n| ctx.find_opcode(n)) {
            Some(ResolvedOpcode::Asm(AsmOpCode::Equ))
            | Some(ResolvedOpcode::Asm(AsmOpCode::Copy))
            | Some(ResolvedOpcode::Asm(AsmOpCode::Start)) => ProcessingForm::AsmGeneric,
            Some(ResolvedOpcode::Asm(AsmOpCode::Dc))
            | Some(ResolvedOpcode::Asm(AsmOpCode::Ds))
            | Some(ResolvedOpcode::Asm(AsmOpCode::Dxd)) => ProcessingForm::Dat,
            _ => ProcessingForm::Ignored,
        };
        let occurrence = if form == ProcessingForm::Ignored || !has_operands {
            OperandOccurrence::Absent
        } else {
            OperandOccurrence::Present
        };
        ProcessingStatus::new(
            ProcessingFormat {
                kind: ProcessingKind::Lookahead,
                form,
                occurrence,
            },
            OpCode::new(instr_name.unwrap_or_default()),
        )
    }

    pub fn process_statement(
        &mut self,
        ctx: &mut HlasmContext,
        statement: Statement,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        let instr = statement
            .instruction()
            .and_then(|i| i.name())
            .map(|n| n.as_str().to_owned());

        match instr.as_deref() {
            Some("MACRO") => {
                self.macro_nest += 1;
                return actions;
            }
            Some("MEND") => {
                self.macro_nest = self.macro_nest.saturating_sub(1);
                return actions;
            }
            _ => {}
        }
        if self.macro_nest > 0 {
            return actions;
        }

        if let Some(label) = statement.label() {
            if let Some((name, range)) = label.sequence_symbol() {
                actions.push(Action::RegisterSeq { name, range });
                if self.action == LookaheadAction::Seq && name == self.target {
                    self.success = true;
                    self.finished = true;
                    return actions;
                }
            }
        }

        let Statement::Resolved(stmt) = &statement else {
            return actions;
        };

        match instr.as_deref() {
            Some("COPY") => {
                if let Some((member, range)) = super::first_asm_symbol(stmt) {
                    actions.push(Action::StartCopy {
                        name: member,
                        range,
                    });
                }
            }
            Some("END") => self.finished = true,
            _ => {
                if self.action == LookaheadAction::Ord {
                    self.try_resolve_attributes(ctx, stmt);
                }
            }
        }
        actions
    }

    /// Assign attributes when the statement defines one of the hunted
    /// symbols.
    fn try_resolve_attributes(&mut self, ctx: &mut HlasmContext, stmt: &ResolvedStatement) {
        let Label::Ord { name, .. } = &stmt.label else {
            return;
        };
        let Some(position) = self.to_find.iter().position(|t| t == name) else {
            return;
        };

        let attributes = match stmt
            .instruction
            .name()
            .and_then(|n| ctx.find_opcode(n))
        {
            Some(ResolvedOpcode::Asm(AsmOpCode::Equ)) => {
                let length = stmt
                    .operands
                    .list
                    .get(1)
                    .and_then(|op| match op {
                        Operand::Asm(AsmOperand::Expr(MachExpr::Num { value, .. })) => {
                            Some(*value as u32)
                        }
                        _ => None,
                    })
                    .unwrap_or(1);
                SymbolAttributes::with_type_and_length('U', length)
            }
            Some(ResolvedOpcode::Asm(AsmOpCode::Dc))
            | Some(ResolvedOpcode::Asm(AsmOpCode::Ds))
            | Some(ResolvedOpcode::Asm(AsmOpCode::Dxd)) => {
                match stmt.operands.list.iter().find_map(|op| match op {
                    Operand::DataDef(dd) => Some(dd),
                    _ => None,
                }) {
                    Some(dd) => {
                        let mut attrs = SymbolAttributes::with_type_and_length(
                            dd.type_char,
                            dd.length_or_implied(),
                        );
                        if let Some(MachExpr::Num { value, .. }) = &dd.scale {
                            attrs.scale = *value as i32;
                        }
                        attrs
                    }
                    None => SymbolAttributes::default(),
                }
            }
            Some(ResolvedOpcode::Asm(AsmOpCode::Csect))
            | Some(ResolvedOpcode::Asm(AsmOpCode::Dsect))
            | Some(ResolvedOpcode::Asm(AsmOpCode::Start)) => SymbolAttributes::with_type('J'),
            Some(ResolvedOpcode::Mach(instruction)) => {
                SymbolAttributes::with_type_and_length('I', instruction.length as u32)
            }
            _ => return,
        };

        ctx.ordinals.resolve_forward(*name, attributes);
        self.to_find.swap_remove(position);
        if self.to_find.is_empty() {
            self.finished = true;
            self.success = true;
        }
    }

    /// Produce the result; remaining ORD targets are pinned as undefined
    /// so the replayed statement does not trigger the lookahead again.
    pub fn end_processing(&mut self, ctx: &mut HlasmContext) -> LookaheadResult {
        if self.action == LookaheadAction::Ord {
            for name in self.to_find.drain(..) {
                ctx.ordinals
                    .resolve_forward(name, SymbolAttributes::default());
            }
        }
        LookaheadResult {
            action: self.action,
            success: self.success,
            target: self.target,
            range: self.range,
            statement_position: self.statement_position,
            snapshot: std::mem::take(&mut self.snapshot),
            pending_statement: self.pending_statement.take(),
        }
    }
}
