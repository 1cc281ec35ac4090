//! Statement processors.
//!
//! Six processor kinds consume statements: ordinary (the default),
//! macro-definition, copy-definition, lookahead, preprocessor, and the
//! empty sink. They form a tagged variant dispatched statically; each
//! carries only its own state.
//!
//! A processor answers `get_processing_status` so the provider knows how
//! to reparse a deferred operand field, consumes the statement in
//! `process_statement`, and returns [`Action`]s for everything that needs
//! the manager (pushing processors, branching, library fetches). When the
//! manager pops a processor, `end_processing` runs its finalization.

pub mod copydef;
pub mod lookahead;
pub mod macrodef;
pub mod ordinary;

use hlac_ctx::fade::{FadeMessage, FadeReason};
use hlac_ctx::HlasmContext;
use hlac_par::form::{
    OpCode, OperandOccurrence, ProcessingForm, ProcessingFormat, ProcessingKind, ProcessingStatus,
};
use hlac_par::statement::Statement;
use hlac_util::span::{Location, Range};
use hlac_util::Id;

use crate::provider::ProviderKind;

pub use copydef::CopydefProcessor;
pub use lookahead::{LookaheadAction, LookaheadProcessor, LookaheadResult, LookaheadStart};
pub use macrodef::MacrodefProcessor;
pub use ordinary::{DefaultChecker, InstructionChecker, OrdinaryProcessor};

/// Work a processor hands back to the manager.
#[derive(Debug)]
pub enum Action {
    /// A MACRO statement opens a macro definition.
    StartMacroDef { location: Location },
    /// COPY of the named member.
    StartCopy { name: Id, range: Range },
    /// Taken AGO/AIF branch to a sequence symbol.
    Jump { target: Id, range: Range },
    /// A sequence symbol label to register in open code.
    RegisterSeq { name: Id, range: Range },
    /// Statement needs attributes of undefined symbols; launch an
    /// attribute lookahead and replay the statement afterwards.
    AttrLookahead {
        symbols: Vec<Id>,
        statement: Statement,
    },
    /// Unknown opcode; try fetching it as a library macro, then replay.
    FetchMacro { name: Id, statement: Statement },
    /// AINSERT a record into the open-code input.
    Ainsert { record: String, back: bool },
    /// AREAD the next input record into a SET variable.
    Aread {
        name: Id,
        subscript: Option<u32>,
        range: Range,
    },
    /// Feed a statement (back) to the top processor.
    Reprocess(Statement),
}

/// Outcome of a processor's finalization.
pub enum FinishOutcome {
    None,
    Lookahead(LookaheadResult),
}

/// The processor variants.
pub enum Processor {
    Ordinary(OrdinaryProcessor),
    MacroDef(MacrodefProcessor),
    CopyDef(CopydefProcessor),
    Lookahead(LookaheadProcessor),
    Preprocessor(PreprocessorProcessor),
    Empty(EmptyProcessor),
}

impl Processor {
    pub fn kind(&self) -> ProcessingKind {
        match self {
            Processor::Ordinary(_) | Processor::Preprocessor(_) | Processor::Empty(_) => {
                ProcessingKind::Ordinary
            }
            Processor::MacroDef(_) => ProcessingKind::Macro,
            Processor::CopyDef(_) => ProcessingKind::Copy,
            Processor::Lookahead(_) => ProcessingKind::Lookahead,
        }
    }

    /// How should a statement with this instruction be reparsed?
    pub fn get_processing_status(
        &self,
        ctx: &HlasmContext,
        instr_name: Option<Id>,
        has_operands: bool,
    ) -> ProcessingStatus {
        match self {
            Processor::Ordinary(p) => p.get_processing_status(ctx, instr_name, has_operands),
            Processor::MacroDef(p) => p.get_processing_status(ctx, instr_name, has_operands),
            Processor::CopyDef(p) => p.get_processing_status(ctx, instr_name, has_operands),
            Processor::Lookahead(p) => p.get_processing_status(ctx, instr_name, has_operands),
            Processor::Preprocessor(_) | Processor::Empty(_) => ignored_status(instr_name),
        }
    }

    pub fn process_statement(
        &mut self,
        ctx: &mut HlasmContext,
        statement: Statement,
    ) -> Vec<Action> {
        match self {
            Processor::Ordinary(p) => p.process_statement(ctx, statement),
            Processor::MacroDef(p) => p.process_statement(ctx, statement),
            Processor::CopyDef(p) => p.process_statement(ctx, statement),
            Processor::Lookahead(p) => p.process_statement(ctx, statement),
            Processor::Preprocessor(p) => p.process_statement(ctx, statement),
            Processor::Empty(_) => Vec::new(),
        }
    }

    /// Does exhaustion of this provider end the processor?
    pub fn terminal_condition(&self, provider: ProviderKind) -> bool {
        match self {
            Processor::Ordinary(_) => provider == ProviderKind::Opencode,
            Processor::MacroDef(_) | Processor::CopyDef(_) | Processor::Lookahead(_) => {
                provider == ProviderKind::Opencode
            }
            Processor::Preprocessor(_) => provider == ProviderKind::Preprocessor,
            Processor::Empty(_) => true,
        }
    }

    pub fn finished(&self) -> bool {
        match self {
            Processor::Ordinary(p) => p.finished(),
            Processor::MacroDef(p) => p.finished(),
            Processor::CopyDef(p) => p.finished(),
            Processor::Lookahead(p) => p.finished(),
            Processor::Preprocessor(_) | Processor::Empty(_) => false,
        }
    }

    pub fn end_processing(&mut self, ctx: &mut HlasmContext) -> FinishOutcome {
        match self {
            Processor::MacroDef(p) => {
                p.end_processing(ctx);
                FinishOutcome::None
            }
            Processor::CopyDef(p) => {
                p.end_processing(ctx);
                FinishOutcome::None
            }
            Processor::Lookahead(p) => FinishOutcome::Lookahead(p.end_processing(ctx)),
            _ => FinishOutcome::None,
        }
    }
}

/// First plain-symbol assembler operand of a statement (COPY member
/// names, END language fields).
pub(crate) fn first_asm_symbol(
    stmt: &hlac_par::statement::ResolvedStatement,
) -> Option<(Id, Range)> {
    use hlac_par::operand::{AsmOperand, Operand};
    stmt.operands.list.iter().find_map(|op| match op {
        Operand::Asm(AsmOperand::Expr(hlac_par::mach::MachExpr::Sym { name, range })) => {
            Some((*name, *range))
        }
        _ => None,
    })
}

/// Status for statements nobody parses: empty operand list, no re-lex.
pub(crate) fn ignored_status(instr_name: Option<Id>) -> ProcessingStatus {
    ProcessingStatus::new(
        ProcessingFormat {
            kind: ProcessingKind::Ordinary,
            form: ProcessingForm::Ignored,
            occurrence: OperandOccurrence::Absent,
        },
        OpCode::new(instr_name.unwrap_or_default()),
    )
}

/// The sink at top-level termination: swallows everything after END.
#[derive(Debug, Default)]
pub struct EmptyProcessor;

/// Consumes statements synthesized by a preprocessor. A synthesized COPY
/// queues member injection (activated once every synthesized statement
/// is consumed); everything else only produces a fade record.
#[derive(Debug, Default)]
pub struct PreprocessorProcessor {
    pending_copies: Vec<(Id, Range)>,
}

impl PreprocessorProcessor {
    pub fn process_statement(
        &mut self,
        ctx: &mut HlasmContext,
        statement: Statement,
    ) -> Vec<Action> {
        let Statement::Preproc(stmt) = statement else {
            return Vec::new();
        };
        ctx.fade_messages.push(FadeMessage::new(
            ctx.current_file(),
            stmt.range,
            FadeReason::Preprocessor,
        ));
        if stmt.instruction == Id::intern("COPY") {
            let member = stmt.text.trim();
            if !member.is_empty() {
                self.pending_copies
                    .push((Id::from_upper(member), stmt.range));
            }
        }
        Vec::new()
    }

    /// Member activations queued while consuming synthesized statements.
    pub fn take_pending_copies(&mut self) -> Vec<(Id, Range)> {
        std::mem::take(&mut self.pending_copies)
    }
}
