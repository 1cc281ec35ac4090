//! The macro-definition processor.
//!
//! Triggered by MACRO in ordinary processing (or seeded directly when a
//! library macro file is analyzed). Accumulates statements until the
//! matching MEND, enforcing the prototype shape and counting nested
//! MACRO/MEND pairs; sequence symbols are interned by body offset as the
//! body grows. The finished definition is registered on finalization.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use hlac_ctx::cache::CachedStatement;
use hlac_ctx::macro_def::{MacroDef, MacroParam};
use hlac_ctx::{HlasmContext, ResolvedOpcode};
use hlac_par::form::{
    OpCode, OperandOccurrence, ProcessingForm, ProcessingFormat, ProcessingKind, ProcessingStatus,
};
use hlac_par::scanner::RangeProvider;
use hlac_par::statement::{InstructionField, Label, Statement};
use hlac_par::parse_prototype_params;
use hlac_util::diagnostic::codes;
use hlac_util::span::Location;
use hlac_util::Id;

use super::Action;

enum State {
    /// A library macro file: the initial MACRO statement is still ahead.
    ExpectMacro,
    /// The next statement is the prototype.
    Prototype,
    /// Accumulating the body.
    Body,
}

pub struct MacrodefProcessor {
    state: State,
    location: Location,
    name: Id,
    name_param: Option<Id>,
    params: Vec<MacroParam>,
    body: Vec<CachedStatement>,
    sequence_symbols: FxHashMap<Id, usize>,
    used_copy_members: Vec<Id>,
    /// Nested MACRO/MEND pairs inside the body.
    nest: usize,
    finished: bool,
    invalid: bool,
}

impl MacrodefProcessor {
    /// Definition opened by a MACRO statement in ordinary processing.
    pub fn new(location: Location) -> Self {
        Self {
            state: State::Prototype,
            location,
            name: Id::EMPTY,
            name_param: None,
            params: Vec::new(),
            body: Vec::new(),
            sequence_symbols: FxHashMap::default(),
            used_copy_members: Vec::new(),
            nest: 0,
            finished: false,
            invalid: false,
        }
    }

    /// Definition of a library macro file (starts before its MACRO).
    pub fn external(location: Location) -> Self {
        Self {
            state: State::ExpectMacro,
            ..Self::new(location)
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
        // Body statements stay deferred; only COPY needs its operand (the
        // member name) parsed right away.
        let is_copy = instr_name.is_some_and(|n| {
            matches!(ctx.find_opcode(n), Some(ResolvedOpcode::Asm(hlac_ctx::AsmOpCode::Copy)))
        });
        let form = if is_copy {
            ProcessingForm::AsmGeneric
        } else {
            ProcessingForm::Deferred
        };
        ProcessingStatus::new(
            ProcessingFormat {
                kind: ProcessingKind::Macro,
                form,
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
        ctx: &mut HlasmContext,
        statement: Statement,
    ) -> Vec<Action> {
        match self.state {
            State::ExpectMacro => {
                if instruction_is(&statement, "MACRO") {
                    self.state = State::Prototype;
                } else {
                    ctx.add_diagnostic(codes::e042(
                        statement.range().unwrap_or_default(),
                    ));
                    self.invalid = true;
                    self.state = State::Prototype;
                }
                Vec::new()
            }
            State::Prototype => {
                self.process_prototype(ctx, statement);
                Vec::new()
            }
            State::Body => self.process_body(ctx, statement),
        }
    }

    fn process_prototype(&mut self, ctx: &mut HlasmContext, statement: Statement) {
        self.state = State::Body;
        let Statement::Deferred(stmt) = &statement else {
            ctx.add_diagnostic(codes::e042(statement.range().unwrap_or_default()));
            self.invalid = true;
            return;
        };

        match &stmt.label {
            Label::Empty => {}
            Label::Var { name, .. } => self.name_param = Some(*name),
            Label::Ord { .. } => {}
            _ => ctx.add_diagnostic(codes::e044(stmt.stmt_range)),
        }

        match &stmt.instruction {
            InstructionField::Ord { name, .. } => self.name = *name,
            _ => {
                ctx.add_diagnostic(codes::e042(stmt.stmt_range));
                self.invalid = true;
                return;
            }
        }

        let provider = RangeProvider::simple(stmt.deferred_range.start);
        let (params, diags) = parse_prototype_params(&stmt.deferred_text, &provider);
        for d in diags {
            ctx.add_diagnostic(d);
        }
        self.params = params
            .into_iter()
            .map(|p| MacroParam {
                name: p.name,
                default: p.default,
            })
            .collect();
    }

    fn process_body(&mut self, ctx: &mut HlasmContext, statement: Statement) -> Vec<Action> {
        let mut actions = Vec::new();

        if instruction_is(&statement, "MACRO") {
            self.nest += 1;
        } else if instruction_is(&statement, "MEND") {
            if self.nest == 0 {
                // The MEND belongs to the body: expansion processes it to
                // leave the invocation frame.
                self.push_body_statement(ctx, statement);
                self.finished = true;
                return actions;
            }
            self.nest -= 1;
        } else if self.nest == 0 {
            if let Statement::Resolved(stmt) = &statement {
                if instruction_is(&statement, "COPY") {
                    if let Some((member, range)) = super::first_asm_symbol(stmt) {
                        self.used_copy_members.push(member);
                        actions.push(Action::StartCopy {
                            name: member,
                            range,
                        });
                        return actions;
                    }
                }
            }
        }

        self.push_body_statement(ctx, statement);
        actions
    }

    fn push_body_statement(&mut self, ctx: &mut HlasmContext, statement: Statement) {
        let base = match statement {
            Statement::Deferred(base) => base,
            Statement::Resolved(stmt) => {
                // Statements parsed early (COPY at nest > 0) are stored
                // back in deferred shape to keep the body uniform.
                Arc::new(hlac_par::statement::DeferredStatement {
                    label: stmt.label.clone(),
                    instruction: stmt.instruction.clone(),
                    deferred_text: String::new(),
                    deferred_range: stmt.operands.range,
                    stmt_range: stmt.stmt_range,
                })
            }
            _ => return,
        };

        if self.nest == 0 {
            if let Some((name, range)) = base.label.sequence_symbol() {
                let offset = self.body.len();
                if self.sequence_symbols.contains_key(&name) {
                    ctx.add_diagnostic(codes::e045(name.as_str(), range));
                } else {
                    self.sequence_symbols.insert(name, offset);
                }
            }
        }
        self.body.push(CachedStatement::new(base));
    }

    /// Register the finished definition; a missing MEND invalidates it.
    pub fn end_processing(&mut self, ctx: &mut HlasmContext) {
        if !self.finished {
            ctx.add_diagnostic(codes::e046(hlac_util::span::Range::point(
                self.location.pos,
            )));
            self.invalid = true;
            self.finished = true;
        }
        if self.invalid || self.name.is_empty() {
            return;
        }
        ctx.add_macro(MacroDef {
            name: self.name,
            name_param: self.name_param,
            params: std::mem::take(&mut self.params),
            body: std::mem::take(&mut self.body),
            sequence_symbols: std::mem::take(&mut self.sequence_symbols),
            location: self.location,
            used_copy_members: std::mem::take(&mut self.used_copy_members),
        });
    }
}

fn instruction_is(statement: &Statement, name: &str) -> bool {
    statement
        .instruction()
        .and_then(InstructionField::name)
        .is_some_and(|n| n.as_str() == name)
}
