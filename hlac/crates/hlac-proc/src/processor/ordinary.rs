//! The ordinary statement processor.
//!
//! The default consumer: dispatches by opcode to machine-instruction
//! validation, assembler semantic routines, macro calls, or conditional
//! assembly. Asynchronous work (COPY activation, library macro fetches,
//! lookahead) is returned as actions for the manager.

use std::sync::Arc;

use hlac_ctx::eval::{Evaluator, MachValue};
use hlac_ctx::instruction::{CaOpCode, MachineInstruction};
use hlac_ctx::macro_def::MacroFrame;
use hlac_ctx::ordinary::{SectionKind, SymbolAttributes, SymbolValue};
use hlac_ctx::variables::{SetType, SetValue};
use hlac_ctx::{AsmOpCode, HlasmContext, ResolvedOpcode};
use hlac_par::ca::CaExpr;
use hlac_par::form::{
    OpCode, OperandOccurrence, ProcessingForm, ProcessingFormat, ProcessingKind, ProcessingStatus,
};
use hlac_par::operand::{AsmOperand, CaOperand, MacroOperand, Operand, Operands};
use hlac_par::resplit_macro_operands;
use hlac_par::scanner::{RangeProvider, Scanner};
use hlac_par::statement::{Label, ResolvedStatement, Statement};
use hlac_util::diagnostic::{codes, StackMember};
use hlac_util::span::{Location, Range};
use hlac_util::{Diagnostic, Id};

use super::{first_asm_symbol, Action};

/// Machine-instruction operand validity, consulted by the pipeline.
pub trait InstructionChecker {
    fn check(
        &self,
        instruction: &MachineInstruction,
        operands: &Operands,
        range: Range,
    ) -> Vec<Diagnostic>;
}

/// Format-level default: operand count against the static table.
#[derive(Debug, Default)]
pub struct DefaultChecker;

impl InstructionChecker for DefaultChecker {
    fn check(
        &self,
        instruction: &MachineInstruction,
        operands: &Operands,
        range: Range,
    ) -> Vec<Diagnostic> {
        let count = operands.len();
        if count < instruction.min_operands as usize {
            vec![codes::a011(instruction.name, range)]
        } else if count > instruction.max_operands as usize {
            vec![codes::a010(instruction.name, range)]
        } else {
            Vec::new()
        }
    }
}

pub struct OrdinaryProcessor {
    end_seen: bool,
    checker: Box<dyn InstructionChecker>,
}

impl OrdinaryProcessor {
    pub fn new(checker: Box<dyn InstructionChecker>) -> Self {
        Self {
            end_seen: false,
            checker,
        }
    }

    pub fn finished(&self) -> bool {
        self.end_seen
    }

    pub fn get_processing_status(
        &self,
        ctx: &HlasmContext,
        instr_name: Option<Id>,
        has_operands: bool,
    ) -> ProcessingStatus {
        let Some(name) = instr_name else {
            return super::ignored_status(None);
        };
        let occurrence = |wanted: bool| {
            if wanted && has_operands {
                OperandOccurrence::Present
            } else {
                OperandOccurrence::Absent
            }
        };
        let (form, occ) = match ctx.find_opcode(name) {
            None => (ProcessingForm::Unknown, OperandOccurrence::Present),
            Some(ResolvedOpcode::Ca(op)) => (ProcessingForm::Ca, occurrence(op.has_operands())),
            Some(ResolvedOpcode::Asm(op)) => (op.form(), occurrence(true)),
            Some(ResolvedOpcode::Mach(_)) => (ProcessingForm::Mach, occurrence(true)),
            Some(ResolvedOpcode::Macro(_)) => (ProcessingForm::Mac, occurrence(true)),
        };
        ProcessingStatus::new(
            ProcessingFormat {
                kind: ProcessingKind::Ordinary,
                form,
                occurrence: occ,
            },
            OpCode::new(name),
        )
    }

    pub fn process_statement(
        &mut self,
        ctx: &mut HlasmContext,
        statement: Statement,
    ) -> Vec<Action> {
        match statement {
            Statement::Error { diags, .. } => {
                for d in diags {
                    ctx.add_diagnostic(d);
                }
                Vec::new()
            }
            Statement::Deferred(stmt) => {
                // Unknown operation code: try the library before giving up.
                let mut actions = Vec::new();
                if let Some((name, range)) = stmt.label.sequence_symbol() {
                    actions.push(Action::RegisterSeq { name, range });
                }
                if let Some(name) = stmt.instruction.name() {
                    actions.push(Action::FetchMacro {
                        name,
                        statement: Statement::Deferred(stmt),
                    });
                }
                actions
            }
            Statement::Resolved(stmt) => self.process_resolved(ctx, stmt),
            Statement::Preproc(_) | Statement::Eof => Vec::new(),
        }
    }

    fn process_resolved(
        &mut self,
        ctx: &mut HlasmContext,
        stmt: Arc<ResolvedStatement>,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some((name, range)) = stmt.label.sequence_symbol() {
            actions.push(Action::RegisterSeq { name, range });
        }
        ctx.absorb_reparse_diags(&stmt.parse_diags);

        match stmt.format.form {
            ProcessingForm::Ca => self.process_ca(ctx, &stmt, &mut actions),
            ProcessingForm::Mach => self.process_mach(ctx, &stmt),
            ProcessingForm::Mac => self.process_macro_call(ctx, &stmt),
            ProcessingForm::AsmGeneric
            | ProcessingForm::AsmAlias
            | ProcessingForm::AsmEnd
            | ProcessingForm::AsmUsing
            | ProcessingForm::Dat
            | ProcessingForm::Ignored => self.process_asm(ctx, &stmt, &mut actions),
            ProcessingForm::Unknown | ProcessingForm::Deferred => {}
        }
        actions
    }

    // -- conditional assembly ---------------------------------------------

    fn process_ca(
        &mut self,
        ctx: &mut HlasmContext,
        stmt: &Arc<ResolvedStatement>,
        actions: &mut Vec<Action>,
    ) {
        let Some(op) = stmt
            .instruction
            .name()
            .and_then(|n| CaOpCode::from_name(n.as_str()))
        else {
            return;
        };
        match op {
            CaOpCode::Seta => self.process_set(ctx, stmt, SetType::Arith, actions),
            CaOpCode::Setb => self.process_set(ctx, stmt, SetType::Bool, actions),
            CaOpCode::Setc => self.process_set(ctx, stmt, SetType::Char, actions),
            CaOpCode::Lcla => declare_vars(ctx, stmt, SetType::Arith, false),
            CaOpCode::Lclb => declare_vars(ctx, stmt, SetType::Bool, false),
            CaOpCode::Lclc => declare_vars(ctx, stmt, SetType::Char, false),
            CaOpCode::Gbla => declare_vars(ctx, stmt, SetType::Arith, true),
            CaOpCode::Gblb => declare_vars(ctx, stmt, SetType::Bool, true),
            CaOpCode::Gblc => declare_vars(ctx, stmt, SetType::Char, true),
            CaOpCode::Anop => {}
            CaOpCode::Actr => {
                let (count, diags, _) = eval_first_num(ctx, stmt);
                for d in diags {
                    ctx.add_diagnostic(d);
                }
                if let Some(frame) = ctx.current_frame_mut() {
                    frame.branch_counter = count as i64;
                }
            }
            CaOpCode::Ago => self.process_ago(ctx, stmt, actions),
            CaOpCode::Aif => self.process_aif(ctx, stmt, actions),
            CaOpCode::Mnote => self.process_mnote(ctx, stmt),
            CaOpCode::Mexit | CaOpCode::Mend => {
                if ctx.is_in_macro() {
                    ctx.leave_macro();
                    ctx.pop_processing_frame();
                }
            }
            CaOpCode::Macro => actions.push(Action::StartMacroDef {
                location: Location::new(ctx.current_file(), stmt.stmt_range.start),
            }),
            CaOpCode::Aread => self.process_aread(ctx, stmt, actions),
        }
    }

    fn process_set(
        &mut self,
        ctx: &mut HlasmContext,
        stmt: &Arc<ResolvedStatement>,
        set_type: SetType,
        actions: &mut Vec<Action>,
    ) {
        let (name, subscript_text, label_range) = match &stmt.label {
            Label::Var {
                name,
                subscript,
                range,
            } => (*name, subscript.clone(), *range),
            _ => {
                ctx.add_diagnostic(codes::e044(stmt.stmt_range));
                return;
            }
        };

        let value_expr = first_ca_expr(stmt);
        let (result, diags, undefined) = {
            let mut ev = Evaluator::new(ctx);
            let index = subscript_text
                .as_deref()
                .and_then(|text| eval_subscript(&mut ev, text, label_range));
            let value = match value_expr {
                Some(expr) => {
                    let v = ev.eval_ca(expr);
                    let converted = match set_type {
                        SetType::Arith => SetValue::A(ev.to_num(&v, expr.range())),
                        SetType::Bool => SetValue::B(ev.to_bool(&v, expr.range())),
                        SetType::Char => SetValue::C(ev.to_str(&v)),
                    };
                    Some((index, converted))
                }
                None => None,
            };
            (value, ev.diags, ev.undefined_attr_refs)
        };

        if !undefined.is_empty() {
            // Forward-referenced attributes: suspend and retry after the
            // lookahead resolves them.
            actions.push(Action::AttrLookahead {
                symbols: undefined,
                statement: Statement::Resolved(Arc::clone(stmt)),
            });
            return;
        }
        for d in diags {
            ctx.add_diagnostic(d);
        }
        match result {
            Some((index, value)) => ctx.set_variable(name, index, value),
            None => ctx.add_diagnostic(codes::s0005(stmt.operands.range)),
        }
    }

    fn process_ago(
        &mut self,
        ctx: &mut HlasmContext,
        stmt: &Arc<ResolvedStatement>,
        actions: &mut Vec<Action>,
    ) {
        let ops = ca_operands(stmt);
        match ops.first() {
            Some(CaOperand::Seq { name, range }) => actions.push(Action::Jump {
                target: *name,
                range: *range,
            }),
            Some(CaOperand::Branch {
                condition: Some(cond),
                target,
                range,
            }) => {
                // Computed AGO: the expression selects the k-th target.
                let (k, diags, undefined) = {
                    let mut ev = Evaluator::new(ctx);
                    let v = ev.eval_ca(cond);
                    (ev.to_num(&v, cond.range()), ev.diags, ev.undefined_attr_refs)
                };
                if !undefined.is_empty() {
                    actions.push(Action::AttrLookahead {
                        symbols: undefined,
                        statement: Statement::Resolved(Arc::clone(stmt)),
                    });
                    return;
                }
                for d in diags {
                    ctx.add_diagnostic(d);
                }
                let mut targets = vec![(*target, *range)];
                for op in &ops[1..] {
                    if let CaOperand::Seq { name, range } = op {
                        targets.push((*name, *range));
                    }
                }
                if k >= 1 && (k as usize) <= targets.len() {
                    let (target, range) = targets[k as usize - 1];
                    actions.push(Action::Jump { target, range });
                }
            }
            _ => ctx.add_diagnostic(codes::a100("AGO", stmt.operands.range)),
        }
    }

    fn process_aif(
        &mut self,
        ctx: &mut HlasmContext,
        stmt: &Arc<ResolvedStatement>,
        actions: &mut Vec<Action>,
    ) {
        for op in ca_operands(stmt) {
            let CaOperand::Branch {
                condition: Some(cond),
                target,
                range,
            } = op
            else {
                ctx.add_diagnostic(codes::a100("AIF", op.range()));
                continue;
            };
            let (taken, diags, undefined) = {
                let mut ev = Evaluator::new(ctx);
                let v = ev.eval_ca(cond);
                (
                    ev.to_bool(&v, cond.range()),
                    ev.diags,
                    ev.undefined_attr_refs,
                )
            };
            if !undefined.is_empty() {
                actions.push(Action::AttrLookahead {
                    symbols: undefined,
                    statement: Statement::Resolved(Arc::clone(stmt)),
                });
                return;
            }
            for d in diags {
                ctx.add_diagnostic(d);
            }
            if taken {
                actions.push(Action::Jump {
                    target: *target,
                    range: *range,
                });
                return;
            }
        }
    }

    fn process_mnote(&mut self, ctx: &mut HlasmContext, stmt: &Arc<ResolvedStatement>) {
        let ops = ca_operands(stmt);
        let (severity, message_op) = match ops.len() {
            0 => return,
            1 => (None, ops[0]),
            _ => {
                let sev = match ops[0] {
                    CaOperand::Expr {
                        expr: CaExpr::Sym { name, .. },
                        ..
                    } if name.as_str() == "*" => None,
                    CaOperand::Expr { expr, .. } => {
                        let (v, diags, _) = {
                            let mut ev = Evaluator::new(ctx);
                            let v = ev.eval_ca(expr);
                            (ev.to_num(&v, expr.range()), ev.diags, ())
                        };
                        for d in diags {
                            ctx.add_diagnostic(d);
                        }
                        Some(v.max(0) as u32)
                    }
                    _ => None,
                };
                (sev, ops[ops.len() - 1])
            }
        };
        let text = match message_op {
            CaOperand::Expr { expr, .. } => {
                let (s, diags) = {
                    let mut ev = Evaluator::new(ctx);
                    let v = ev.eval_ca(expr);
                    (ev.to_str(&v), ev.diags)
                };
                for d in diags {
                    ctx.add_diagnostic(d);
                }
                s
            }
            _ => String::new(),
        };
        ctx.add_diagnostic(codes::mnote(severity, &text, stmt.stmt_range));
    }

    fn process_aread(
        &mut self,
        ctx: &mut HlasmContext,
        stmt: &Arc<ResolvedStatement>,
        actions: &mut Vec<Action>,
    ) {
        if !ctx.is_in_macro() {
            ctx.add_diagnostic(codes::e064(stmt.stmt_range));
            return;
        }
        let Label::Var {
            name,
            subscript,
            range,
        } = &stmt.label
        else {
            ctx.add_diagnostic(codes::e044(stmt.stmt_range));
            return;
        };
        let index = subscript.as_deref().and_then(|text| {
            let mut ev = Evaluator::new(ctx);
            eval_subscript(&mut ev, text, *range)
        });
        actions.push(Action::Aread {
            name: *name,
            subscript: index,
            range: *range,
        });
    }

    // -- assembler instructions -------------------------------------------

    fn process_asm(
        &mut self,
        ctx: &mut HlasmContext,
        stmt: &Arc<ResolvedStatement>,
        actions: &mut Vec<Action>,
    ) {
        let Some(op) = stmt
            .instruction
            .name()
            .and_then(|n| AsmOpCode::from_name(n.as_str()))
        else {
            return;
        };
        match op {
            AsmOpCode::Csect | AsmOpCode::Start => self.open_section(ctx, stmt, SectionKind::Executable, op),
            AsmOpCode::Dsect => self.open_section(ctx, stmt, SectionKind::Dummy, op),
            AsmOpCode::Equ => self.process_equ(ctx, stmt),
            AsmOpCode::Dc | AsmOpCode::Ds | AsmOpCode::Dxd => self.process_data_def(ctx, stmt),
            AsmOpCode::Copy => match first_asm_symbol(stmt) {
                Some((name, range)) => actions.push(Action::StartCopy { name, range }),
                None => ctx.add_diagnostic(codes::a100("COPY", stmt.operands.range)),
            },
            AsmOpCode::End => self.end_seen = true,
            AsmOpCode::Org => {
                let value = eval_first_mach(ctx, stmt);
                match value {
                    Some(MachValue::Abs(v)) => ctx.ordinals.set_loc_ctr(v),
                    Some(MachValue::Reloc { offset, .. }) => ctx.ordinals.set_loc_ctr(offset),
                    _ => {}
                }
            }
            AsmOpCode::Using => {
                if stmt.operands.len() < 2 {
                    ctx.add_diagnostic(codes::a011("USING", stmt.operands.range));
                }
            }
            AsmOpCode::Ainsert => self.process_ainsert(ctx, stmt, actions),
            AsmOpCode::Drop
            | AsmOpCode::Ltorg
            | AsmOpCode::Ictl
            | AsmOpCode::Alias
            | AsmOpCode::Amode
            | AsmOpCode::Rmode
            | AsmOpCode::Entry
            | AsmOpCode::Extrn
            | AsmOpCode::Wxtrn
            | AsmOpCode::Title
            | AsmOpCode::Print
            | AsmOpCode::Space
            | AsmOpCode::Eject
            | AsmOpCode::Push
            | AsmOpCode::Pop => {}
        }
    }

    fn open_section(
        &mut self,
        ctx: &mut HlasmContext,
        stmt: &Arc<ResolvedStatement>,
        kind: SectionKind,
        op: AsmOpCode,
    ) {
        let (name, range) = match &stmt.label {
            Label::Ord { name, range } => (*name, *range),
            _ => (Id::EMPTY, stmt.stmt_range),
        };
        let section = ctx.ordinals.set_section(name, kind);
        if !name.is_empty() {
            ctx.ordinals.define(
                name,
                SymbolValue::Reloc { section, offset: 0 },
                SymbolAttributes::with_type('J'),
                Location::new(ctx.current_file(), range.start),
            );
        }
        if op == AsmOpCode::Start {
            if let Some(MachValue::Abs(v)) = eval_first_mach(ctx, stmt) {
                ctx.ordinals.set_loc_ctr(v);
            }
        }
    }

    fn process_equ(&mut self, ctx: &mut HlasmContext, stmt: &Arc<ResolvedStatement>) {
        let Label::Ord { name, range } = &stmt.label else {
            if !matches!(stmt.label, Label::Empty) {
                ctx.add_diagnostic(codes::e044(stmt.stmt_range));
            }
            return;
        };

        let (value, length, diags) = {
            let mut ev = Evaluator::new(ctx);
            let exprs: Vec<_> = stmt
                .operands
                .list
                .iter()
                .filter_map(|op| match op {
                    Operand::Asm(AsmOperand::Expr(e)) => Some(e),
                    _ => None,
                })
                .collect();
            let value = exprs.first().map(|e| ev.eval_mach(e));
            let length = exprs.get(1).and_then(|e| match ev.eval_mach(e) {
                MachValue::Abs(v) if v > 0 => Some(v as u32),
                _ => None,
            });
            (value, length, ev.diags)
        };
        for d in diags {
            ctx.add_diagnostic(d);
        }

        let symbol_value = match value {
            Some(MachValue::Abs(v)) => SymbolValue::Abs(v),
            Some(MachValue::Reloc { section, offset }) => SymbolValue::Reloc { section, offset },
            _ => SymbolValue::Abs(0),
        };
        let attributes = SymbolAttributes::with_type_and_length('U', length.unwrap_or(1));
        let location = Location::new(ctx.current_file(), range.start);
        if !ctx.ordinals.define(*name, symbol_value, attributes, location) {
            ctx.add_diagnostic(codes::e031(name.as_str(), *range));
        }
    }

    fn process_data_def(&mut self, ctx: &mut HlasmContext, stmt: &Arc<ResolvedStatement>) {
        let data_ops: Vec<_> = stmt
            .operands
            .list
            .iter()
            .filter_map(|op| match op {
                Operand::DataDef(dd) => Some(dd),
                _ => None,
            })
            .collect();

        if let Label::Ord { name, range } = &stmt.label {
            if let Some(first) = data_ops.first() {
                let mut attributes = SymbolAttributes::with_type_and_length(
                    first.type_char,
                    first.length_or_implied(),
                );
                if let Some(hlac_par::mach::MachExpr::Num { value, .. }) = &first.scale {
                    attributes.scale = *value as i32;
                }
                let value = match ctx.ordinals.loc_ctr() {
                    Some((section, offset)) => SymbolValue::Reloc { section, offset },
                    None => SymbolValue::Abs(0),
                };
                let location = Location::new(ctx.current_file(), range.start);
                if !ctx.ordinals.define(*name, value, attributes, location) {
                    ctx.add_diagnostic(codes::e031(name.as_str(), *range));
                }
            }
        }

        let total: i64 = data_ops
            .iter()
            .map(|dd| {
                let dup = match &dd.dupl_factor {
                    Some(hlac_par::mach::MachExpr::Num { value, .. }) => (*value).max(0),
                    _ => 1,
                };
                dup * dd.length_or_implied() as i64
            })
            .sum();
        ctx.ordinals.advance_loc_ctr(total);
    }

    fn process_ainsert(
        &mut self,
        ctx: &mut HlasmContext,
        stmt: &Arc<ResolvedStatement>,
        actions: &mut Vec<Action>,
    ) {
        let record = stmt.operands.list.first().and_then(|op| match op {
            Operand::Asm(AsmOperand::String { value, .. }) => Some(value.clone()),
            _ => None,
        });
        let dest = stmt.operands.list.get(1).and_then(|op| match op {
            Operand::Asm(AsmOperand::Expr(hlac_par::mach::MachExpr::Sym { name, .. })) => {
                Some(name.as_str())
            }
            _ => None,
        });
        match (record, dest) {
            (Some(record), Some(dest)) if dest == "BACK" || dest == "FRONT" => {
                actions.push(Action::Ainsert {
                    record,
                    back: dest == "BACK",
                });
            }
            _ => ctx.add_diagnostic(codes::a100("AINSERT", stmt.operands.range)),
        }
    }

    // -- machine instructions ---------------------------------------------

    fn process_mach(&mut self, ctx: &mut HlasmContext, stmt: &Arc<ResolvedStatement>) {
        let Some(ResolvedOpcode::Mach(instruction)) = stmt
            .instruction
            .name()
            .and_then(|n| ctx.find_opcode(n))
        else {
            return;
        };

        if let Label::Ord { name, range } = &stmt.label {
            let value = match ctx.ordinals.loc_ctr() {
                Some((section, offset)) => SymbolValue::Reloc { section, offset },
                None => SymbolValue::Abs(0),
            };
            let attributes =
                SymbolAttributes::with_type_and_length('I', instruction.length as u32);
            let location = Location::new(ctx.current_file(), range.start);
            if !ctx.ordinals.define(*name, value, attributes, location) {
                ctx.add_diagnostic(codes::e031(name.as_str(), *range));
            }
        }

        for d in self
            .checker
            .check(instruction, &stmt.operands, stmt.operands.range)
        {
            ctx.add_diagnostic(d);
        }
        ctx.ordinals.advance_loc_ctr(instruction.length as i64);
    }

    // -- macro calls -------------------------------------------------------

    fn process_macro_call(&mut self, ctx: &mut HlasmContext, stmt: &Arc<ResolvedStatement>) {
        let Some(ResolvedOpcode::Macro(idx)) = stmt
            .instruction
            .name()
            .and_then(|n| ctx.find_opcode(n))
        else {
            return;
        };

        let mac_ops: Vec<MacroOperand> = stmt
            .operands
            .list
            .iter()
            .filter_map(|op| match op {
                Operand::Mac(m) => Some(m.clone()),
                _ => None,
            })
            .collect();
        // Substituted operands may have grown commas; re-split them.
        let mac_ops = resplit_macro_operands(&mac_ops);

        let mut frame = MacroFrame::new(idx, ctx.next_sysndx());
        let macro_name;
        {
            let def = &ctx.macros[idx];
            macro_name = def.name;
            let positional: Vec<Id> = def.positional_params().map(|p| p.name).collect();
            let mut next_positional = 0usize;
            for op in &mac_ops {
                if let Some((key, value)) = op.keyword_split() {
                    let key = Id::from_upper(key);
                    if def.keyword_param(key).is_some() {
                        frame.bindings.insert(key, value.to_owned());
                        continue;
                    }
                }
                if next_positional < positional.len() {
                    frame
                        .bindings
                        .insert(positional[next_positional], op.text.clone());
                    next_positional += 1;
                }
            }
            for param in &def.params {
                frame
                    .bindings
                    .entry(param.name)
                    .or_insert_with(|| param.default.clone().unwrap_or_default());
            }
        }

        frame.name_argument = match &stmt.label {
            Label::Ord { name, .. } => Some(name.as_str().to_owned()),
            _ => None,
        };

        ctx.push_processing_frame(
            Location::new(ctx.current_file(), stmt.stmt_range.start),
            StackMember::Macro(macro_name),
        );
        ctx.enter_macro(frame);
    }
}

// -- small helpers ----------------------------------------------------------

/// LCLx/GBLx: declare every variable-symbol operand.
fn declare_vars(
    ctx: &mut HlasmContext,
    stmt: &ResolvedStatement,
    set_type: SetType,
    global: bool,
) {
    let instr = stmt
        .instruction
        .name()
        .map(|n| n.as_str())
        .unwrap_or("LCL");
    for op in ca_operands(stmt) {
        let CaOperand::Var { var, .. } = op else {
            ctx.add_diagnostic(codes::a100(instr, op.range()));
            continue;
        };
        if global {
            ctx.declare_global(var.name, set_type);
        } else {
            ctx.declare_local(var.name, set_type);
        }
    }
}

fn ca_operands(stmt: &ResolvedStatement) -> Vec<&CaOperand> {
    stmt.operands
        .list
        .iter()
        .filter_map(|op| match op {
            Operand::Ca(ca) => Some(ca),
            _ => None,
        })
        .collect()
}

fn first_ca_expr(stmt: &ResolvedStatement) -> Option<&CaExpr> {
    stmt.operands.list.iter().find_map(|op| match op {
        Operand::Ca(CaOperand::Expr { expr, .. }) => Some(expr),
        _ => None,
    })
}

fn eval_first_mach(ctx: &HlasmContext, stmt: &ResolvedStatement) -> Option<MachValue> {
    let expr = stmt.operands.list.iter().find_map(|op| match op {
        Operand::Asm(AsmOperand::Expr(e)) => Some(e),
        _ => None,
    })?;
    let mut ev = Evaluator::new(ctx);
    Some(ev.eval_mach(expr))
}

fn eval_first_num(
    ctx: &HlasmContext,
    stmt: &ResolvedStatement,
) -> (i32, Vec<Diagnostic>, Vec<Id>) {
    let mut ev = Evaluator::new(ctx);
    let value = match first_ca_expr(stmt) {
        Some(expr) => {
            let v = ev.eval_ca(expr);
            ev.to_num(&v, expr.range())
        }
        None => 0,
    };
    (value, ev.diags, ev.undefined_attr_refs)
}

fn eval_subscript(ev: &mut Evaluator, text: &str, range: Range) -> Option<u32> {
    let provider = RangeProvider::simple(range.start);
    let mut scanner = Scanner::new(text, &provider);
    let expr = hlac_par::ca::parse_ca_expr(&mut scanner).ok()?;
    let v = ev.eval_ca(&expr);
    let n = ev.to_num(&v, range);
    (n > 0).then_some(n as u32)
}
