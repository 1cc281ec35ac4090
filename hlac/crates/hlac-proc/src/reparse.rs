//! Deferred statement resolution.
//!
//! Providers run every deferred statement through this step before
//! handing it to a processor: variable references in the label,
//! instruction, and operand text are substituted, then the operand field
//! is reparsed under the processing format the current processor
//! selected. Statements without substitutions are served from (and
//! inserted into) the per-statement cache by the caller.
//!
//! Reparse diagnostics go through a child collector anchored to the
//! parent statement; they are stored with the resolved statement and
//! released (with file and processing stack attached) when the statement
//! is actually processed.

use hlac_ctx::eval::Evaluator;
use hlac_ctx::HlasmContext;
use hlac_par::scanner::RangeProvider;
use hlac_par::statement::{DeferredStatement, InstructionField, Label, ResolvedStatement};
use hlac_par::{classify_label, parse_operand_field, ProcessingStatus};
use hlac_util::span::Range;
use hlac_util::{Diagnostic, DiagnosticCollector, Id};

/// Instructions whose variable-symbol label is an assignment target and
/// must not be substituted away.
fn label_is_assignment_target(status: &ProcessingStatus) -> bool {
    matches!(
        status.opcode.name.as_str(),
        "SETA" | "SETB" | "SETC" | "AREAD"
    )
}

/// A reparse diagnostic without a usable position is anchored to the
/// parent statement's operand field.
fn anchored(mut diagnostic: Diagnostic, parent: Range) -> Diagnostic {
    if diagnostic.range == Range::default() {
        diagnostic.range = parent;
    }
    diagnostic
}

/// Resolve one deferred statement under `status`.
pub fn resolve_deferred(
    ctx: &mut HlasmContext,
    base: &DeferredStatement,
    status: &ProcessingStatus,
) -> ResolvedStatement {
    ctx.metrics.reparsed_statements += 1;

    let mut child = DiagnosticCollector::new();
    let needs_substitution = base.needs_substitution();

    let (label, instruction, text) = if needs_substitution {
        let mut evaluator = Evaluator::new(ctx);

        let label = match &base.label {
            Label::Concat { text, range } => {
                let substituted = evaluator.substitute(text, *range);
                classify_label(&substituted, *range)
            }
            Label::Var { name, range, .. } if !label_is_assignment_target(status) => {
                let substituted = evaluator.substitute(&format!("&{name}"), *range);
                classify_label(&substituted, *range)
            }
            other => other.clone(),
        };

        let instruction = match &base.instruction {
            InstructionField::Concat { text, range } => {
                let substituted = evaluator.substitute(text, *range);
                InstructionField::Ord {
                    name: Id::from_upper(substituted.trim()),
                    range: *range,
                }
            }
            other => other.clone(),
        };

        let text = if base.deferred_text.contains('&') {
            evaluator.substitute(&base.deferred_text, base.deferred_range)
        } else {
            base.deferred_text.clone()
        };

        for d in evaluator.diags.drain(..) {
            child.add(anchored(d, base.deferred_range));
        }
        (label, instruction, text)
    } else {
        (
            base.label.clone(),
            base.instruction.clone(),
            base.deferred_text.clone(),
        )
    };

    let provider = RangeProvider::simple(base.deferred_range.start);
    let parsed = parse_operand_field(&text, &provider, status);
    for d in parsed.diags {
        child.add(anchored(d, base.deferred_range));
    }

    ResolvedStatement {
        label,
        instruction,
        operands: parsed.operands,
        remarks: parsed.remarks,
        stmt_range: base.stmt_range,
        format: status.format,
        parse_diags: child.into_diagnostics(),
    }
}

/// The instruction name of a deferred statement, substituting variable
/// references when the field is a concatenation.
pub fn resolve_instruction_name(
    ctx: &HlasmContext,
    instruction: &InstructionField,
) -> Option<Id> {
    match instruction {
        InstructionField::Empty(_) => None,
        InstructionField::Ord { name, .. } => Some(*name),
        InstructionField::Concat { text, range } => {
            let mut evaluator = Evaluator::new(ctx);
            let substituted = evaluator.substitute(text, *range);
            let trimmed = substituted.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Id::from_upper(trimmed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlac_ctx::variables::SetValue;
    use hlac_ctx::CtxOptions;
    use hlac_par::form::{
        OpCode, ProcessingForm, ProcessingFormat, ProcessingKind,
    };
    use hlac_par::operand::Operand;
    use hlac_util::span::Range;

    fn ctx() -> HlasmContext {
        HlasmContext::new(Id::intern("rp.hlasm"), CtxOptions::default())
    }

    fn deferred(label: Label, instr: &str, text: &str) -> DeferredStatement {
        DeferredStatement {
            label,
            instruction: InstructionField::Ord {
                name: Id::from_upper(instr),
                range: Range::default(),
            },
            deferred_text: text.to_owned(),
            deferred_range: Range::default(),
            stmt_range: Range::default(),
        }
    }

    fn status(form: ProcessingForm, opcode: &str) -> ProcessingStatus {
        ProcessingStatus::new(
            ProcessingFormat::new(ProcessingKind::Ordinary, form),
            OpCode::new(Id::from_upper(opcode)),
        )
    }

    #[test]
    fn test_substituted_operand_reparse() {
        let mut c = ctx();
        c.set_variable(Id::intern("OP"), None, SetValue::C("2".to_owned()));
        let stmt = deferred(Label::Empty, "LR", "1,&OP");
        let resolved = resolve_deferred(&mut c, &stmt, &status(ProcessingForm::Mach, "LR"));
        assert!(resolved.parse_diags.is_empty(), "{:?}", resolved.parse_diags);
        assert_eq!(resolved.operands.len(), 2);
        assert_eq!(c.metrics.reparsed_statements, 1);
    }

    #[test]
    fn test_var_label_substituted_for_equ() {
        let mut c = ctx();
        c.set_variable(Id::intern("OP"), None, SetValue::C("X".to_owned()));
        let stmt = DeferredStatement {
            label: Label::Var {
                name: Id::intern("OP"),
                subscript: None,
                range: Range::default(),
            },
            instruction: InstructionField::Ord {
                name: Id::intern("EQU"),
                range: Range::default(),
            },
            deferred_text: "1".to_owned(),
            deferred_range: Range::default(),
            stmt_range: Range::default(),
        };
        let resolved =
            resolve_deferred(&mut c, &stmt, &status(ProcessingForm::AsmGeneric, "EQU"));
        assert!(
            matches!(resolved.label, Label::Ord { name, .. } if name.as_str() == "X"),
            "{:?}",
            resolved.label
        );
    }

    #[test]
    fn test_var_label_kept_for_set() {
        let mut c = ctx();
        let stmt = DeferredStatement {
            label: Label::Var {
                name: Id::intern("I"),
                subscript: None,
                range: Range::default(),
            },
            instruction: InstructionField::Ord {
                name: Id::intern("SETA"),
                range: Range::default(),
            },
            deferred_text: "1".to_owned(),
            deferred_range: Range::default(),
            stmt_range: Range::default(),
        };
        let resolved = resolve_deferred(&mut c, &stmt, &status(ProcessingForm::Ca, "SETA"));
        assert!(matches!(resolved.label, Label::Var { .. }));
    }

    #[test]
    fn test_concat_instruction_resolution() {
        let mut c = ctx();
        c.set_variable(Id::intern("I"), None, SetValue::C("R".to_owned()));
        let instr = InstructionField::Concat {
            text: "L&I".to_owned(),
            range: Range::default(),
        };
        assert_eq!(
            resolve_instruction_name(&c, &instr),
            Some(Id::intern("LR"))
        );
    }

    #[test]
    fn test_unsubstituted_statement_is_cloned() {
        let mut c = ctx();
        let stmt = deferred(Label::Empty, "LR", "1,2");
        let a = resolve_deferred(&mut c, &stmt, &status(ProcessingForm::Mach, "LR"));
        let b = resolve_deferred(&mut c, &stmt, &status(ProcessingForm::Mach, "LR"));
        assert_eq!(a.operands, b.operands);
        assert!(matches!(a.operands.list[0], Operand::Mach(_)));
    }
}
