//! hlac-par - Statement Parser
//!
//! Parsing happens in two modes.
//!
//! *Initial mode* consumes the token stream of one logical line and splits
//! it into the classic card fields: name, operation, operand, remarks. The
//! operand field is NOT parsed here: which grammar applies depends on the
//! instruction, and the instruction may be a macro that is not known yet.
//! The result is a [`statement::DeferredStatement`] carrying the raw
//! operand text and its range.
//!
//! *Reparse mode* ([`fields::parse_operand_field`]) runs once the
//! processing pipeline has resolved the instruction to a processing
//! format: the deferred text is re-lexed under the selected operand
//! grammar (machine, assembler, conditional-assembly, data-definition, or
//! macro-call) into typed operands plus remarks. Reparsing the same text
//! under the same format always yields the same result, which is what the
//! statement cache relies on.

pub mod ca;
pub mod data_def;
pub mod fields;
pub mod form;
pub mod mach;
pub mod operand;
pub mod scanner;
pub mod statement;

mod edge_cases;

use hlac_lex::{Token, TokenKind};
use hlac_util::span::{Position, Range};
use hlac_util::Id;

pub use fields::{parse_operand_field, parse_prototype_params, resplit_macro_operands, ParsedField};
pub use form::{
    OpCode, OperandOccurrence, ProcessingForm, ProcessingFormat, ProcessingKind, ProcessingStatus,
};
pub use scanner::RangeProvider;
pub use statement::{
    DeferredStatement, InstructionField, Label, PreprocStatement, ResolvedStatement, Statement,
};

/// Outcome of initial-mode parsing of one logical line.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedLine {
    /// A statement with its operand field deferred.
    Statement(DeferredStatement),
    /// A `*PROCESS` statement with its raw option list.
    Process {
        options: Vec<(String, Range)>,
        range: Range,
    },
    /// Nothing but blanks (or hidden tokens) on the line.
    Empty,
}

/// Parse one logical line (the tokens between two `EolLn`s) in initial
/// mode.
pub fn parse_logical_line(source: &str, tokens: &[Token]) -> ParsedLine {
    let visible: Vec<&Token> = tokens
        .iter()
        .filter(|t| {
            !t.is_hidden() && !matches!(t.kind, TokenKind::EolLn | TokenKind::Eof)
        })
        .collect();

    if visible.iter().all(|t| t.kind == TokenKind::Space) {
        return ParsedLine::Empty;
    }

    if visible[0].kind == TokenKind::Process {
        return parse_process_line(source, &visible);
    }

    let stmt_range = visible
        .iter()
        .map(|t| t.range)
        .reduce(Range::union)
        .unwrap_or_default();

    let mut i = 0;

    // Name field: everything up to the first blank.
    let label = if visible[0].kind == TokenKind::Space {
        i += 1;
        statement::Label::Empty
    } else {
        let start = i;
        while i < visible.len() && visible[i].kind != TokenKind::Space {
            i += 1;
        }
        let text: String = visible[start..i].iter().map(|t| t.text(source)).collect();
        let range = visible[start..i]
            .iter()
            .map(|t| t.range)
            .reduce(Range::union)
            .unwrap_or_default();
        i += 1; // the blank after the name field
        classify_label(&text, range)
    };

    // Operation field.
    let instruction = if i >= visible.len() {
        statement::InstructionField::Empty(Range::point(stmt_range.end))
    } else {
        let start = i;
        while i < visible.len() && visible[i].kind != TokenKind::Space {
            i += 1;
        }
        let text: String = visible[start..i].iter().map(|t| t.text(source)).collect();
        let range = visible[start..i]
            .iter()
            .map(|t| t.range)
            .reduce(Range::union)
            .unwrap_or_default();
        i += 1; // the blank after the operation field
        if text.contains('&') {
            statement::InstructionField::Concat { text, range }
        } else {
            statement::InstructionField::Ord {
                name: Id::from_upper(&text),
                range,
            }
        }
    };

    // Operand field plus remarks, raw. A continuation that split an
    // operand list (previous card ends with a comma before its padding
    // blanks) splices back together without the padding.
    let (deferred_text, deferred_range) = if i >= visible.len() {
        (String::new(), Range::point(stmt_range.end))
    } else {
        let mut text = String::new();
        for t in &visible[i..] {
            if t.after_continuation {
                let trimmed = text.trim_end().len();
                if text[..trimmed].ends_with(',') {
                    text.truncate(trimmed);
                }
            }
            text.push_str(t.text(source));
        }
        let range = visible[i..]
            .iter()
            .map(|t| t.range)
            .reduce(Range::union)
            .unwrap_or_default();
        (text, range)
    };

    ParsedLine::Statement(DeferredStatement {
        label,
        instruction,
        deferred_text,
        deferred_range,
        stmt_range,
    })
}

/// Classify a name-field text into a label: sequence symbol, variable
/// symbol, concatenation, or ordinary symbol.
pub fn classify_label(text: &str, range: Range) -> statement::Label {
    if let Some(rest) = text.strip_prefix('.') {
        if is_name(rest) {
            return statement::Label::Seq {
                name: Id::from_upper(rest),
                range,
            };
        }
    }
    if let Some(rest) = text.strip_prefix('&') {
        if is_name(rest) {
            return statement::Label::Var {
                name: Id::from_upper(rest),
                subscript: None,
                range,
            };
        }
        if let Some(open) = rest.find('(') {
            if rest.ends_with(')') && is_name(&rest[..open]) {
                return statement::Label::Var {
                    name: Id::from_upper(&rest[..open]),
                    subscript: Some(rest[open + 1..rest.len() - 1].to_owned()),
                    range,
                };
            }
        }
    }
    if text.contains('&') {
        return statement::Label::Concat {
            text: text.to_owned(),
            range,
        };
    }
    statement::Label::Ord {
        name: Id::from_upper(text),
        range,
    }
}

fn is_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '#' | '$' | '_'))
}

fn parse_process_line(source: &str, visible: &[&Token]) -> ParsedLine {
    let range = visible
        .iter()
        .map(|t| t.range)
        .reduce(Range::union)
        .unwrap_or_default();

    // Everything after *PROCESS and the separating blank is the option
    // list, comma separated; blanks inside strings do not split.
    let mut rest = String::new();
    let mut base: Option<Position> = None;
    for t in &visible[1..] {
        if t.kind == TokenKind::Space && rest.is_empty() {
            continue;
        }
        if base.is_none() {
            base = Some(t.range.start);
        }
        rest.push_str(t.text(source));
    }
    let base = base.unwrap_or(range.end);

    let mut options = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0usize;
    let chars: Vec<char> = rest.chars().collect();
    for (idx, &c) in chars.iter().enumerate() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                push_option(&chars, start, idx, base, &mut options);
                start = idx + 1;
            }
            _ => {}
        }
    }
    push_option(&chars, start, chars.len(), base, &mut options);

    ParsedLine::Process { options, range }
}

fn push_option(
    chars: &[char],
    start: usize,
    end: usize,
    base: Position,
    options: &mut Vec<(String, Range)>,
) {
    let text: String = chars[start..end].iter().collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    options.push((
        trimmed.to_owned(),
        Range::in_line(base.line, base.column + start, base.column + end),
    ));
}
