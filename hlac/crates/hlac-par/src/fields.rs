//! Operand-field reparse.
//!
//! The operand field of a deferred statement is reparsed here once the
//! processing format is known. The field text has continuations already
//! flattened; this module splits it into operands and remarks, dispatches
//! each operand to the grammar the format selects, and maps every range
//! back to source columns through the [`RangeProvider`].

use hlac_util::diagnostic::codes;
use hlac_util::span::Range;
use hlac_util::{Diagnostic, Id};

use crate::ca::{parse_ca_expr, parse_var_ref, CaExpr};
use crate::data_def::parse_data_def;
use crate::form::{OperandOccurrence, ProcessingForm, ProcessingStatus};
use crate::mach::parse_mach_expr;
use crate::operand::{AsmOperand, CaOperand, MachOperand, MacroOperand, Operand, Operands};
use crate::scanner::{is_attribute_quote, RangeProvider, Scanner};

/// Result of an operand-field reparse.
#[derive(Clone, Debug, Default)]
pub struct ParsedField {
    pub operands: Operands,
    pub remarks: Vec<Range>,
    pub diags: Vec<Diagnostic>,
}

/// Reparse a deferred operand field under the given processing status.
///
/// Forms without an operand grammar (unknown, ignored, deferred) and
/// statuses with no operand occurrence return an empty list without
/// re-lexing. A field of exactly one comma is the "no operands, then
/// remark" pattern and parses cleanly to zero operands.
pub fn parse_operand_field(
    text: &str,
    provider: &RangeProvider,
    status: &ProcessingStatus,
) -> ParsedField {
    let whole = provider.whole(text.chars().count());
    if status.format.occurrence == OperandOccurrence::Absent
        || matches!(
            status.format.form,
            ProcessingForm::Unknown | ProcessingForm::Ignored | ProcessingForm::Deferred
        )
    {
        return ParsedField {
            operands: Operands::empty(whole),
            remarks: Vec::new(),
            diags: Vec::new(),
        };
    }

    let chars: Vec<char> = text.chars().collect();
    let field_end = operand_field_end(&chars);
    let mut diags = Vec::new();

    // Lone comma: zero operands, everything after is remark.
    let lone_comma = field_end == 1 && chars[0] == ',';

    let mut list = Vec::new();
    if !lone_comma && field_end > 0 {
        for (start, end) in split_on_commas(&chars, 0, field_end) {
            if start == end {
                list.push(Operand::Empty(provider.adjust(start, end)));
                continue;
            }
            match parse_one_operand(text, provider, status, start, end, list.len()) {
                Ok(op) => list.push(op),
                Err(d) => {
                    diags.push(d);
                    list.push(Operand::Empty(provider.adjust(start, end)));
                }
            }
        }
    }

    // A single empty operand collapses to none.
    if list.len() == 1 && matches!(list[0], Operand::Empty(_)) {
        list.clear();
    }

    let op_range = if list.is_empty() {
        provider.adjust(0, field_end.max(1).min(chars.len().max(1)))
    } else {
        list.iter()
            .map(Operand::range)
            .reduce(Range::union)
            .unwrap_or(whole)
    };

    let remarks = collect_remarks(&chars, field_end, provider);

    ParsedField {
        operands: Operands {
            list,
            range: op_range,
        },
        remarks,
        diags,
    }
}

/// Character offset where the operand list ends: the first blank at
/// parenthesis depth zero outside of strings.
fn operand_field_end(chars: &[char]) -> usize {
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\'' => {
                if !in_string && is_attribute_quote(chars, i) {
                    // L'SYM: not a string delimiter.
                } else {
                    in_string = !in_string;
                }
            }
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ' ' | '\t' if !in_string && depth == 0 => return i,
            _ => {}
        }
    }
    chars.len()
}

/// Split `[from, to)` into comma-separated pieces at depth zero.
fn split_on_commas(chars: &[char], from: usize, to: usize) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = from;
    for i in from..to {
        match chars[i] {
            '\'' => {
                if !(!in_string && is_attribute_quote(chars, i)) {
                    in_string = !in_string;
                }
            }
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                pieces.push((start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push((start, to));
    pieces
}

fn parse_one_operand(
    text: &str,
    provider: &RangeProvider,
    status: &ProcessingStatus,
    start: usize,
    end: usize,
    index: usize,
) -> Result<Operand, Diagnostic> {
    let mut s = Scanner::new(text, provider);
    s.rewind(start);
    let op = match status.format.form {
        ProcessingForm::Mach => parse_mach_operand(&mut s)?,
        ProcessingForm::AsmGeneric
        | ProcessingForm::AsmAlias
        | ProcessingForm::AsmEnd
        | ProcessingForm::AsmUsing => parse_asm_operand(&mut s, status.format.form, index)?,
        ProcessingForm::Ca => parse_ca_operand(&mut s)?,
        ProcessingForm::Dat => {
            let dd = parse_data_def(&mut s)?;
            Operand::DataDef(Box::new(dd))
        }
        ProcessingForm::Mac => {
            let piece = s.slice(start, end);
            s.rewind(end);
            Operand::Mac(MacroOperand {
                text: piece,
                range: provider.adjust(start, end),
            })
        }
        _ => Operand::Empty(provider.adjust(start, end)),
    };
    if s.pos() < end {
        let rest = s.slice(s.pos(), end);
        return Err(codes::s0002(provider.adjust(s.pos(), end), rest.trim()));
    }
    Ok(op)
}

fn parse_mach_operand(s: &mut Scanner) -> Result<Operand, Diagnostic> {
    let start = s.pos();
    if s.peek() == Some('=') {
        s.bump();
        let dd = parse_data_def(s)?;
        return Ok(Operand::Mach(MachOperand::Literal {
            data: Box::new(dd),
            range: s.range(start, s.pos()),
        }));
    }

    let disp = parse_mach_expr(s)?;
    if s.peek() != Some('(') {
        return Ok(Operand::Mach(MachOperand::Expr(disp)));
    }
    s.bump();

    // disp(base), disp(index,base), disp(,base)
    if s.eat(',') {
        let base = parse_mach_expr(s)?;
        if !s.eat(')') {
            return Err(codes::s0002(s.range_at(s.pos()), ")"));
        }
        return Ok(Operand::Mach(MachOperand::DispIdxBase {
            disp,
            index: None,
            base,
            range: s.range(start, s.pos()),
        }));
    }

    let first = parse_mach_expr(s)?;
    if s.eat(',') {
        let base = parse_mach_expr(s)?;
        if !s.eat(')') {
            return Err(codes::s0002(s.range_at(s.pos()), ")"));
        }
        Ok(Operand::Mach(MachOperand::DispIdxBase {
            disp,
            index: Some(first),
            base,
            range: s.range(start, s.pos()),
        }))
    } else {
        if !s.eat(')') {
            return Err(codes::s0002(s.range_at(s.pos()), ")"));
        }
        Ok(Operand::Mach(MachOperand::DispBase {
            disp,
            base: first,
            range: s.range(start, s.pos()),
        }))
    }
}

fn parse_asm_operand(
    s: &mut Scanner,
    form: ProcessingForm,
    index: usize,
) -> Result<Operand, Diagnostic> {
    let start = s.pos();
    match s.peek() {
        Some('\'') => {
            s.bump();
            let mut value = String::new();
            loop {
                match s.peek() {
                    None => return Err(codes::s0003(s.range(start, s.pos()))),
                    Some('\'') if s.peek_at(1) == Some('\'') => {
                        value.push('\'');
                        s.bump();
                        s.bump();
                    }
                    Some('\'') => {
                        s.bump();
                        break;
                    }
                    Some(c) => {
                        value.push(c);
                        s.bump();
                    }
                }
            }
            Ok(Operand::Asm(AsmOperand::String {
                value,
                range: s.range(start, s.pos()),
            }))
        }
        Some('(') if form == ProcessingForm::AsmUsing && index == 0 => {
            // USING (begin,end),...
            s.bump();
            let begin = parse_mach_expr(s)?;
            if !s.eat(',') {
                return Err(codes::s0002(s.range_at(s.pos()), ","));
            }
            let end = parse_mach_expr(s)?;
            if !s.eat(')') {
                return Err(codes::s0002(s.range_at(s.pos()), ")"));
            }
            Ok(Operand::Asm(AsmOperand::UsingRange {
                begin,
                end,
                range: s.range(start, s.pos()),
            }))
        }
        Some(c) if (c.is_ascii_alphabetic() || matches!(c, '@' | '#' | '$' | '_'))
            && complex_follows(s) =>
        {
            let key_text = s.take_word();
            let key = Id::from_upper(&key_text);
            s.bump(); // '('
            let inner_start = s.pos();
            let mut depth = 1usize;
            while let Some(c) = s.peek() {
                match c {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                s.bump();
            }
            if depth != 0 {
                return Err(codes::s0002(s.range_at(s.pos()), ")"));
            }
            let inner = s.slice(inner_start, s.pos());
            s.bump(); // ')'
            let values = inner.split(',').map(|v| v.trim().to_owned()).collect();
            Ok(Operand::Asm(AsmOperand::Complex {
                key,
                values,
                range: s.range(start, s.pos()),
            }))
        }
        _ => {
            let expr = parse_mach_expr(s)?;
            Ok(Operand::Asm(AsmOperand::Expr(expr)))
        }
    }
}

/// A word followed directly by `(` is a complex operand unless the word
/// is a single self-defining-term prefix (`C'..'` stays an expression).
fn complex_follows(s: &Scanner) -> bool {
    let mut i = 0;
    while let Some(c) = s.peek_at(i) {
        if c.is_ascii_alphanumeric() || matches!(c, '@' | '#' | '$' | '_') {
            i += 1;
        } else {
            return c == '(' && i > 0;
        }
    }
    false
}

fn parse_ca_operand(s: &mut Scanner) -> Result<Operand, Diagnostic> {
    let start = s.pos();
    match s.peek() {
        Some('.') => {
            s.bump();
            let word = s.take_word();
            if word.is_empty() {
                return Err(codes::s0002(s.range_at(start), "."));
            }
            Ok(Operand::Ca(CaOperand::Seq {
                name: Id::from_upper(&word),
                range: s.range(start, s.pos()),
            }))
        }
        Some('&') => {
            let var = parse_var_ref(s)?;
            if matches!(s.peek(), None | Some(' ') | Some('\t') | Some(',')) {
                let range = var.range;
                return Ok(Operand::Ca(CaOperand::Var { var, range }));
            }
            // More follows: the whole piece is an expression (&A+1, ...).
            s.rewind(start);
            let expr = parse_ca_expr(s)?;
            let range = expr.range();
            Ok(Operand::Ca(CaOperand::Expr { expr, range }))
        }
        Some('(') => {
            // Try the (condition).TARGET branch shape first.
            let save = s.pos();
            s.bump();
            if let Ok(cond) = parse_ca_expr(s) {
                s.skip_blanks();
                if s.eat(')') && s.peek() == Some('.') {
                    s.bump();
                    let word = s.take_word();
                    if !word.is_empty() {
                        return Ok(Operand::Ca(CaOperand::Branch {
                            condition: Some(cond),
                            target: Id::from_upper(&word),
                            range: s.range(start, s.pos()),
                        }));
                    }
                }
            }
            s.rewind(save);
            let expr = parse_ca_expr(s)?;
            let range = expr.range();
            Ok(Operand::Ca(CaOperand::Expr { expr, range }))
        }
        Some('*') => {
            // MNOTE severity `*`.
            s.bump();
            Ok(Operand::Ca(CaOperand::Expr {
                expr: CaExpr::Sym {
                    name: Id::intern("*"),
                    range: s.range(start, s.pos()),
                },
                range: s.range(start, s.pos()),
            }))
        }
        _ => {
            let expr = parse_ca_expr(s)?;
            let range = expr.range();
            Ok(Operand::Ca(CaOperand::Expr { expr, range }))
        }
    }
}

fn collect_remarks(chars: &[char], field_end: usize, provider: &RangeProvider) -> Vec<Range> {
    let mut remarks = Vec::new();
    let mut i = field_end;
    while i < chars.len() {
        while i < chars.len() && (chars[i] == ' ' || chars[i] == '\t') {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        let word_start = i;
        while i < chars.len() && chars[i] != ' ' && chars[i] != '\t' {
            i += 1;
        }
        remarks.push(provider.adjust(word_start, i));
    }
    remarks
}

// ---------------------------------------------------------------------------
// Macro operand re-split after substitution
// ---------------------------------------------------------------------------

/// After substitution, a macro call's operands form one compound string
/// that must be re-split on commas; sub-operand ranges are preserved by a
/// piece-mapping range provider.
pub fn resplit_macro_operands(ops: &[MacroOperand]) -> Vec<MacroOperand> {
    if ops.is_empty() {
        return Vec::new();
    }

    let mut joined = String::new();
    let mut pieces = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        let start = joined.chars().count();
        joined.push_str(&op.text);
        pieces.push((start, joined.chars().count().max(start + 1), op.range));
        if i != ops.len() - 1 {
            joined.push(',');
        }
    }
    let provider = RangeProvider::Pieces { pieces };

    let chars: Vec<char> = joined.chars().collect();
    split_on_commas(&chars, 0, chars.len())
        .into_iter()
        .map(|(start, end)| MacroOperand {
            text: chars[start..end].iter().collect(),
            range: provider.adjust(start, end.max(start + 1)),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Macro prototype parameters
// ---------------------------------------------------------------------------

/// One macro prototype parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct PrototypeParam {
    pub name: Id,
    /// `None` for positional parameters, the default value for keywords.
    pub default: Option<String>,
    pub range: Range,
}

/// Parse the operand field of a macro prototype statement.
pub fn parse_prototype_params(
    text: &str,
    provider: &RangeProvider,
) -> (Vec<PrototypeParam>, Vec<Diagnostic>) {
    let chars: Vec<char> = text.chars().collect();
    let field_end = operand_field_end(&chars);
    let mut params = Vec::new();
    let mut diags = Vec::new();

    if field_end == 0 {
        return (params, diags);
    }

    for (start, end) in split_on_commas(&chars, 0, field_end) {
        if start == end {
            diags.push(codes::e043(provider.adjust(start, end.max(start + 1))));
            continue;
        }
        let piece: String = chars[start..end].iter().collect();
        let range = provider.adjust(start, end);
        if !piece.starts_with('&') {
            diags.push(codes::e043(range));
            continue;
        }
        let rest = &piece[1..];
        let (name_text, default) = match rest.find('=') {
            Some(eq) => (&rest[..eq], Some(rest[eq + 1..].to_owned())),
            None => (rest, None),
        };
        if name_text.is_empty()
            || !name_text
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '#' | '$' | '_'))
        {
            diags.push(codes::e043(range));
            continue;
        }
        params.push(PrototypeParam {
            name: Id::from_upper(name_text),
            default,
            range,
        });
    }
    (params, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{OpCode, ProcessingFormat, ProcessingKind, ProcessingStatus};
    use hlac_util::span::Position;

    fn status(form: ProcessingForm) -> ProcessingStatus {
        ProcessingStatus::new(
            ProcessingFormat::new(ProcessingKind::Ordinary, form),
            OpCode::default(),
        )
    }

    fn parse(text: &str, form: ProcessingForm) -> ParsedField {
        let provider = RangeProvider::simple(Position::new(0, 16));
        parse_operand_field(text, &provider, &status(form))
    }

    #[test]
    fn test_machine_operands() {
        let f = parse("1,2", ProcessingForm::Mach);
        assert!(f.diags.is_empty());
        assert_eq!(f.operands.len(), 2);
        assert!(matches!(
            f.operands.list[0],
            Operand::Mach(MachOperand::Expr(_))
        ));
    }

    #[test]
    fn test_disp_base_forms() {
        let f = parse("0(1),4(2,3)", ProcessingForm::Mach);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        assert!(matches!(
            f.operands.list[0],
            Operand::Mach(MachOperand::DispBase { .. })
        ));
        assert!(matches!(
            f.operands.list[1],
            Operand::Mach(MachOperand::DispIdxBase {
                index: Some(_),
                ..
            })
        ));
    }

    #[test]
    fn test_omitted_index() {
        let f = parse("0(,15)", ProcessingForm::Mach);
        assert!(f.diags.is_empty());
        assert!(matches!(
            f.operands.list[0],
            Operand::Mach(MachOperand::DispIdxBase { index: None, .. })
        ));
    }

    #[test]
    fn test_literal_operand() {
        let f = parse("0,=F'1'", ProcessingForm::Mach);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        assert!(matches!(
            f.operands.list[1],
            Operand::Mach(MachOperand::Literal { .. })
        ));
    }

    #[test]
    fn test_lone_comma_parses_to_zero_operands() {
        let f = parse(", a remark", ProcessingForm::Mach);
        assert!(f.diags.is_empty());
        assert!(f.operands.is_empty());
        assert_eq!(f.remarks.len(), 2);
    }

    #[test]
    fn test_empty_middle_operand() {
        let f = parse("1,,3", ProcessingForm::Mach);
        assert_eq!(f.operands.len(), 3);
        assert!(matches!(f.operands.list[1], Operand::Empty(_)));
    }

    #[test]
    fn test_remarks_after_operands() {
        let f = parse("1,2  first second", ProcessingForm::Mach);
        assert_eq!(f.operands.len(), 2);
        assert_eq!(f.remarks.len(), 2);
    }

    #[test]
    fn test_blank_inside_string_does_not_end_field() {
        let f = parse("'A B',C'X Y'", ProcessingForm::AsmGeneric);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        assert_eq!(f.operands.len(), 2);
        assert!(f.remarks.is_empty());
    }

    #[test]
    fn test_attribute_quote_does_not_open_string() {
        let f = parse("L'SYM+1 remark", ProcessingForm::Mach);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        assert_eq!(f.operands.len(), 1);
        assert_eq!(f.remarks.len(), 1);
    }

    #[test]
    fn test_absent_occurrence_skips_parse() {
        let provider = RangeProvider::simple(Position::new(0, 16));
        let st = ProcessingStatus::new(
            ProcessingFormat::without_operands(ProcessingKind::Ordinary, ProcessingForm::Ca),
            OpCode::default(),
        );
        let f = parse_operand_field("anything at all", &provider, &st);
        assert!(f.operands.is_empty());
        assert!(f.diags.is_empty());
    }

    #[test]
    fn test_ca_branch_operand() {
        let f = parse("(&P EQ 1).E", ProcessingForm::Ca);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        match &f.operands.list[0] {
            Operand::Ca(CaOperand::Branch {
                condition: Some(_),
                target,
                ..
            }) => assert_eq!(target.as_str(), "E"),
            other => panic!("expected branch, got {other:?}"),
        }
    }

    #[test]
    fn test_ca_seq_operand() {
        let f = parse(".TARGET", ProcessingForm::Ca);
        match &f.operands.list[0] {
            Operand::Ca(CaOperand::Seq { name, .. }) => assert_eq!(name.as_str(), "TARGET"),
            other => panic!("expected seq, got {other:?}"),
        }
    }

    #[test]
    fn test_ca_var_declaration() {
        let f = parse("&A,&B(10)", ProcessingForm::Ca);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        assert_eq!(f.operands.len(), 2);
        assert!(matches!(
            &f.operands.list[0],
            Operand::Ca(CaOperand::Var { .. })
        ));
    }

    #[test]
    fn test_asm_complex_operand() {
        let f = parse("RMODE(ANY),AMODE(31)", ProcessingForm::AsmGeneric);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        match &f.operands.list[0] {
            Operand::Asm(AsmOperand::Complex { key, values, .. }) => {
                assert_eq!(key.as_str(), "RMODE");
                assert_eq!(values, &vec!["ANY".to_owned()]);
            }
            other => panic!("expected complex, got {other:?}"),
        }
    }

    #[test]
    fn test_using_range_head() {
        let f = parse("(BASE,BASE+4096),12", ProcessingForm::AsmUsing);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        assert!(matches!(
            &f.operands.list[0],
            Operand::Asm(AsmOperand::UsingRange { .. })
        ));
    }

    #[test]
    fn test_data_def_operands() {
        let f = parse("F'1',XL2'FF'", ProcessingForm::Dat);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        assert_eq!(f.operands.len(), 2);
        assert!(matches!(&f.operands.list[0], Operand::DataDef(_)));
    }

    #[test]
    fn test_macro_operands_kept_raw() {
        let f = parse("A,(B,C),KEY=VAL", ProcessingForm::Mac);
        assert!(f.diags.is_empty());
        assert_eq!(f.operands.len(), 3);
        match &f.operands.list[1] {
            Operand::Mac(op) => assert_eq!(op.text, "(B,C)"),
            other => panic!("expected macro operand, got {other:?}"),
        }
        match &f.operands.list[2] {
            Operand::Mac(op) => assert_eq!(op.keyword_split(), Some(("KEY", "VAL"))),
            other => panic!("expected macro operand, got {other:?}"),
        }
    }

    #[test]
    fn test_resplit_after_substitution() {
        // One operand whose substituted text expands to two.
        let ops = vec![
            MacroOperand {
                text: "A,B".to_owned(),
                range: Range::in_line(0, 10, 14),
            },
            MacroOperand {
                text: "C".to_owned(),
                range: Range::in_line(0, 16, 17),
            },
        ];
        let resplit = resplit_macro_operands(&ops);
        assert_eq!(resplit.len(), 3);
        assert_eq!(resplit[0].text, "A");
        assert_eq!(resplit[1].text, "B");
        assert_eq!(resplit[2].text, "C");
        // Ranges trace back to the originating operands.
        assert_eq!(resplit[0].range, Range::in_line(0, 10, 14));
        assert_eq!(resplit[1].range, Range::in_line(0, 10, 14));
        assert_eq!(resplit[2].range, Range::in_line(0, 16, 17));
    }

    #[test]
    fn test_prototype_params() {
        let provider = RangeProvider::simple(Position::new(0, 10));
        let (params, diags) = parse_prototype_params("&P,&KEY=DFLT,&FLAG=", &provider);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name.as_str(), "P");
        assert_eq!(params[0].default, None);
        assert_eq!(params[1].default.as_deref(), Some("DFLT"));
        assert_eq!(params[2].default.as_deref(), Some(""));
    }

    #[test]
    fn test_prototype_param_errors() {
        let provider = RangeProvider::simple(Position::new(0, 10));
        let (params, diags) = parse_prototype_params("&OK,BAD", &provider);
        assert_eq!(params.len(), 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "E043");
    }

    #[test]
    fn test_reparse_is_deterministic() {
        let provider = RangeProvider::simple(Position::new(0, 16));
        let st = status(ProcessingForm::Mach);
        let a = parse_operand_field("0(1,2),=F'9'  note", &provider, &st);
        let b = parse_operand_field("0(1,2),=F'9'  note", &provider, &st);
        assert_eq!(a.operands, b.operands);
        assert_eq!(a.remarks, b.remarks);
        assert_eq!(a.diags, b.diags);
    }
}
