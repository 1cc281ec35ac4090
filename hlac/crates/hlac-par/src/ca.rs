//! Conditional-assembly expressions: AST and parser.
//!
//! CA expressions appear in AIF conditions, SET operands, ACTR counts, and
//! variable subscripts. The grammar mixes three value domains (arithmetic,
//! boolean, character); typing is resolved at evaluation time, not here.
//!
//! Blanks inside a parenthesized expression separate word operators
//! (`EQ`, `AND`, ...) from their operands; the operand-field splitter has
//! already bounded the expression text, so the parser can skip blanks
//! freely.

use hlac_util::diagnostic::codes;
use hlac_util::span::Range;
use hlac_util::{Diagnostic, Id};

use crate::scanner::{is_attribute_quote, Scanner};

/// Reference to a variable symbol, optionally subscripted.
#[derive(Clone, Debug, PartialEq)]
pub struct VarRef {
    pub name: Id,
    pub subscript: Option<Box<CaExpr>>,
    pub range: Range,
}

/// Attribute reference kind (`T'`, `L'`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttrKind {
    Type,
    Length,
    Scale,
    Integer,
    Count,
    Number,
    Defined,
    Opcode,
}

impl AttrKind {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'T' => Some(AttrKind::Type),
            'L' => Some(AttrKind::Length),
            'S' => Some(AttrKind::Scale),
            'I' => Some(AttrKind::Integer),
            'K' => Some(AttrKind::Count),
            'N' => Some(AttrKind::Number),
            'D' => Some(AttrKind::Defined),
            'O' => Some(AttrKind::Opcode),
            _ => None,
        }
    }
}

/// What an attribute reference is applied to.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrOperand {
    Ord { name: Id, range: Range },
    Var(VarRef),
}

/// Piece of a quoted character expression.
#[derive(Clone, Debug, PartialEq)]
pub enum StrPart {
    Text(String),
    Var(VarRef),
}

/// Unary CA operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaUnaryOp {
    Neg,
    Plus,
    Not,
}

/// Binary CA operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Xor,
}

/// Conditional-assembly expression.
#[derive(Clone, Debug, PartialEq)]
pub enum CaExpr {
    Num {
        value: i32,
        range: Range,
    },
    /// Self-defining term: `B'1010'`, `C'AB'`, `X'1F'`, `G'..'`.
    SelfDef {
        kind: char,
        text: String,
        range: Range,
    },
    /// Quoted character expression with in-string substitutions.
    Str {
        parts: Vec<StrPart>,
        range: Range,
    },
    /// `value(start[,length])` substring of a character expression.
    Substr {
        value: Box<CaExpr>,
        start: Box<CaExpr>,
        length: Option<Box<CaExpr>>,
        range: Range,
    },
    Var(VarRef),
    /// Ordinary symbol used as a term.
    Sym {
        name: Id,
        range: Range,
    },
    AttrRef {
        attr: AttrKind,
        operand: AttrOperand,
        range: Range,
    },
    Unary {
        op: CaUnaryOp,
        operand: Box<CaExpr>,
        range: Range,
    },
    Binary {
        op: CaBinOp,
        left: Box<CaExpr>,
        right: Box<CaExpr>,
        range: Range,
    },
    /// Built-in function call: `FIND`, `INDEX`, `BYTE`, `DOUBLE`,
    /// `UPPER`, `LOWER`, ...
    FunCall {
        name: Id,
        args: Vec<CaExpr>,
        range: Range,
    },
}

impl CaExpr {
    pub fn range(&self) -> Range {
        match self {
            CaExpr::Num { range, .. }
            | CaExpr::SelfDef { range, .. }
            | CaExpr::Str { range, .. }
            | CaExpr::Substr { range, .. }
            | CaExpr::Sym { range, .. }
            | CaExpr::AttrRef { range, .. }
            | CaExpr::Unary { range, .. }
            | CaExpr::Binary { range, .. }
            | CaExpr::FunCall { range, .. } => *range,
            CaExpr::Var(v) => v.range,
        }
    }
}

type ParseResult<T> = Result<T, Diagnostic>;

/// Parse a complete CA expression from the scanner position.
pub fn parse_ca_expr(s: &mut Scanner) -> ParseResult<CaExpr> {
    parse_or(s)
}

fn word_op_at(s: &mut Scanner) -> Option<(&'static str, usize)> {
    let save = s.pos();
    s.skip_blanks();
    let start = s.pos();
    let word = s.take_word().to_ascii_uppercase();
    let found = match word.as_str() {
        "OR" => Some("OR"),
        "XOR" => Some("XOR"),
        "AND" => Some("AND"),
        "NOT" => Some("NOT"),
        "EQ" => Some("EQ"),
        "NE" => Some("NE"),
        "LT" => Some("LT"),
        "GT" => Some("GT"),
        "LE" => Some("LE"),
        "GE" => Some("GE"),
        _ => None,
    };
    match found {
        Some(op) => Some((op, start)),
        None => {
            s.rewind(save);
            None
        }
    }
}

fn parse_or(s: &mut Scanner) -> ParseResult<CaExpr> {
    let mut left = parse_and(s)?;
    loop {
        let save = s.pos();
        match word_op_at(s) {
            Some(("OR", _)) => {
                let right = parse_and(s)?;
                let range = left.range().union(right.range());
                left = CaExpr::Binary {
                    op: CaBinOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                    range,
                };
            }
            Some(("XOR", _)) => {
                let right = parse_and(s)?;
                let range = left.range().union(right.range());
                left = CaExpr::Binary {
                    op: CaBinOp::Xor,
                    left: Box::new(left),
                    right: Box::new(right),
                    range,
                };
            }
            _ => {
                s.rewind(save);
                return Ok(left);
            }
        }
    }
}

fn parse_and(s: &mut Scanner) -> ParseResult<CaExpr> {
    let mut left = parse_not(s)?;
    loop {
        let save = s.pos();
        match word_op_at(s) {
            Some(("AND", _)) => {
                let right = parse_not(s)?;
                let range = left.range().union(right.range());
                left = CaExpr::Binary {
                    op: CaBinOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                    range,
                };
            }
            _ => {
                s.rewind(save);
                return Ok(left);
            }
        }
    }
}

fn parse_not(s: &mut Scanner) -> ParseResult<CaExpr> {
    let save = s.pos();
    if let Some(("NOT", start)) = word_op_at(s) {
        let operand = parse_not(s)?;
        let range = s.range(start, start + 3).union(operand.range());
        return Ok(CaExpr::Unary {
            op: CaUnaryOp::Not,
            operand: Box::new(operand),
            range,
        });
    }
    s.rewind(save);
    parse_comparison(s)
}

fn parse_comparison(s: &mut Scanner) -> ParseResult<CaExpr> {
    let left = parse_additive(s)?;
    let save = s.pos();
    let op = match word_op_at(s) {
        Some(("EQ", _)) => Some(CaBinOp::Eq),
        Some(("NE", _)) => Some(CaBinOp::Ne),
        Some(("LT", _)) => Some(CaBinOp::Lt),
        Some(("GT", _)) => Some(CaBinOp::Gt),
        Some(("LE", _)) => Some(CaBinOp::Le),
        Some(("GE", _)) => Some(CaBinOp::Ge),
        _ => None,
    };
    let Some(op) = op else {
        s.rewind(save);
        return Ok(left);
    };
    let right = parse_additive(s)?;
    let range = left.range().union(right.range());
    Ok(CaExpr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        range,
    })
}

fn parse_additive(s: &mut Scanner) -> ParseResult<CaExpr> {
    let mut left = parse_mult(s)?;
    loop {
        s.skip_blanks();
        let op = match s.peek() {
            Some('+') => CaBinOp::Add,
            Some('-') => CaBinOp::Sub,
            _ => return Ok(left),
        };
        s.bump();
        let right = parse_mult(s)?;
        let range = left.range().union(right.range());
        left = CaExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            range,
        };
    }
}

fn parse_mult(s: &mut Scanner) -> ParseResult<CaExpr> {
    let mut left = parse_unary(s)?;
    loop {
        s.skip_blanks();
        let op = match s.peek() {
            Some('*') => CaBinOp::Mul,
            Some('/') => CaBinOp::Div,
            _ => return Ok(left),
        };
        s.bump();
        let right = parse_unary(s)?;
        let range = left.range().union(right.range());
        left = CaExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            range,
        };
    }
}

fn parse_unary(s: &mut Scanner) -> ParseResult<CaExpr> {
    s.skip_blanks();
    let start = s.pos();
    let op = match s.peek() {
        Some('-') => Some(CaUnaryOp::Neg),
        Some('+') => Some(CaUnaryOp::Plus),
        _ => None,
    };
    if let Some(op) = op {
        s.bump();
        let operand = parse_unary(s)?;
        let range = s.range_at(start).union(operand.range());
        return Ok(CaExpr::Unary {
            op,
            operand: Box::new(operand),
            range,
        });
    }
    parse_concat(s)
}

fn parse_concat(s: &mut Scanner) -> ParseResult<CaExpr> {
    let mut left = parse_primary(s)?;
    // Character concatenation: 'A'.'B', '&X'.SUFFIX is not a concat (a
    // period starting a sequence symbol never appears mid-expression).
    while s.peek() == Some('.')
        && matches!(s.peek_at(1), Some(c) if c == '\'' || c == '&' || c.is_ascii_alphanumeric())
    {
        s.bump();
        let right = parse_primary(s)?;
        let range = left.range().union(right.range());
        left = CaExpr::Binary {
            op: CaBinOp::Concat,
            left: Box::new(left),
            right: Box::new(right),
            range,
        };
    }
    Ok(left)
}

fn parse_primary(s: &mut Scanner) -> ParseResult<CaExpr> {
    s.skip_blanks();
    let start = s.pos();
    match s.peek() {
        None => Err(codes::s0005(s.range_at(start))),
        Some('(') => {
            s.bump();
            let inner = parse_ca_expr(s)?;
            s.skip_blanks();
            if !s.eat(')') {
                return Err(codes::s0002(s.range_at(s.pos()), ")"));
            }
            maybe_substring(s, inner, start)
        }
        Some('\'') => {
            let string = parse_quoted(s, start)?;
            maybe_substring(s, string, start)
        }
        Some('&') => {
            let var = parse_var_ref(s)?;
            Ok(CaExpr::Var(var))
        }
        Some(c) if c.is_ascii_digit() => {
            let digits = s.take_while(|c| c.is_ascii_digit());
            let range = s.range(start, s.pos());
            match digits.parse::<i64>() {
                Ok(v) if v <= i32::MAX as i64 => Ok(CaExpr::Num {
                    value: v as i32,
                    range,
                }),
                _ => Err(codes::ce002(range)),
            }
        }
        Some(c) if c.is_ascii_alphabetic() || matches!(c, '@' | '#' | '$' | '_') => {
            // Attribute reference or self-defining term?
            if s.peek_at(1) == Some('\'') {
                if let Some(attr) = AttrKind::from_char(c) {
                    if is_attribute_quote_here(s) {
                        return parse_attr_ref(s, attr, start);
                    }
                }
                if matches!(c.to_ascii_uppercase(), 'B' | 'C' | 'X' | 'G') {
                    return parse_self_def(s, start);
                }
            }
            let word = s.take_word();
            let name = Id::from_upper(&word);
            if s.peek() == Some('(') {
                // Built-in function call.
                s.bump();
                let mut args = Vec::new();
                loop {
                    args.push(parse_ca_expr(s)?);
                    s.skip_blanks();
                    if s.eat(',') {
                        continue;
                    }
                    if s.eat(')') {
                        break;
                    }
                    return Err(codes::s0002(s.range_at(s.pos()), ")"));
                }
                let range = s.range(start, s.pos());
                Ok(CaExpr::FunCall { name, args, range })
            } else {
                Ok(CaExpr::Sym {
                    name,
                    range: s.range(start, s.pos()),
                })
            }
        }
        Some(c) => Err(codes::s0002(s.range_at(start), &c.to_string())),
    }
}

fn is_attribute_quote_here(s: &Scanner) -> bool {
    // Rebuild the minimal context the shared heuristic wants: we stand on
    // the attribute letter, the quote is one ahead.
    let ctx: Vec<char> = [
        Some(' '),
        s.peek(),
        s.peek_at(1),
        s.peek_at(2),
    ]
    .into_iter()
    .flatten()
    .collect();
    ctx.len() >= 3 && is_attribute_quote(&ctx, 2)
}

fn parse_attr_ref(s: &mut Scanner, attr: AttrKind, start: usize) -> ParseResult<CaExpr> {
    s.bump(); // attribute letter
    s.bump(); // apostrophe
    let operand = if s.peek() == Some('&') {
        AttrOperand::Var(parse_var_ref(s)?)
    } else {
        let word_start = s.pos();
        let word = s.take_word();
        if word.is_empty() {
            return Err(codes::s0005(s.range_at(s.pos())));
        }
        AttrOperand::Ord {
            name: Id::from_upper(&word),
            range: s.range(word_start, s.pos()),
        }
    };
    Ok(CaExpr::AttrRef {
        attr,
        operand,
        range: s.range(start, s.pos()),
    })
}

fn parse_self_def(s: &mut Scanner, start: usize) -> ParseResult<CaExpr> {
    let Some(kind) = s.bump() else {
        return Err(codes::s0005(s.range_at(start)));
    };
    let kind = kind.to_ascii_uppercase();
    s.bump(); // apostrophe
    let mut text = String::new();
    loop {
        match s.peek() {
            None => return Err(codes::s0003(s.range(start, s.pos()))),
            Some('\'') if s.peek_at(1) == Some('\'') => {
                text.push('\'');
                s.bump();
                s.bump();
            }
            Some('\'') => {
                s.bump();
                break;
            }
            Some(c) => {
                text.push(c);
                s.bump();
            }
        }
    }
    Ok(CaExpr::SelfDef {
        kind,
        text,
        range: s.range(start, s.pos()),
    })
}

/// Parse a quoted character expression with in-string substitution.
fn parse_quoted(s: &mut Scanner, start: usize) -> ParseResult<CaExpr> {
    s.bump(); // opening apostrophe
    let mut parts = Vec::new();
    let mut buf = String::new();
    loop {
        match s.peek() {
            None => return Err(codes::s0003(s.range(start, s.pos()))),
            Some('\'') if s.peek_at(1) == Some('\'') => {
                buf.push('\'');
                s.bump();
                s.bump();
            }
            Some('\'') => {
                s.bump();
                break;
            }
            Some('&') if s.peek_at(1) == Some('&') => {
                buf.push('&');
                s.bump();
                s.bump();
            }
            Some('&') => {
                if !buf.is_empty() {
                    parts.push(StrPart::Text(std::mem::take(&mut buf)));
                }
                let var = parse_var_ref(s)?;
                parts.push(StrPart::Var(var));
                // A period right after a substitution is the
                // concatenation separator; it produces no text.
                if s.peek() == Some('.') {
                    s.bump();
                }
            }
            Some(c) => {
                buf.push(c);
                s.bump();
            }
        }
    }
    if !buf.is_empty() || parts.is_empty() {
        parts.push(StrPart::Text(buf));
    }
    Ok(CaExpr::Str {
        parts,
        range: s.range(start, s.pos()),
    })
}

fn maybe_substring(s: &mut Scanner, value: CaExpr, start: usize) -> ParseResult<CaExpr> {
    if s.peek() != Some('(') {
        return Ok(value);
    }
    s.bump();
    let sub_start = parse_ca_expr(s)?;
    s.skip_blanks();
    let length = if s.eat(',') {
        s.skip_blanks();
        if s.peek() == Some('*') {
            s.bump();
            None
        } else {
            Some(Box::new(parse_ca_expr(s)?))
        }
    } else {
        None
    };
    s.skip_blanks();
    if !s.eat(')') {
        return Err(codes::s0002(s.range_at(s.pos()), ")"));
    }
    Ok(CaExpr::Substr {
        value: Box::new(value),
        start: Box::new(sub_start),
        length,
        range: s.range(start, s.pos()),
    })
}

/// Parse a variable symbol reference at `&`.
pub fn parse_var_ref(s: &mut Scanner) -> ParseResult<VarRef> {
    let start = s.pos();
    s.bump(); // ampersand
    let name_text = s.take_word();
    if name_text.is_empty() {
        return Err(codes::s0002(s.range_at(start), "&"));
    }
    let name = Id::from_upper(&name_text);
    let subscript = if s.peek() == Some('(') {
        s.bump();
        let expr = parse_ca_expr(s)?;
        s.skip_blanks();
        if !s.eat(')') {
            return Err(codes::s0002(s.range_at(s.pos()), ")"));
        }
        Some(Box::new(expr))
    } else {
        None
    };
    Ok(VarRef {
        name,
        subscript,
        range: s.range(start, s.pos()),
    })
}
