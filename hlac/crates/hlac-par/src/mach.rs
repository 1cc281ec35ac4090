//! Machine and assembler expressions: AST and parser.
//!
//! These are the expressions of machine operands, EQU values, USING
//! arguments, and data-definition modifiers. Terms are ordinary symbols,
//! numbers, the location counter `*`, length-style attribute references,
//! and self-defining terms; the relocatable/absolute algebra is applied at
//! evaluation time.

use hlac_util::diagnostic::codes;
use hlac_util::span::Range;
use hlac_util::{Diagnostic, Id};

use crate::ca::AttrKind;
use crate::scanner::{is_attribute_quote, Scanner};

/// Binary operators of machine expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MachBinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Machine expression.
#[derive(Clone, Debug, PartialEq)]
pub enum MachExpr {
    Num {
        value: i64,
        range: Range,
    },
    Sym {
        name: Id,
        range: Range,
    },
    /// Current location counter, `*`.
    LocCtr {
        range: Range,
    },
    /// Self-defining term: `X'..'`, `B'..'`, `C'..'`.
    SelfDef {
        kind: char,
        text: String,
        range: Range,
    },
    /// Attribute reference applied to an ordinary symbol, `L'SYM`.
    AttrRef {
        attr: AttrKind,
        name: Id,
        range: Range,
    },
    Unary {
        negative: bool,
        operand: Box<MachExpr>,
        range: Range,
    },
    Binary {
        op: MachBinOp,
        left: Box<MachExpr>,
        right: Box<MachExpr>,
        range: Range,
    },
}

impl MachExpr {
    pub fn range(&self) -> Range {
        match self {
            MachExpr::Num { range, .. }
            | MachExpr::Sym { range, .. }
            | MachExpr::LocCtr { range }
            | MachExpr::SelfDef { range, .. }
            | MachExpr::AttrRef { range, .. }
            | MachExpr::Unary { range, .. }
            | MachExpr::Binary { range, .. } => *range,
        }
    }

    /// Ordinary symbols referenced by the expression.
    pub fn collect_symbols(&self, out: &mut Vec<Id>) {
        match self {
            MachExpr::Sym { name, .. } => out.push(*name),
            MachExpr::AttrRef { name, .. } => out.push(*name),
            MachExpr::Unary { operand, .. } => operand.collect_symbols(out),
            MachExpr::Binary { left, right, .. } => {
                left.collect_symbols(out);
                right.collect_symbols(out);
            }
            _ => {}
        }
    }
}

type ParseResult<T> = Result<T, Diagnostic>;

/// Parse a machine expression from the scanner position.
pub fn parse_mach_expr(s: &mut Scanner) -> ParseResult<MachExpr> {
    let mut left = parse_term(s)?;
    loop {
        let op = match s.peek() {
            Some('+') => MachBinOp::Add,
            Some('-') => MachBinOp::Sub,
            Some('*') => MachBinOp::Mul,
            Some('/') => MachBinOp::Div,
            _ => return Ok(left),
        };
        // `*` is also a term; a multiply must be followed by a term start.
        if op == MachBinOp::Mul && !term_follows(s, 1) {
            return Ok(left);
        }
        s.bump();
        let right = parse_term(s)?;
        let range = left.range().union(right.range());
        left = MachExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            range,
        };
    }
}

fn term_follows(s: &Scanner, offset: usize) -> bool {
    matches!(
        s.peek_at(offset),
        Some(c) if c.is_ascii_alphanumeric()
            || matches!(c, '@' | '#' | '$' | '_' | '*' | '(' | '+' | '-' | '=' | '\'')
    )
}

fn parse_term(s: &mut Scanner) -> ParseResult<MachExpr> {
    let start = s.pos();
    match s.peek() {
        None => Err(codes::s0005(s.range_at(start))),
        Some('+') | Some('-') => {
            let negative = s.bump() == Some('-');
            let operand = parse_term(s)?;
            let range = s.range_at(start).union(operand.range());
            Ok(MachExpr::Unary {
                negative,
                operand: Box::new(operand),
                range,
            })
        }
        Some('(') => {
            s.bump();
            let inner = parse_mach_expr(s)?;
            if !s.eat(')') {
                return Err(codes::s0002(s.range_at(s.pos()), ")"));
            }
            Ok(inner)
        }
        Some('*') => {
            s.bump();
            Ok(MachExpr::LocCtr {
                range: s.range(start, s.pos()),
            })
        }
        Some(c) if c.is_ascii_digit() => {
            let digits = s.take_while(|c| c.is_ascii_digit());
            let range = s.range(start, s.pos());
            digits
                .parse::<i64>()
                .map(|value| MachExpr::Num { value, range })
                .map_err(|_| codes::ce002(range))
        }
        Some(c) if c.is_ascii_alphabetic() || matches!(c, '@' | '#' | '$' | '_') => {
            if s.peek_at(1) == Some('\'') {
                if let Some(attr) = AttrKind::from_char(c) {
                    if attr_quote_here(s) {
                        s.bump();
                        s.bump();
                        let word = s.take_word();
                        if word.is_empty() {
                            return Err(codes::s0005(s.range_at(s.pos())));
                        }
                        return Ok(MachExpr::AttrRef {
                            attr,
                            name: Id::from_upper(&word),
                            range: s.range(start, s.pos()),
                        });
                    }
                }
                if matches!(c.to_ascii_uppercase(), 'B' | 'C' | 'X') {
                    return parse_self_def(s, start);
                }
            }
            let word = s.take_word();
            Ok(MachExpr::Sym {
                name: Id::from_upper(&word),
                range: s.range(start, s.pos()),
            })
        }
        Some(c) => Err(codes::s0002(s.range_at(start), &c.to_string())),
    }
}

fn attr_quote_here(s: &Scanner) -> bool {
    let ctx: Vec<char> = [Some(' '), s.peek(), s.peek_at(1), s.peek_at(2)]
        .into_iter()
        .flatten()
        .collect();
    ctx.len() >= 3 && is_attribute_quote(&ctx, 2)
}

fn parse_self_def(s: &mut Scanner, start: usize) -> ParseResult<MachExpr> {
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
    Ok(MachExpr::SelfDef {
        kind,
        text,
        range: s.range(start, s.pos()),
    })
}
