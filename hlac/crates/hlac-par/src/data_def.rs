//! Data definition operands.
//!
//! A DC/DS operand is `[dup]T[ext][Ln|L.n][Sn][En][P(x)]['nominal'|(exprs)]`.
//! Modifier values are literal integers or parenthesized expressions. Bit
//! lengths (`L.`) are only legal for types that support them.

use hlac_util::diagnostic::codes;
use hlac_util::span::Range;
use hlac_util::Diagnostic;

use crate::mach::{parse_mach_expr, MachExpr};
use crate::scanner::Scanner;

/// Static description of one data definition type.
#[derive(Clone, Copy, Debug)]
pub struct DataDefType {
    pub type_char: char,
    /// Implied length in bytes when no length modifier is given.
    pub implied_length: u32,
    /// Required storage alignment in bytes.
    pub alignment: u32,
    /// Whether a bit length modifier (`L.`) is accepted.
    pub bit_length_allowed: bool,
    /// Whether the nominal value is quoted (`'..'`) rather than
    /// parenthesized expressions.
    pub quoted_nominal: bool,
}

/// The supported data definition types.
pub const DATA_DEF_TYPES: &[DataDefType] = &[
    DataDefType { type_char: 'A', implied_length: 4, alignment: 4, bit_length_allowed: true, quoted_nominal: false },
    DataDefType { type_char: 'B', implied_length: 1, alignment: 1, bit_length_allowed: true, quoted_nominal: true },
    DataDefType { type_char: 'C', implied_length: 1, alignment: 1, bit_length_allowed: true, quoted_nominal: true },
    DataDefType { type_char: 'D', implied_length: 8, alignment: 8, bit_length_allowed: false, quoted_nominal: true },
    DataDefType { type_char: 'E', implied_length: 4, alignment: 4, bit_length_allowed: false, quoted_nominal: true },
    DataDefType { type_char: 'F', implied_length: 4, alignment: 4, bit_length_allowed: true, quoted_nominal: true },
    DataDefType { type_char: 'H', implied_length: 2, alignment: 2, bit_length_allowed: true, quoted_nominal: true },
    DataDefType { type_char: 'L', implied_length: 16, alignment: 8, bit_length_allowed: false, quoted_nominal: true },
    DataDefType { type_char: 'P', implied_length: 1, alignment: 1, bit_length_allowed: true, quoted_nominal: true },
    DataDefType { type_char: 'S', implied_length: 2, alignment: 2, bit_length_allowed: false, quoted_nominal: false },
    DataDefType { type_char: 'V', implied_length: 4, alignment: 4, bit_length_allowed: false, quoted_nominal: false },
    DataDefType { type_char: 'X', implied_length: 1, alignment: 1, bit_length_allowed: true, quoted_nominal: true },
    DataDefType { type_char: 'Y', implied_length: 2, alignment: 2, bit_length_allowed: true, quoted_nominal: false },
    DataDefType { type_char: 'Z', implied_length: 1, alignment: 1, bit_length_allowed: true, quoted_nominal: true },
];

/// Look up a data definition type by its letter.
pub fn data_def_type(c: char) -> Option<&'static DataDefType> {
    let upper = c.to_ascii_uppercase();
    DATA_DEF_TYPES.iter().find(|t| t.type_char == upper)
}

/// Length modifier flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthType {
    Byte,
    Bit,
}

/// Parsed length modifier.
#[derive(Clone, Debug, PartialEq)]
pub struct DataDefLength {
    pub value: MachExpr,
    pub len_type: LengthType,
    pub range: Range,
}

/// Nominal value of a data definition operand.
#[derive(Clone, Debug, PartialEq)]
pub enum NominalValue {
    String { value: String, range: Range },
    Exprs { values: Vec<MachExpr>, range: Range },
}

/// One parsed data definition operand.
#[derive(Clone, Debug, PartialEq)]
pub struct DataDefOperand {
    pub dupl_factor: Option<MachExpr>,
    pub type_char: char,
    pub type_extension: Option<char>,
    pub length: Option<DataDefLength>,
    pub scale: Option<MachExpr>,
    pub exponent: Option<MachExpr>,
    pub program_type: Option<MachExpr>,
    pub nominal: Option<NominalValue>,
    pub range: Range,
}

impl DataDefOperand {
    /// Length in bytes: explicit byte length, or the type's implied
    /// length. Bit lengths round up to whole bytes.
    pub fn length_or_implied(&self) -> u32 {
        match &self.length {
            Some(DataDefLength {
                value: MachExpr::Num { value, .. },
                len_type,
                ..
            }) => {
                let v = (*value).max(0) as u32;
                match len_type {
                    LengthType::Byte => v,
                    LengthType::Bit => v.div_ceil(8),
                }
            }
            _ => data_def_type(self.type_char)
                .map(|t| t.implied_length)
                .unwrap_or(1),
        }
    }
}

type ParseResult<T> = Result<T, Diagnostic>;

/// Parse one data definition operand from the scanner position.
pub fn parse_data_def(s: &mut Scanner) -> ParseResult<DataDefOperand> {
    let start = s.pos();

    // Duplication factor: digits or a parenthesized expression.
    let dupl_factor = if s.peek().is_some_and(|c| c.is_ascii_digit()) {
        Some(parse_int_term(s)?)
    } else if s.peek() == Some('(') {
        s.bump();
        let expr = parse_mach_expr(s)?;
        if !s.eat(')') {
            return Err(codes::s0002(s.range_at(s.pos()), ")"));
        }
        Some(expr)
    } else {
        None
    };

    // Type character.
    let type_start = s.pos();
    let Some(type_char) = s.peek().filter(|c| c.is_ascii_alphabetic()) else {
        return Err(codes::d010(
            &s.peek().map(String::from).unwrap_or_default(),
            s.range_at(s.pos()),
        ));
    };
    s.bump();
    let type_char = type_char.to_ascii_uppercase();
    let Some(type_info) = data_def_type(type_char) else {
        return Err(codes::d010(
            &type_char.to_string(),
            s.range(type_start, s.pos()),
        ));
    };

    // Optional type extension: one more letter when it is not itself a
    // modifier or nominal introducer (floating point DH/DB, character CU).
    let type_extension = match s.peek() {
        Some(c)
            if c.is_ascii_alphabetic()
                && !matches!(c.to_ascii_uppercase(), 'L' | 'S' | 'E' | 'P') =>
        {
            s.bump();
            Some(c.to_ascii_uppercase())
        }
        _ => None,
    };

    let mut length = None;
    let mut scale = None;
    let mut exponent = None;
    let mut program_type = None;

    loop {
        match s.peek().map(|c| c.to_ascii_uppercase()) {
            Some('L') if length.is_none() => {
                let mod_start = s.pos();
                s.bump();
                let len_type = if s.eat('.') {
                    LengthType::Bit
                } else {
                    LengthType::Byte
                };
                if len_type == LengthType::Bit && !type_info.bit_length_allowed {
                    return Err(codes::d022(type_char, s.range(mod_start, s.pos())));
                }
                let value = parse_modifier_value(s)?;
                length = Some(DataDefLength {
                    value,
                    len_type,
                    range: s.range(mod_start, s.pos()),
                });
            }
            Some('S') if scale.is_none() && modifier_value_follows(s) => {
                s.bump();
                scale = Some(parse_modifier_value(s)?);
            }
            Some('E') if exponent.is_none() && modifier_value_follows(s) => {
                s.bump();
                exponent = Some(parse_modifier_value(s)?);
            }
            Some('P') if program_type.is_none() && s.peek_at(1) == Some('(') => {
                s.bump();
                s.bump();
                let expr = parse_mach_expr(s)?;
                if !s.eat(')') {
                    return Err(codes::s0002(s.range_at(s.pos()), ")"));
                }
                program_type = Some(expr);
            }
            _ => break,
        }
    }

    // Nominal value.
    let nominal = match s.peek() {
        Some('\'') => {
            let nom_start = s.pos();
            s.bump();
            let mut value = String::new();
            loop {
                match s.peek() {
                    None => return Err(codes::s0003(s.range(nom_start, s.pos()))),
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
            Some(NominalValue::String {
                value,
                range: s.range(nom_start, s.pos()),
            })
        }
        Some('(') => {
            let nom_start = s.pos();
            s.bump();
            let mut values = Vec::new();
            loop {
                values.push(parse_mach_expr(s)?);
                if s.eat(',') {
                    continue;
                }
                if s.eat(')') {
                    break;
                }
                return Err(codes::s0002(s.range_at(s.pos()), ")"));
            }
            Some(NominalValue::Exprs {
                values,
                range: s.range(nom_start, s.pos()),
            })
        }
        _ => None,
    };

    Ok(DataDefOperand {
        dupl_factor,
        type_char,
        type_extension,
        length,
        scale,
        exponent,
        program_type,
        nominal,
        range: s.range(start, s.pos()),
    })
}

/// True when the character after a scale/exponent letter can start its
/// value; otherwise the letter belongs to the nominal value.
fn modifier_value_follows(s: &Scanner) -> bool {
    matches!(
        s.peek_at(1),
        Some(c) if c.is_ascii_digit() || matches!(c, '(' | '+' | '-')
    )
}

fn parse_modifier_value(s: &mut Scanner) -> ParseResult<MachExpr> {
    match s.peek() {
        Some('(') => {
            s.bump();
            let expr = parse_mach_expr(s)?;
            if !s.eat(')') {
                return Err(codes::s0002(s.range_at(s.pos()), ")"));
            }
            Ok(expr)
        }
        Some(c) if c.is_ascii_digit() || c == '+' || c == '-' => parse_int_term(s),
        _ => Err(codes::d021(s.range_at(s.pos()))),
    }
}

fn parse_int_term(s: &mut Scanner) -> ParseResult<MachExpr> {
    let start = s.pos();
    let negative = s.eat('-');
    if !negative {
        s.eat('+');
    }
    let digits = s.take_while(|c| c.is_ascii_digit());
    let range = s.range(start, s.pos());
    if digits.is_empty() {
        return Err(codes::d021(range));
    }
    let value: i64 = digits.parse().map_err(|_| codes::ce002(range))?;
    Ok(MachExpr::Num {
        value: if negative { -value } else { value },
        range,
    })
}
