//! Diagnostic constructors, one per stable code.
//!
//! Code families follow the assembler's conventions: `A` for assembler
//! statement operands, `CE` for conditional-assembly evaluation, `D` for
//! data definitions, `E` for general errors, `S` for operand-field syntax,
//! `W` for warnings.

use super::{Diagnostic, Severity};
use crate::span::Range;

// ---------------------------------------------------------------------------
// W/S: lexical and operand-field syntax
// ---------------------------------------------------------------------------

pub fn w010(range: Range) -> Diagnostic {
    Diagnostic::new(
        "W010",
        Severity::Warning,
        range,
        "continuation character detected but continuation is disabled",
    )
}

pub fn w011(range: Range) -> Diagnostic {
    Diagnostic::new(
        "W011",
        Severity::Warning,
        range,
        "continued line is not blank before the continue column",
    )
}

pub fn s0002(range: Range, found: &str) -> Diagnostic {
    Diagnostic::new(
        "S0002",
        Severity::Error,
        range,
        format!("unexpected '{found}' in operand field"),
    )
}

pub fn s0003(range: Range) -> Diagnostic {
    Diagnostic::new("S0003", Severity::Error, range, "unclosed string literal")
}

pub fn s0005(range: Range) -> Diagnostic {
    Diagnostic::new("S0005", Severity::Error, range, "expected an expression")
}

// ---------------------------------------------------------------------------
// A: assembler statement operands
// ---------------------------------------------------------------------------

pub fn a010(instr: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "A010",
        Severity::Error,
        range,
        format!("too many operands for instruction {instr}"),
    )
}

pub fn a011(instr: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "A011",
        Severity::Error,
        range,
        format!("missing operand for instruction {instr}"),
    )
}

pub fn a021(range: Range) -> Diagnostic {
    Diagnostic::new(
        "A021",
        Severity::Error,
        range,
        "ICTL operand value out of range",
    )
}

pub fn a100(instr: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "A100",
        Severity::Error,
        range,
        format!("invalid operand format for instruction {instr}"),
    )
}

pub fn a109(option: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "A109",
        Severity::Warning,
        range,
        format!("unrecognized *PROCESS option '{option}'"),
    )
}

// ---------------------------------------------------------------------------
// CE: conditional-assembly evaluation
// ---------------------------------------------------------------------------

pub fn ce002(range: Range) -> Diagnostic {
    Diagnostic::new(
        "CE002",
        Severity::Error,
        range,
        "arithmetic overflow in conditional assembly expression",
    )
}

pub fn ce004(value: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "CE004",
        Severity::Error,
        range,
        format!("cannot convert character value '{value}' to a number"),
    )
}

pub fn ce007(range: Range) -> Diagnostic {
    Diagnostic::new(
        "CE007",
        Severity::Error,
        range,
        "invalid substring specification",
    )
}

pub fn ce012(range: Range) -> Diagnostic {
    Diagnostic::new("CE012", Severity::Error, range, "division by zero")
}

// ---------------------------------------------------------------------------
// D: data definitions
// ---------------------------------------------------------------------------

pub fn d010(type_str: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "D010",
        Severity::Error,
        range,
        format!("unknown data definition type '{type_str}'"),
    )
}

pub fn d021(range: Range) -> Diagnostic {
    Diagnostic::new("D021", Severity::Error, range, "invalid length modifier")
}

pub fn d022(type_char: char, range: Range) -> Diagnostic {
    Diagnostic::new(
        "D022",
        Severity::Error,
        range,
        format!("bit length is not allowed for type {type_char}"),
    )
}

// ---------------------------------------------------------------------------
// E: general semantic errors
// ---------------------------------------------------------------------------

pub fn e010(name: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "E010",
        Severity::Error,
        range,
        format!("unknown symbol '{name}'"),
    )
}

pub fn e031(name: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "E031",
        Severity::Error,
        range,
        format!("symbol '{name}' is already defined"),
    )
}

pub fn e042(range: Range) -> Diagnostic {
    Diagnostic::new(
        "E042",
        Severity::Error,
        range,
        "macro prototype statement expected",
    )
}

pub fn e043(range: Range) -> Diagnostic {
    Diagnostic::new(
        "E043",
        Severity::Error,
        range,
        "invalid macro prototype parameter",
    )
}

pub fn e044(range: Range) -> Diagnostic {
    Diagnostic::new("E044", Severity::Error, range, "illegal name field")
}

pub fn e045(name: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "E045",
        Severity::Error,
        range,
        format!("sequence symbol '{name}' is already defined"),
    )
}

pub fn e046(range: Range) -> Diagnostic {
    Diagnostic::new("E046", Severity::Error, range, "missing MEND")
}

pub fn e047(name: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "E047",
        Severity::Error,
        range,
        format!("lookahead failed, symbol '{name}' not found"),
    )
}

pub fn e049(name: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "E049",
        Severity::Error,
        range,
        format!("operation code '{name}' not found"),
    )
}

pub fn e056(range: Range) -> Diagnostic {
    Diagnostic::new(
        "E056",
        Severity::Error,
        range,
        "ACTR branch counter exhausted, macro terminated",
    )
}

pub fn e058(name: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "E058",
        Severity::Error,
        range,
        format!("copy member '{name}' not found"),
    )
}

pub fn e062(name: &str, range: Range) -> Diagnostic {
    Diagnostic::new(
        "E062",
        Severity::Error,
        range,
        format!("recursive use of copy member '{name}'"),
    )
}

pub fn e064(range: Range) -> Diagnostic {
    Diagnostic::new(
        "E064",
        Severity::Error,
        range,
        "AREAD is only allowed inside a macro definition",
    )
}

pub fn e080(range: Range) -> Diagnostic {
    Diagnostic::new(
        "E080",
        Severity::Error,
        range,
        "illegal combination of relocatable terms",
    )
}

// ---------------------------------------------------------------------------
// MNOTE
// ---------------------------------------------------------------------------

/// MNOTE output. Severity: `*` or 0 maps to info, 1-7 to warning, 8 and
/// above to error.
pub fn mnote(severity_code: Option<u32>, text: &str, range: Range) -> Diagnostic {
    let severity = match severity_code {
        None | Some(0) => Severity::Info,
        Some(1..=7) => Severity::Warning,
        Some(_) => Severity::Error,
    };
    Diagnostic::new("MNOTE", severity, range, text.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{Position, Range};

    fn r() -> Range {
        Range::point(Position::new(0, 0))
    }

    #[test]
    fn test_code_strings_are_stable() {
        assert_eq!(e045("X", r()).code, "E045");
        assert_eq!(e047("X", r()).code, "E047");
        assert_eq!(e049("X", r()).code, "E049");
        assert_eq!(w010(r()).code, "W010");
    }

    #[test]
    fn test_mnote_severity_mapping() {
        assert_eq!(mnote(None, "m", r()).severity, Severity::Info);
        assert_eq!(mnote(Some(0), "m", r()).severity, Severity::Info);
        assert_eq!(mnote(Some(1), "m", r()).severity, Severity::Warning);
        assert_eq!(mnote(Some(7), "m", r()).severity, Severity::Warning);
        assert_eq!(mnote(Some(8), "m", r()).severity, Severity::Error);
        assert_eq!(mnote(Some(255), "m", r()).severity, Severity::Error);
    }

    #[test]
    fn test_messages_carry_names() {
        assert!(e058("CPYMEM", r()).message.contains("CPYMEM"));
        assert!(e049("ZZZ", r()).message.contains("ZZZ"));
    }
}
