//! Typed operands, one family per processing form.

use hlac_util::span::Range;
use hlac_util::Id;

use crate::ca::{CaExpr, VarRef};
use crate::data_def::DataDefOperand;
use crate::mach::MachExpr;

/// Parsed operand list with its covering range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Operands {
    pub list: Vec<Operand>,
    pub range: Range,
}

impl Operands {
    pub fn empty(range: Range) -> Self {
        Self {
            list: Vec::new(),
            range,
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// A single operand, typed by the grammar it was parsed under.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Position held by a missing operand (`A,,B`).
    Empty(Range),
    Mach(MachOperand),
    Asm(AsmOperand),
    Ca(CaOperand),
    DataDef(Box<DataDefOperand>),
    Mac(MacroOperand),
}

impl Operand {
    pub fn range(&self) -> Range {
        match self {
            Operand::Empty(range) => *range,
            Operand::Mach(op) => op.range(),
            Operand::Asm(op) => op.range(),
            Operand::Ca(op) => op.range(),
            Operand::DataDef(op) => op.range,
            Operand::Mac(op) => op.range,
        }
    }
}

/// Machine instruction operand.
#[derive(Clone, Debug, PartialEq)]
pub enum MachOperand {
    /// Plain expression: register, immediate, relocatable address.
    Expr(MachExpr),
    /// `disp(base)`
    DispBase {
        disp: MachExpr,
        base: MachExpr,
        range: Range,
    },
    /// `disp(index,base)`; either part may be omitted (`disp(,base)`).
    DispIdxBase {
        disp: MachExpr,
        index: Option<MachExpr>,
        base: MachExpr,
        range: Range,
    },
    /// Literal operand `=X'..'`, `=F'1'`, ...
    Literal {
        data: Box<DataDefOperand>,
        range: Range,
    },
}

impl MachOperand {
    pub fn range(&self) -> Range {
        match self {
            MachOperand::Expr(e) => e.range(),
            MachOperand::DispBase { range, .. }
            | MachOperand::DispIdxBase { range, .. }
            | MachOperand::Literal { range, .. } => *range,
        }
    }
}

/// Assembler instruction operand.
#[derive(Clone, Debug, PartialEq)]
pub enum AsmOperand {
    /// Expression operand (absolute or relocatable).
    Expr(MachExpr),
    /// Quoted string operand.
    String { value: String, range: Range },
    /// `KEYWORD(value,...)` complex operand.
    Complex {
        key: Id,
        values: Vec<String>,
        range: Range,
    },
    /// `(begin,end)` range head of a USING statement.
    UsingRange {
        begin: MachExpr,
        end: MachExpr,
        range: Range,
    },
}

impl AsmOperand {
    pub fn range(&self) -> Range {
        match self {
            AsmOperand::Expr(e) => e.range(),
            AsmOperand::String { range, .. }
            | AsmOperand::Complex { range, .. }
            | AsmOperand::UsingRange { range, .. } => *range,
        }
    }
}

/// Conditional-assembly operand.
#[derive(Clone, Debug, PartialEq)]
pub enum CaOperand {
    /// Sequence symbol target, `.NAME`.
    Seq { name: Id, range: Range },
    /// Variable symbol, declaration or SET target.
    Var { var: VarRef, range: Range },
    /// Expression operand.
    Expr { expr: CaExpr, range: Range },
    /// `(condition).NAME` conditional branch.
    Branch {
        condition: Option<CaExpr>,
        target: Id,
        range: Range,
    },
}

impl CaOperand {
    pub fn range(&self) -> Range {
        match self {
            CaOperand::Seq { range, .. }
            | CaOperand::Var { range, .. }
            | CaOperand::Expr { range, .. }
            | CaOperand::Branch { range, .. } => *range,
        }
    }
}

/// Macro call operand: kept as text (plus its position) so parameter
/// values can be re-split and re-substituted during expansion.
#[derive(Clone, Debug, PartialEq)]
pub struct MacroOperand {
    pub text: String,
    pub range: Range,
}

impl MacroOperand {
    /// Split a `KEY=value` operand into its keyword and value parts.
    pub fn keyword_split(&self) -> Option<(&str, &str)> {
        let eq = self.text.find('=')?;
        let key = &self.text[..eq];
        if !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '#' | '$' | '_'))
            && key.chars().next().is_some_and(|c| !c.is_ascii_digit())
        {
            Some((key, &self.text[eq + 1..]))
        } else {
            None
        }
    }
}
