//! Expression evaluation.
//!
//! Evaluation reads the context, never writes it. Failures emit a
//! diagnostic and produce a sentinel value (0, false, empty string) so a
//! single bad sub-expression does not cascade.
//!
//! Attribute references to ordinary symbols the context does not know yet
//! are collected in `undefined_attr_refs`; the pipeline decides whether
//! to launch an attribute lookahead and re-evaluate.

use hlac_util::diagnostic::codes;
use hlac_util::span::Range;
use hlac_util::{Diagnostic, Id, Idx};

use hlac_par::ca::{AttrKind, AttrOperand, CaBinOp, CaExpr, CaUnaryOp, StrPart, VarRef};
use hlac_par::mach::{MachBinOp, MachExpr};

use crate::macro_def::{sublist_count, sublist_element};
use crate::ordinary::{Section, SymbolValue};
use crate::variables::{SetValue, SetVariable};
use crate::{HlasmContext, ResolvedOpcode};

/// Value of a machine expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MachValue {
    Abs(i64),
    Reloc { section: Idx<Section>, offset: i64 },
    /// Sentinel for failed or not-yet-resolvable sub-expressions.
    Error,
}

/// Expression evaluator over a context snapshot.
pub struct Evaluator<'a> {
    ctx: &'a HlasmContext,
    /// Diagnostics produced while evaluating.
    pub diags: Vec<Diagnostic>,
    /// Ordinary symbols whose attributes were needed but unknown.
    pub undefined_attr_refs: Vec<Id>,
    /// Ordinary symbols referenced by machine expressions but not
    /// defined; not an error (forward references are normal).
    pub undefined_symbols: Vec<Id>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: &'a HlasmContext) -> Self {
        Self {
            ctx,
            diags: Vec::new(),
            undefined_attr_refs: Vec::new(),
            undefined_symbols: Vec::new(),
        }
    }

    // -- conversions -------------------------------------------------------

    pub fn to_num(&mut self, value: &SetValue, range: Range) -> i32 {
        match value {
            SetValue::A(v) => *v,
            SetValue::B(b) => *b as i32,
            SetValue::C(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return 0;
                }
                match t.parse::<i64>() {
                    Ok(v) if v >= i32::MIN as i64 && v <= i32::MAX as i64 => v as i32,
                    _ => {
                        self.diags.push(codes::ce004(s, range));
                        0
                    }
                }
            }
        }
    }

    /// Arithmetic-to-character conversion: unsigned decimal magnitude.
    pub fn to_str(&mut self, value: &SetValue) -> String {
        match value {
            SetValue::A(v) => v.unsigned_abs().to_string(),
            SetValue::B(b) => if *b { "1" } else { "0" }.to_owned(),
            SetValue::C(s) => s.clone(),
        }
    }

    pub fn to_bool(&mut self, value: &SetValue, range: Range) -> bool {
        match value {
            SetValue::A(v) => *v != 0,
            SetValue::B(b) => *b,
            SetValue::C(s) => match s.trim() {
                "" | "0" => false,
                "1" => true,
                other => {
                    self.diags.push(codes::ce004(other, range));
                    false
                }
            },
        }
    }

    // -- variable lookup ---------------------------------------------------

    /// Read a variable symbol: SET variables, macro parameters, then
    /// system variables. `None` when nothing by that name is visible.
    pub fn lookup_var(&mut self, var: &VarRef) -> Option<SetValue> {
        let index = match &var.subscript {
            Some(sub) => {
                let v = self.eval_ca(sub);
                Some(self.to_num(&v, sub.range()).max(0) as u32)
            }
            None => None,
        };

        if let Some(set_var) = self.ctx.find_variable(var.name) {
            return Some(read_set_var(set_var, index));
        }

        if let Some(frame) = self.ctx.current_frame() {
            let def = &self.ctx.macros[frame.def];
            if def.name_param == Some(var.name) {
                return Some(SetValue::C(frame.name_argument.clone().unwrap_or_default()));
            }
            if let Some(value) = frame.bindings.get(&var.name) {
                return Some(SetValue::C(match index {
                    Some(i) => sublist_element(value, i as usize).to_owned(),
                    None => value.clone(),
                }));
            }
        }

        self.system_variable(var.name)
    }

    fn system_variable(&self, name: Id) -> Option<SetValue> {
        let ctx = self.ctx;
        Some(match name.as_str() {
            "SYSNDX" => SetValue::C(format!(
                "{:04}",
                ctx.current_frame().map(|f| f.sysndx).unwrap_or(0)
            )),
            "SYSPARM" => SetValue::C(ctx.options.sysparm.clone()),
            "SYSDATE" => SetValue::C(ctx.options.sysdate.clone()),
            "SYSTIME" => SetValue::C(ctx.options.systime.clone()),
            "SYSNEST" => SetValue::A(ctx.macro_stack.len() as i32),
            "SYSMAC" => SetValue::C(
                ctx.current_frame()
                    .map(|f| ctx.macros[f.def].name.as_str().to_owned())
                    .unwrap_or_default(),
            ),
            "SYSECT" | "SYSLOC" => SetValue::C(
                ctx.ordinals
                    .current_section()
                    .map(|idx| ctx.ordinals.sections[idx].name.as_str().to_owned())
                    .unwrap_or_default(),
            ),
            _ => return None,
        })
    }

    // -- conditional assembly ---------------------------------------------

    pub fn eval_ca(&mut self, expr: &CaExpr) -> SetValue {
        match expr {
            CaExpr::Num { value, .. } => SetValue::A(*value),
            CaExpr::SelfDef { kind, text, range } => {
                SetValue::A(self.self_def_value(*kind, text, *range))
            }
            CaExpr::Str { parts, .. } => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StrPart::Text(t) => out.push_str(t),
                        StrPart::Var(var) => match self.lookup_var(var) {
                            Some(v) => out.push_str(&self.to_str(&v)),
                            None => {
                                self.diags
                                    .push(codes::e010(var.name.as_str(), var.range));
                            }
                        },
                    }
                }
                SetValue::C(out)
            }
            CaExpr::Substr {
                value,
                start,
                length,
                range,
            } => {
                let base = self.eval_ca(value);
                let text = self.to_str(&base);
                let first = {
                    let v = self.eval_ca(start);
                    self.to_num(&v, start.range())
                };
                let count = match length {
                    Some(l) => {
                        let v = self.eval_ca(l);
                        Some(self.to_num(&v, l.range()))
                    }
                    None => None,
                };
                SetValue::C(self.substring(&text, first, count, *range))
            }
            CaExpr::Var(var) => match self.lookup_var(var) {
                Some(v) => v,
                None => {
                    self.diags.push(codes::e010(var.name.as_str(), var.range));
                    SetValue::C(String::new())
                }
            },
            CaExpr::Sym { name, range } => match self.ctx.ordinals.get(*name) {
                Some(sym) => match sym.value {
                    Some(SymbolValue::Abs(v)) => SetValue::A(v as i32),
                    _ => {
                        self.diags.push(codes::e010(name.as_str(), *range));
                        SetValue::A(0)
                    }
                },
                None => {
                    self.undefined_attr_refs.push(*name);
                    SetValue::A(0)
                }
            },
            CaExpr::AttrRef {
                attr,
                operand,
                range,
            } => self.eval_attr(*attr, operand, *range),
            CaExpr::Unary { op, operand, range } => match op {
                CaUnaryOp::Not => {
                    let v = self.eval_ca(operand);
                    SetValue::B(!self.to_bool(&v, *range))
                }
                CaUnaryOp::Neg => {
                    let v = self.eval_ca(operand);
                    let n = self.to_num(&v, *range);
                    SetValue::A(n.checked_neg().unwrap_or_else(|| {
                        self.diags.push(codes::ce002(*range));
                        0
                    }))
                }
                CaUnaryOp::Plus => {
                    let v = self.eval_ca(operand);
                    SetValue::A(self.to_num(&v, *range))
                }
            },
            CaExpr::Binary {
                op,
                left,
                right,
                range,
            } => self.eval_ca_binary(*op, left, right, *range),
            CaExpr::FunCall { name, args, range } => self.eval_function(*name, args, *range),
        }
    }

    fn eval_ca_binary(
        &mut self,
        op: CaBinOp,
        left: &CaExpr,
        right: &CaExpr,
        range: Range,
    ) -> SetValue {
        match op {
            // Boolean operators short-circuit.
            CaBinOp::And => {
                let l = self.eval_ca(left);
                if !self.to_bool(&l, left.range()) {
                    return SetValue::B(false);
                }
                let r = self.eval_ca(right);
                SetValue::B(self.to_bool(&r, right.range()))
            }
            CaBinOp::Or => {
                let l = self.eval_ca(left);
                if self.to_bool(&l, left.range()) {
                    return SetValue::B(true);
                }
                let r = self.eval_ca(right);
                SetValue::B(self.to_bool(&r, right.range()))
            }
            CaBinOp::Xor => {
                let l = self.eval_ca(left);
                let lb = self.to_bool(&l, left.range());
                let r = self.eval_ca(right);
                let rb = self.to_bool(&r, right.range());
                SetValue::B(lb ^ rb)
            }
            CaBinOp::Concat => {
                let l = self.eval_ca(left);
                let r = self.eval_ca(right);
                let mut s = self.to_str(&l);
                s.push_str(&self.to_str(&r));
                SetValue::C(s)
            }
            CaBinOp::Eq | CaBinOp::Ne | CaBinOp::Lt | CaBinOp::Gt | CaBinOp::Le | CaBinOp::Ge => {
                let l = self.eval_ca(left);
                let r = self.eval_ca(right);
                let ordering = match (&l, &r) {
                    (SetValue::C(a), SetValue::C(b)) => a.cmp(b),
                    _ => {
                        let a = self.to_num(&l, left.range());
                        let b = self.to_num(&r, right.range());
                        a.cmp(&b)
                    }
                };
                SetValue::B(match op {
                    CaBinOp::Eq => ordering.is_eq(),
                    CaBinOp::Ne => ordering.is_ne(),
                    CaBinOp::Lt => ordering.is_lt(),
                    CaBinOp::Gt => ordering.is_gt(),
                    CaBinOp::Le => ordering.is_le(),
                    CaBinOp::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                })
            }
            CaBinOp::Add | CaBinOp::Sub | CaBinOp::Mul | CaBinOp::Div => {
                let l = self.eval_ca(left);
                let a = self.to_num(&l, left.range());
                let r = self.eval_ca(right);
                let b = self.to_num(&r, right.range());
                let result = match op {
                    CaBinOp::Add => a.checked_add(b),
                    CaBinOp::Sub => a.checked_sub(b),
                    CaBinOp::Mul => a.checked_mul(b),
                    CaBinOp::Div => {
                        if b == 0 {
                            self.diags.push(codes::ce012(range));
                            Some(0)
                        } else {
                            a.checked_div(b)
                        }
                    }
                    _ => unreachable!(),
                };
                SetValue::A(result.unwrap_or_else(|| {
                    self.diags.push(codes::ce002(range));
                    0
                }))
            }
        }
    }

    fn eval_attr(&mut self, attr: AttrKind, operand: &AttrOperand, range: Range) -> SetValue {
        match operand {
            AttrOperand::Var(var) => self.eval_var_attr(attr, var, range),
            AttrOperand::Ord { name, range: r } => self.eval_ord_attr(attr, *name, *r),
        }
    }

    fn eval_var_attr(&mut self, attr: AttrKind, var: &VarRef, _range: Range) -> SetValue {
        match attr {
            AttrKind::Count => {
                let value = self.lookup_var(var).unwrap_or(SetValue::C(String::new()));
                SetValue::A(self.to_str(&value).chars().count() as i32)
            }
            AttrKind::Number => {
                // N' of a macro parameter counts sublist entries; of a
                // subscripted SET variable, the highest subscript.
                if let Some(frame) = self.ctx.current_frame() {
                    if let Some(value) = frame.bindings.get(&var.name) {
                        return SetValue::A(sublist_count(value) as i32);
                    }
                }
                match self.ctx.find_variable(var.name) {
                    Some(v) => SetValue::A(v.max_index() as i32),
                    None => SetValue::A(0),
                }
            }
            AttrKind::Type => {
                let value = self.lookup_var(var);
                let t = match &value {
                    None => 'O',
                    Some(v) => {
                        let s = self.to_str(v);
                        if s.is_empty() {
                            'O'
                        } else if s.chars().all(|c| c.is_ascii_digit()) {
                            'N'
                        } else {
                            'U'
                        }
                    }
                };
                SetValue::C(t.to_string())
            }
            AttrKind::Defined => SetValue::A(self.lookup_var(var).is_some() as i32),
            _ => SetValue::A(0),
        }
    }

    fn eval_ord_attr(&mut self, attr: AttrKind, name: Id, range: Range) -> SetValue {
        match attr {
            AttrKind::Defined => {
                let defined = self
                    .ctx
                    .ordinals
                    .get(name)
                    .is_some_and(|s| s.is_defined());
                SetValue::A(defined as i32)
            }
            AttrKind::Opcode => {
                let c = match self.ctx.find_opcode(name) {
                    Some(ResolvedOpcode::Ca(_)) | Some(ResolvedOpcode::Asm(_)) => 'A',
                    Some(ResolvedOpcode::Mach(_)) => 'O',
                    Some(ResolvedOpcode::Macro(_)) => 'M',
                    None => 'U',
                };
                SetValue::C(c.to_string())
            }
            AttrKind::Type | AttrKind::Length | AttrKind::Scale | AttrKind::Integer => {
                match self.ctx.ordinals.get(name) {
                    Some(sym) => match attr {
                        AttrKind::Type => SetValue::C(sym.attributes.type_attr.to_string()),
                        AttrKind::Length => SetValue::A(sym.attributes.length as i32),
                        AttrKind::Scale => SetValue::A(sym.attributes.scale),
                        AttrKind::Integer => SetValue::A(sym.attributes.integer),
                        _ => unreachable!(),
                    },
                    None => {
                        self.undefined_attr_refs.push(name);
                        match attr {
                            AttrKind::Type => SetValue::C("U".to_owned()),
                            AttrKind::Length => SetValue::A(1),
                            _ => SetValue::A(0),
                        }
                    }
                }
            }
            AttrKind::Count | AttrKind::Number => {
                self.diags.push(codes::s0002(range, name.as_str()));
                SetValue::A(0)
            }
        }
    }

    fn substring(&mut self, text: &str, start: i32, length: Option<i32>, range: Range) -> String {
        let chars: Vec<char> = text.chars().collect();
        if start < 1 || (start as usize) > chars.len() + 1 {
            self.diags.push(codes::ce007(range));
            return String::new();
        }
        let from = (start - 1) as usize;
        let to = match length {
            None => chars.len(),
            Some(l) if l < 0 => {
                self.diags.push(codes::ce007(range));
                return String::new();
            }
            Some(l) => (from + l as usize).min(chars.len()),
        };
        chars[from.min(chars.len())..to].iter().collect()
    }

    fn self_def_value(&mut self, kind: char, text: &str, range: Range) -> i32 {
        let parsed = match kind {
            'B' => i64::from_str_radix(text, 2).ok(),
            'X' => i64::from_str_radix(text, 16).ok(),
            'C' | 'G' => {
                let mut v: i64 = 0;
                for c in text.chars().take(4) {
                    v = (v << 8) | (c as i64 & 0xff);
                }
                Some(v)
            }
            _ => None,
        };
        match parsed {
            Some(v) if v <= i32::MAX as i64 => v as i32,
            _ => {
                self.diags.push(codes::ce004(text, range));
                0
            }
        }
    }

    fn eval_function(&mut self, name: Id, args: &[CaExpr], range: Range) -> SetValue {
        let arg_str = |e: &mut Self, i: usize| -> String {
            args.get(i)
                .map(|a| {
                    let v = e.eval_ca(a);
                    e.to_str(&v)
                })
                .unwrap_or_default()
        };
        match name.as_str() {
            "BYTE" => {
                let v = args.first().map(|a| {
                    let v = self.eval_ca(a);
                    self.to_num(&v, a.range())
                });
                match v {
                    Some(n) if (0..=255).contains(&n) => {
                        SetValue::C(((n as u8) as char).to_string())
                    }
                    _ => {
                        self.diags.push(codes::ce004("BYTE", range));
                        SetValue::C(String::new())
                    }
                }
            }
            "DOUBLE" => {
                let s = arg_str(self, 0);
                SetValue::C(s.replace('\'', "''").replace('&', "&&"))
            }
            "FIND" => {
                let haystack = arg_str(self, 0);
                let set = arg_str(self, 1);
                let pos = haystack
                    .chars()
                    .position(|c| set.contains(c))
                    .map(|p| p + 1)
                    .unwrap_or(0);
                SetValue::A(pos as i32)
            }
            "INDEX" => {
                let haystack = arg_str(self, 0);
                let needle = arg_str(self, 1);
                let pos = if needle.is_empty() {
                    0
                } else {
                    haystack
                        .find(&needle)
                        .map(|b| haystack[..b].chars().count() + 1)
                        .unwrap_or(0)
                };
                SetValue::A(pos as i32)
            }
            "UPPER" => SetValue::C(arg_str(self, 0).to_uppercase()),
            "LOWER" => SetValue::C(arg_str(self, 0).to_lowercase()),
            other => {
                self.diags.push(codes::s0002(range, other));
                SetValue::A(0)
            }
        }
    }

    // -- substitution ------------------------------------------------------

    /// Replace variable references in raw statement text: `&&` becomes
    /// `&`, `&NAME` / `&NAME(sub)` becomes the value, a period directly
    /// after a substitution is consumed as the concatenation separator.
    pub fn substitute(&mut self, text: &str, range: Range) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] != '&' {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            if chars.get(i + 1) == Some(&'&') {
                out.push('&');
                i += 2;
                continue;
            }
            // Parse &NAME[(subscript)]
            let name_start = i + 1;
            let mut j = name_start;
            while j < chars.len()
                && (chars[j].is_ascii_alphanumeric() || matches!(chars[j], '@' | '#' | '$' | '_'))
            {
                j += 1;
            }
            if j == name_start {
                out.push('&');
                i += 1;
                continue;
            }
            let name: String = chars[name_start..j].iter().collect();
            let mut subscript = None;
            if chars.get(j) == Some(&'(') {
                let mut depth = 1usize;
                let sub_start = j + 1;
                let mut k = sub_start;
                while k < chars.len() && depth > 0 {
                    match chars[k] {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    k += 1;
                }
                if depth == 0 {
                    let sub_text: String = chars[sub_start..k - 1].iter().collect();
                    subscript = Some(sub_text);
                    j = k;
                }
            }

            let var = VarRef {
                name: Id::from_upper(&name),
                subscript: subscript.and_then(|sub| {
                    let provider =
                        hlac_par::scanner::RangeProvider::simple(range.start);
                    let mut scanner = hlac_par::scanner::Scanner::new(&sub, &provider);
                    hlac_par::ca::parse_ca_expr(&mut scanner).ok().map(Box::new)
                }),
                range,
            };
            match self.lookup_var(&var) {
                Some(value) => {
                    out.push_str(&self.to_str(&value));
                    // Consume the concatenation separator.
                    if chars.get(j) == Some(&'.') {
                        j += 1;
                    }
                }
                None => {
                    self.diags.push(codes::e010(&name, range));
                }
            }
            i = j;
        }
        out
    }

    // -- machine expressions ----------------------------------------------

    pub fn eval_mach(&mut self, expr: &MachExpr) -> MachValue {
        match expr {
            MachExpr::Num { value, .. } => MachValue::Abs(*value),
            MachExpr::SelfDef { kind, text, range } => {
                MachValue::Abs(self.self_def_value(*kind, text, *range) as i64)
            }
            MachExpr::Sym { name, .. } => match self.ctx.ordinals.get(*name) {
                Some(sym) => match sym.value {
                    Some(SymbolValue::Abs(v)) => MachValue::Abs(v),
                    Some(SymbolValue::Reloc { section, offset }) => {
                        MachValue::Reloc { section, offset }
                    }
                    None => {
                        self.undefined_symbols.push(*name);
                        MachValue::Error
                    }
                },
                None => {
                    self.undefined_symbols.push(*name);
                    MachValue::Error
                }
            },
            MachExpr::LocCtr { .. } => match self.ctx.ordinals.loc_ctr() {
                Some((section, offset)) => MachValue::Reloc { section, offset },
                None => MachValue::Error,
            },
            MachExpr::AttrRef { name, .. } => match self.ctx.ordinals.get(*name) {
                Some(sym) => MachValue::Abs(sym.attributes.length as i64),
                None => {
                    self.undefined_attr_refs.push(*name);
                    MachValue::Error
                }
            },
            MachExpr::Unary {
                negative,
                operand,
                range,
            } => {
                let v = self.eval_mach(operand);
                if !negative {
                    return v;
                }
                match v {
                    MachValue::Abs(a) => MachValue::Abs(-a),
                    MachValue::Reloc { .. } => {
                        self.diags.push(codes::e080(*range));
                        MachValue::Error
                    }
                    MachValue::Error => MachValue::Error,
                }
            }
            MachExpr::Binary {
                op,
                left,
                right,
                range,
            } => {
                let l = self.eval_mach(left);
                let r = self.eval_mach(right);
                self.mach_binary(*op, l, r, *range)
            }
        }
    }

    fn mach_binary(&mut self, op: MachBinOp, l: MachValue, r: MachValue, range: Range) -> MachValue {
        use MachValue::*;
        if matches!(l, Error) || matches!(r, Error) {
            return Error;
        }
        match op {
            MachBinOp::Add => match (l, r) {
                (Abs(a), Abs(b)) => Abs(a + b),
                (Reloc { section, offset }, Abs(b)) | (Abs(b), Reloc { section, offset }) => {
                    Reloc {
                        section,
                        offset: offset + b,
                    }
                }
                _ => {
                    self.diags.push(codes::e080(range));
                    Error
                }
            },
            MachBinOp::Sub => match (l, r) {
                (Abs(a), Abs(b)) => Abs(a - b),
                (Reloc { section, offset }, Abs(b)) => Reloc {
                    section,
                    offset: offset - b,
                },
                (
                    Reloc {
                        section: s1,
                        offset: o1,
                    },
                    Reloc {
                        section: s2,
                        offset: o2,
                    },
                ) if s1 == s2 => Abs(o1 - o2),
                _ => {
                    self.diags.push(codes::e080(range));
                    Error
                }
            },
            MachBinOp::Mul | MachBinOp::Div => match (l, r) {
                (Abs(a), Abs(b)) => {
                    if op == MachBinOp::Div {
                        if b == 0 {
                            self.diags.push(codes::ce012(range));
                            Abs(0)
                        } else {
                            Abs(a / b)
                        }
                    } else {
                        Abs(a * b)
                    }
                }
                _ => {
                    self.diags.push(codes::e080(range));
                    Error
                }
            },
        }
    }
}

fn read_set_var(var: &SetVariable, index: Option<u32>) -> SetValue {
    match index {
        Some(i) => var.get_element(i),
        None => var.get_scalar(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordinary::{SymbolAttributes, SymbolValue};
    use crate::variables::SetType;
    use crate::CtxOptions;
    use hlac_par::scanner::{RangeProvider, Scanner};
    use hlac_util::span::{Location, Position};

    fn ctx() -> HlasmContext {
        HlasmContext::new(Id::intern("eval.hlasm"), CtxOptions::default())
    }

    fn eval_text(ctx: &HlasmContext, text: &str) -> (SetValue, Vec<Diagnostic>) {
        let provider = RangeProvider::simple(Position::new(0, 0));
        let mut scanner = Scanner::new(text, &provider);
        let expr = hlac_par::ca::parse_ca_expr(&mut scanner).unwrap();
        let mut e = Evaluator::new(ctx);
        let v = e.eval_ca(&expr);
        (v, e.diags)
    }

    #[test]
    fn test_arithmetic() {
        let c = ctx();
        assert_eq!(eval_text(&c, "2+3*4").0, SetValue::A(14));
        assert_eq!(eval_text(&c, "(2+3)*4").0, SetValue::A(20));
        assert_eq!(eval_text(&c, "-5+1").0, SetValue::A(-4));
    }

    #[test]
    fn test_division_by_zero_is_sentinel() {
        let c = ctx();
        let (v, diags) = eval_text(&c, "1/0");
        assert_eq!(v, SetValue::A(0));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "CE012");
    }

    #[test]
    fn test_overflow_is_sentinel() {
        let c = ctx();
        let (v, diags) = eval_text(&c, "2147483647+1");
        assert_eq!(v, SetValue::A(0));
        assert_eq!(diags[0].code, "CE002");
    }

    #[test]
    fn test_comparisons_and_boolean() {
        let c = ctx();
        assert_eq!(eval_text(&c, "1 EQ 1").0, SetValue::B(true));
        assert_eq!(eval_text(&c, "2 LT 1").0, SetValue::B(false));
        assert_eq!(eval_text(&c, "1 EQ 1 AND 2 EQ 2").0, SetValue::B(true));
        assert_eq!(eval_text(&c, "NOT 1 EQ 1").0, SetValue::B(false));
        assert_eq!(eval_text(&c, "'AB' EQ 'AB'").0, SetValue::B(true));
        assert_eq!(eval_text(&c, "'A' LT 'B'").0, SetValue::B(true));
    }

    #[test]
    fn test_short_circuit_suppresses_right_side_errors() {
        let c = ctx();
        // The right side divides by zero but must not be evaluated.
        let (v, diags) = eval_text(&c, "0 EQ 1 AND 1/0 EQ 1");
        assert_eq!(v, SetValue::B(false));
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_string_operations() {
        let c = ctx();
        assert_eq!(
            eval_text(&c, "'AB'.'CD'").0,
            SetValue::C("ABCD".to_owned())
        );
        assert_eq!(
            eval_text(&c, "'ABCDE'(2,3)").0,
            SetValue::C("BCD".to_owned())
        );
        assert_eq!(eval_text(&c, "UPPER('ab')").0, SetValue::C("AB".to_owned()));
        assert_eq!(eval_text(&c, "INDEX('ABCAB','AB')").0, SetValue::A(1));
        assert_eq!(eval_text(&c, "INDEX('XYZ','AB')").0, SetValue::A(0));
        assert_eq!(eval_text(&c, "FIND('ABC','CX')").0, SetValue::A(3));
        assert_eq!(
            eval_text(&c, "DOUBLE('A''B')").0,
            SetValue::C("A''B".to_owned())
        );
        assert_eq!(eval_text(&c, "BYTE(65)").0, SetValue::C("A".to_owned()));
    }

    #[test]
    fn test_substring_errors() {
        let c = ctx();
        let (v, diags) = eval_text(&c, "'ABC'(0,1)");
        assert_eq!(v, SetValue::C(String::new()));
        assert_eq!(diags[0].code, "CE007");
    }

    #[test]
    fn test_self_def_terms() {
        let c = ctx();
        assert_eq!(eval_text(&c, "X'1F'").0, SetValue::A(31));
        assert_eq!(eval_text(&c, "B'1010'").0, SetValue::A(10));
        assert_eq!(eval_text(&c, "C'A'").0, SetValue::A(65));
    }

    #[test]
    fn test_set_variable_read() {
        let mut c = ctx();
        c.set_variable(Id::intern("N"), None, SetValue::A(6));
        assert_eq!(eval_text(&c, "&N*7").0, SetValue::A(42));

        c.declare_local(Id::intern("ARR"), SetType::Arith);
        c.set_variable(Id::intern("ARR"), Some(3), SetValue::A(9));
        assert_eq!(eval_text(&c, "&ARR(3)").0, SetValue::A(9));
        // Unset element defaults.
        assert_eq!(eval_text(&c, "&ARR(2)").0, SetValue::A(0));
    }

    #[test]
    fn test_undefined_variable_diagnostic() {
        let c = ctx();
        let (v, diags) = eval_text(&c, "&NOPE");
        assert_eq!(v, SetValue::C(String::new()));
        assert_eq!(diags[0].code, "E010");
    }

    #[test]
    fn test_system_variables() {
        let c = ctx();
        assert_eq!(eval_text(&c, "&SYSNEST").0, SetValue::A(0));
        let (v, _) = eval_text(&c, "&SYSPARM");
        assert_eq!(v, SetValue::C(String::new()));
    }

    #[test]
    fn test_attr_type_of_undefined_symbol_triggers_lookahead() {
        let c = ctx();
        let provider = RangeProvider::simple(Position::new(0, 0));
        let mut scanner = Scanner::new("T'FWD EQ 'U'", &provider);
        let expr = hlac_par::ca::parse_ca_expr(&mut scanner).unwrap();
        let mut e = Evaluator::new(&c);
        let v = e.eval_ca(&expr);
        // Unknown symbol: T' answers 'U' and records the reference.
        assert_eq!(v, SetValue::B(true));
        assert_eq!(e.undefined_attr_refs, vec![Id::intern("FWD")]);
    }

    #[test]
    fn test_attr_of_known_symbol() {
        let mut c = ctx();
        c.ordinals.resolve_forward(
            Id::intern("FWD"),
            SymbolAttributes::with_type_and_length('F', 4),
        );
        let (v, _) = eval_text(&c, "T'FWD");
        assert_eq!(v, SetValue::C("F".to_owned()));
        let (v, _) = eval_text(&c, "L'FWD");
        assert_eq!(v, SetValue::A(4));
    }

    #[test]
    fn test_defined_attr_does_not_trigger_lookahead() {
        let c = ctx();
        let provider = RangeProvider::simple(Position::new(0, 0));
        let mut scanner = Scanner::new("D'NOSYM", &provider);
        let expr = hlac_par::ca::parse_ca_expr(&mut scanner).unwrap();
        let mut e = Evaluator::new(&c);
        let v = e.eval_ca(&expr);
        assert_eq!(v, SetValue::A(0));
        assert!(e.undefined_attr_refs.is_empty());
    }

    #[test]
    fn test_substitution() {
        let mut c = ctx();
        c.set_variable(Id::intern("OP"), None, SetValue::C("X".to_owned()));
        c.set_variable(Id::intern("I"), None, SetValue::A(2));
        let mut e = Evaluator::new(&c);
        let r = Range::default();
        assert_eq!(e.substitute("&OP", r), "X");
        assert_eq!(e.substitute("&OP.Y", r), "XY");
        assert_eq!(e.substitute("L&I", r), "L2");
        assert_eq!(e.substitute("A&&B", r), "A&B");
        assert_eq!(e.substitute("&OP,&I", r), "X,2");
        assert!(e.diags.is_empty(), "{:?}", e.diags);
    }

    #[test]
    fn test_mach_reloc_algebra() {
        let mut c = ctx();
        let sect = c
            .ordinals
            .set_section(Id::intern("CODE"), crate::ordinary::SectionKind::Executable);
        c.ordinals.define(
            Id::intern("HERE"),
            SymbolValue::Reloc {
                section: sect,
                offset: 8,
            },
            SymbolAttributes::default(),
            Location::default(),
        );
        c.ordinals.define(
            Id::intern("THERE"),
            SymbolValue::Reloc {
                section: sect,
                offset: 20,
            },
            SymbolAttributes::default(),
            Location::default(),
        );

        let provider = RangeProvider::simple(Position::new(0, 0));
        let mut scanner = Scanner::new("THERE-HERE", &provider);
        let expr = hlac_par::mach::parse_mach_expr(&mut scanner).unwrap();
        let mut e = Evaluator::new(&c);
        assert_eq!(e.eval_mach(&expr), MachValue::Abs(12));

        let mut scanner = Scanner::new("HERE+4", &provider);
        let expr = hlac_par::mach::parse_mach_expr(&mut scanner).unwrap();
        assert_eq!(
            e.eval_mach(&expr),
            MachValue::Reloc {
                section: sect,
                offset: 12
            }
        );

        // Relocatable plus relocatable is illegal.
        let mut scanner = Scanner::new("HERE+THERE", &provider);
        let expr = hlac_par::mach::parse_mach_expr(&mut scanner).unwrap();
        let mut e2 = Evaluator::new(&c);
        assert_eq!(e2.eval_mach(&expr), MachValue::Error);
        assert_eq!(e2.diags[0].code, "E080");
    }

    #[test]
    fn test_mach_undefined_symbol_is_silent() {
        let c = ctx();
        let provider = RangeProvider::simple(Position::new(0, 0));
        let mut scanner = Scanner::new("NOTYET+1", &provider);
        let expr = hlac_par::mach::parse_mach_expr(&mut scanner).unwrap();
        let mut e = Evaluator::new(&c);
        assert_eq!(e.eval_mach(&expr), MachValue::Error);
        assert!(e.diags.is_empty());
        assert_eq!(e.undefined_symbols, vec![Id::intern("NOTYET")]);
    }
}
