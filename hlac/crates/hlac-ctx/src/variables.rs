//! SET variables and code scopes.
//!
//! SET variables are typed arithmetic/boolean/character, declared scalar
//! or subscripted, and scoped either to a macro invocation (LCLx, or the
//! first SETx in scope) or globally (GBLx). Subscripted variables hold a
//! sparse index map; reading an element that was never written yields the
//! type's default value.

use rustc_hash::{FxHashMap, FxHashSet};

use hlac_util::Id;

/// SET variable type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetType {
    Arith,
    Bool,
    Char,
}

/// A SET variable value.
#[derive(Clone, Debug, PartialEq)]
pub enum SetValue {
    A(i32),
    B(bool),
    C(String),
}

impl SetValue {
    pub fn default_of(set_type: SetType) -> SetValue {
        match set_type {
            SetType::Arith => SetValue::A(0),
            SetType::Bool => SetValue::B(false),
            SetType::Char => SetValue::C(String::new()),
        }
    }

    pub fn set_type(&self) -> SetType {
        match self {
            SetValue::A(_) => SetType::Arith,
            SetValue::B(_) => SetType::Bool,
            SetValue::C(_) => SetType::Char,
        }
    }
}

/// One SET variable: scalar or sparsely subscripted.
#[derive(Clone, Debug)]
pub struct SetVariable {
    pub set_type: SetType,
    pub scalar: Option<SetValue>,
    /// Sparse map from positive subscript to value.
    pub elements: FxHashMap<u32, SetValue>,
}

impl SetVariable {
    pub fn new(set_type: SetType) -> Self {
        Self {
            set_type,
            scalar: None,
            elements: FxHashMap::default(),
        }
    }

    /// Read the scalar value; default-valued on first read.
    pub fn get_scalar(&self) -> SetValue {
        self.scalar
            .clone()
            .unwrap_or_else(|| SetValue::default_of(self.set_type))
    }

    /// Read a subscripted element; default-valued on first read.
    pub fn get_element(&self, index: u32) -> SetValue {
        self.elements
            .get(&index)
            .cloned()
            .unwrap_or_else(|| SetValue::default_of(self.set_type))
    }

    pub fn set_scalar(&mut self, value: SetValue) {
        self.scalar = Some(value);
    }

    pub fn set_element(&mut self, index: u32, value: SetValue) {
        self.elements.insert(index, value);
    }

    /// Highest subscript ever written; the N' attribute of the variable.
    pub fn max_index(&self) -> u32 {
        self.elements.keys().copied().max().unwrap_or(0)
    }
}

/// One lexical code scope: the open code, or one macro invocation.
#[derive(Debug, Default)]
pub struct CodeScope {
    /// Local SET variables of this scope.
    pub variables: FxHashMap<Id, SetVariable>,
    /// Names declared GBLx in this scope; reads and writes of these go to
    /// the global table.
    pub global_aliases: FxHashSet<Id>,
}

impl CodeScope {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_on_first_read() {
        let v = SetVariable::new(SetType::Arith);
        assert_eq!(v.get_scalar(), SetValue::A(0));
        assert_eq!(v.get_element(5), SetValue::A(0));

        let c = SetVariable::new(SetType::Char);
        assert_eq!(c.get_scalar(), SetValue::C(String::new()));
    }

    #[test]
    fn test_sparse_elements() {
        let mut v = SetVariable::new(SetType::Arith);
        v.set_element(100, SetValue::A(7));
        assert_eq!(v.get_element(100), SetValue::A(7));
        assert_eq!(v.get_element(99), SetValue::A(0));
        assert_eq!(v.max_index(), 100);
    }

    #[test]
    fn test_scalar_write_read() {
        let mut v = SetVariable::new(SetType::Bool);
        v.set_scalar(SetValue::B(true));
        assert_eq!(v.get_scalar(), SetValue::B(true));
    }
}
