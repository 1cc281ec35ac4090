//! Macro definitions and invocation frames.

use rustc_hash::FxHashMap;

use hlac_util::span::Location;
use hlac_util::{Id, Idx};

use crate::cache::CachedBlock;
use crate::variables::CodeScope;

/// One prototype parameter: positional or keyword-with-default.
#[derive(Clone, Debug, PartialEq)]
pub struct MacroParam {
    pub name: Id,
    /// `None` for positional parameters, the default for keywords.
    pub default: Option<String>,
}

/// A macro definition.
#[derive(Debug)]
pub struct MacroDef {
    pub name: Id,
    /// Name-field parameter of the prototype (`&LBL MAC ...`).
    pub name_param: Option<Id>,
    /// Prototype parameters, in declaration order.
    pub params: Vec<MacroParam>,
    /// Body statements with their reparse caches.
    pub body: CachedBlock,
    /// Sequence symbols interned at definition time, by body offset.
    pub sequence_symbols: FxHashMap<Id, usize>,
    /// Where the definition starts (the MACRO statement).
    pub location: Location,
    /// Copy members whose statements contributed to the body.
    pub used_copy_members: Vec<Id>,
}

impl MacroDef {
    /// Find a keyword parameter.
    pub fn keyword_param(&self, name: Id) -> Option<&MacroParam> {
        self.params
            .iter()
            .find(|p| p.name == name && p.default.is_some())
    }

    /// Positional parameters in order.
    pub fn positional_params(&self) -> impl Iterator<Item = &MacroParam> {
        self.params.iter().filter(|p| p.default.is_none())
    }
}

/// Initial value of the AGO/AIF backward-branch counter.
pub const DEFAULT_BRANCH_COUNTER: i64 = 4096;

/// One live macro invocation.
#[derive(Debug)]
pub struct MacroFrame {
    pub def: Idx<MacroDef>,
    /// Parameter bindings, name to call-site value.
    pub bindings: FxHashMap<Id, String>,
    /// Value bound to the prototype's name-field parameter.
    pub name_argument: Option<String>,
    /// Index of the next statement to retrieve from the body.
    pub current_statement: usize,
    /// Remaining backward branches; ACTR may reset it.
    pub branch_counter: i64,
    /// &SYSNDX value of this invocation.
    pub sysndx: u32,
}

impl MacroFrame {
    pub fn new(def: Idx<MacroDef>, sysndx: u32) -> Self {
        Self {
            def,
            bindings: FxHashMap::default(),
            name_argument: None,
            current_statement: 0,
            branch_counter: DEFAULT_BRANCH_COUNTER,
            sysndx,
        }
    }
}

/// A macro invocation's scope: its locals plus the frame itself.
#[derive(Debug)]
pub struct MacroScope {
    pub scope: CodeScope,
    pub frame: MacroFrame,
}

/// Select element `index` (1-based) of a parenthesized sublist argument.
/// A non-sublist value is its own element 1; out-of-range is empty.
pub fn sublist_element(value: &str, index: usize) -> &str {
    let inner = match value.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => inner,
        None => {
            return if index == 1 { value } else { "" };
        }
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0usize;
    let mut element = 1usize;
    let bytes: Vec<char> = inner.chars().collect();
    for (i, &c) in bytes.iter().enumerate() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                if element == index {
                    return &inner[char_offset(inner, start)..char_offset(inner, i)];
                }
                element += 1;
                start = i + 1;
            }
            _ => {}
        }
    }
    if element == index {
        &inner[char_offset(inner, start)..]
    } else {
        ""
    }
}

/// Number of elements of a sublist argument.
pub fn sublist_count(value: &str) -> usize {
    let Some(inner) = value.strip_prefix('(').and_then(|v| v.strip_suffix(')')) else {
        return if value.is_empty() { 0 } else { 1 };
    };
    if inner.is_empty() {
        return 0;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut count = 1usize;
    for c in inner.chars() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => count += 1,
            _ => {}
        }
    }
    count
}

fn char_offset(s: &str, chars: usize) -> usize {
    s.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sublist_element() {
        assert_eq!(sublist_element("(A,B,C)", 1), "A");
        assert_eq!(sublist_element("(A,B,C)", 3), "C");
        assert_eq!(sublist_element("(A,B,C)", 4), "");
        assert_eq!(sublist_element("PLAIN", 1), "PLAIN");
        assert_eq!(sublist_element("PLAIN", 2), "");
        assert_eq!(sublist_element("(A,(B,C),D)", 2), "(B,C)");
        assert_eq!(sublist_element("('A,B',C)", 1), "'A,B'");
    }

    #[test]
    fn test_sublist_count() {
        assert_eq!(sublist_count("(A,B,C)"), 3);
        assert_eq!(sublist_count("PLAIN"), 1);
        assert_eq!(sublist_count(""), 0);
        assert_eq!(sublist_count("()"), 0);
        assert_eq!(sublist_count("(A,(B,C))"), 2);
    }

    #[test]
    fn test_frame_defaults() {
        let mut arena: hlac_util::Arena<MacroDef> = hlac_util::Arena::new();
        let idx = arena.alloc(MacroDef {
            name: Id::intern("M"),
            name_param: None,
            params: vec![
                MacroParam {
                    name: Id::intern("P"),
                    default: None,
                },
                MacroParam {
                    name: Id::intern("K"),
                    default: Some("D".to_owned()),
                },
            ],
            body: Vec::new(),
            sequence_symbols: FxHashMap::default(),
            location: Location::default(),
            used_copy_members: Vec::new(),
        });
        let frame = MacroFrame::new(idx, 1);
        assert_eq!(frame.branch_counter, DEFAULT_BRANCH_COUNTER);
        assert_eq!(frame.current_statement, 0);

        let def = &arena[idx];
        assert_eq!(def.positional_params().count(), 1);
        assert!(def.keyword_param(Id::intern("K")).is_some());
        assert!(def.keyword_param(Id::intern("P")).is_none());
    }
}
