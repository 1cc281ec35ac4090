//! Ordinary symbols and sections.
//!
//! An ordinary symbol is unique within the assembly; once *defined* its
//! value and attributes never change. Attribute lookahead may create an
//! entry whose attributes are known while the symbol itself is still
//! undefined; the entry is then upgraded in place when the defining
//! statement is reached, and the upgrade wins over the lookahead guess.

use rustc_hash::FxHashMap;

use hlac_util::span::Location;
use hlac_util::{Arena, Id, Idx};

/// Symbol attributes: type, length, scale, integer, program type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolAttributes {
    /// Type attribute character; `U` when undefined.
    pub type_attr: char,
    /// Length attribute in bytes.
    pub length: u32,
    /// Scale attribute.
    pub scale: i32,
    /// Integer attribute.
    pub integer: i32,
    /// Program type, when given by a data definition.
    pub prog_type: Option<i64>,
}

impl Default for SymbolAttributes {
    fn default() -> Self {
        Self {
            type_attr: 'U',
            length: 1,
            scale: 0,
            integer: 0,
            prog_type: None,
        }
    }
}

impl SymbolAttributes {
    pub fn with_type(type_attr: char) -> Self {
        Self {
            type_attr,
            ..Default::default()
        }
    }

    pub fn with_type_and_length(type_attr: char, length: u32) -> Self {
        Self {
            type_attr,
            length,
            ..Default::default()
        }
    }
}

/// Value of a defined symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolValue {
    Abs(i64),
    Reloc { section: Idx<Section>, offset: i64 },
}

/// How a symbol entry came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolOrigin {
    /// Defined by a label-carrying statement during ordinary processing.
    Defined,
    /// Attributes resolved ahead of time by attribute lookahead; the
    /// symbol itself is not defined yet.
    ForwardResolved,
}

/// One ordinary symbol.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: Id,
    pub value: Option<SymbolValue>,
    pub attributes: SymbolAttributes,
    pub origin: SymbolOrigin,
    pub location: Option<Location>,
}

impl Symbol {
    pub fn is_defined(&self) -> bool {
        self.origin == SymbolOrigin::Defined
    }
}

/// Section kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Executable,
    Dummy,
}

/// A control section.
#[derive(Clone, Debug)]
pub struct Section {
    pub name: Id,
    pub kind: SectionKind,
    /// Current location counter value.
    pub loc_ctr: i64,
}

/// The ordinary symbol table plus section bookkeeping.
#[derive(Debug, Default)]
pub struct OrdinaryTable {
    symbols: FxHashMap<Id, Symbol>,
    pub sections: Arena<Section>,
    section_index: FxHashMap<Id, Idx<Section>>,
    current_section: Option<Idx<Section>>,
}

impl OrdinaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: Id) -> Option<&Symbol> {
        self.symbols.get(&name)
    }

    /// Define a symbol. Returns false if it was already defined (the
    /// existing definition is kept).
    pub fn define(
        &mut self,
        name: Id,
        value: SymbolValue,
        attributes: SymbolAttributes,
        location: Location,
    ) -> bool {
        match self.symbols.get_mut(&name) {
            Some(existing) if existing.is_defined() => false,
            Some(existing) => {
                // Upgrade a forward-resolved entry in place.
                existing.value = Some(value);
                existing.attributes = attributes;
                existing.origin = SymbolOrigin::Defined;
                existing.location = Some(location);
                true
            }
            None => {
                self.symbols.insert(
                    name,
                    Symbol {
                        name,
                        value: Some(value),
                        attributes,
                        origin: SymbolOrigin::Defined,
                        location: Some(location),
                    },
                );
                true
            }
        }
    }

    /// Record attributes discovered by attribute lookahead. Never
    /// overwrites a defined symbol.
    pub fn resolve_forward(&mut self, name: Id, attributes: SymbolAttributes) {
        self.symbols.entry(name).or_insert(Symbol {
            name,
            value: None,
            attributes,
            origin: SymbolOrigin::ForwardResolved,
            location: None,
        });
    }

    /// Open (or reopen) a section and make it current.
    pub fn set_section(&mut self, name: Id, kind: SectionKind) -> Idx<Section> {
        if let Some(&idx) = self.section_index.get(&name) {
            self.current_section = Some(idx);
            return idx;
        }
        let idx = self.sections.alloc(Section {
            name,
            kind,
            loc_ctr: 0,
        });
        self.section_index.insert(name, idx);
        self.current_section = Some(idx);
        idx
    }

    pub fn current_section(&self) -> Option<Idx<Section>> {
        self.current_section
    }

    /// Current location counter value, when a section is open.
    pub fn loc_ctr(&self) -> Option<(Idx<Section>, i64)> {
        let idx = self.current_section?;
        Some((idx, self.sections[idx].loc_ctr))
    }

    /// Advance the current location counter by `amount` bytes.
    pub fn advance_loc_ctr(&mut self, amount: i64) {
        if let Some(idx) = self.current_section {
            self.sections[idx].loc_ctr += amount;
        }
    }

    /// Set the current location counter (ORG).
    pub fn set_loc_ctr(&mut self, value: i64) {
        if let Some(idx) = self.current_section {
            self.sections[idx].loc_ctr = value;
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }
}
