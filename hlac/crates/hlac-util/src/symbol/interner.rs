//! Global string table behind [`Id`].
//!
//! The table maps strings to dense `u32` indices. Forward lookups go
//! through a `DashMap` keyed with `ahash`; reverse lookups index an
//! append-only vector guarded by an `RwLock` (reads vastly outnumber
//! writes once a source file has been analyzed).
//!
//! Interned strings are leaked intentionally: the table lives for the
//! whole process, entries are never removed, and the `'static` borrow
//! removes lifetime plumbing from every phase that touches a name.

use std::sync::{LazyLock, RwLock};

use dashmap::DashMap;

use super::Id;

static TABLE: LazyLock<StringTable> = LazyLock::new(StringTable::new);

pub(crate) fn table() -> &'static StringTable {
    &TABLE
}

/// Thread-safe append-only string table.
pub struct StringTable {
    map: DashMap<&'static str, u32, ahash::RandomState>,
    strings: RwLock<Vec<&'static str>>,
}

impl StringTable {
    fn new() -> Self {
        let table = Self {
            map: DashMap::with_hasher(ahash::RandomState::new()),
            strings: RwLock::new(Vec::with_capacity(256)),
        };
        // Index 0 is reserved for the empty string so that Id::EMPTY is a
        // compile-time constant.
        let empty = table.intern("");
        debug_assert_eq!(empty.index, 0);
        table
    }

    /// Intern a string, returning its identifier.
    pub fn intern(&self, string: &str) -> Id {
        if let Some(entry) = self.map.get(string) {
            return Id { index: *entry };
        }

        let mut strings = self.strings.write().expect("interner poisoned");
        // Re-check under the write lock; another thread may have won the race.
        if let Some(entry) = self.map.get(string) {
            return Id { index: *entry };
        }

        let leaked: &'static str = Box::leak(string.to_owned().into_boxed_str());
        let index = u32::try_from(strings.len()).expect("interner capacity exceeded");
        strings.push(leaked);
        self.map.insert(leaked, index);
        Id { index }
    }

    /// Resolve an identifier back to its text.
    pub fn resolve(&self, id: Id) -> &'static str {
        let strings = self.strings.read().expect("interner poisoned");
        strings[id.index as usize]
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.strings.read().expect("interner poisoned").len()
    }

    /// Returns true if only the reserved empty string is present.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}
