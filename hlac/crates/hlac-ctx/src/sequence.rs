//! Sequence symbols.

use hlac_util::span::Location;
use hlac_util::Id;

use crate::source_ctx::{SourcePosition, SourceSnapshot};

/// Where a sequence symbol points.
#[derive(Clone, Debug, PartialEq)]
pub enum SequenceSymbolKind {
    /// Offset into the owning macro's body.
    Macro { statement_offset: usize },
    /// Absolute open-code position plus the snapshot needed to restart
    /// processing there.
    Opencode {
        statement_position: SourcePosition,
        snapshot: SourceSnapshot,
    },
}

/// A sequence symbol: a `.NAME` branch target.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceSymbol {
    pub name: Id,
    pub location: Location,
    pub kind: SequenceSymbolKind,
}

impl SequenceSymbol {
    pub fn macro_scoped(name: Id, location: Location, statement_offset: usize) -> Self {
        Self {
            name,
            location,
            kind: SequenceSymbolKind::Macro { statement_offset },
        }
    }

    pub fn opencode(
        name: Id,
        location: Location,
        statement_position: SourcePosition,
        snapshot: SourceSnapshot,
    ) -> Self {
        Self {
            name,
            location,
            kind: SequenceSymbolKind::Opencode {
                statement_position,
                snapshot,
            },
        }
    }

    /// Positional equality for redefinition checks: two open-code
    /// definitions are the same symbol only when their restart state
    /// matches component-wise.
    pub fn same_position(&self, other: &SequenceSymbol) -> bool {
        match (&self.kind, &other.kind) {
            (
                SequenceSymbolKind::Opencode {
                    statement_position: p1,
                    snapshot: s1,
                },
                SequenceSymbolKind::Opencode {
                    statement_position: p2,
                    snapshot: s2,
                },
            ) => p1 == p2 && s1 == s2,
            (
                SequenceSymbolKind::Macro {
                    statement_offset: o1,
                },
                SequenceSymbolKind::Macro {
                    statement_offset: o2,
                },
            ) => o1 == o2,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlac_util::span::Position;

    #[test]
    fn test_same_position() {
        let loc = Location::new(Id::intern("f"), Position::new(1, 0));
        let a = SequenceSymbol::opencode(
            Id::intern("T"),
            loc,
            SourcePosition::new(3, 120),
            SourceSnapshot::default(),
        );
        let b = SequenceSymbol::opencode(
            Id::intern("T"),
            loc,
            SourcePosition::new(3, 120),
            SourceSnapshot::default(),
        );
        assert!(a.same_position(&b));

        let c = SequenceSymbol::opencode(
            Id::intern("T"),
            loc,
            SourcePosition::new(4, 160),
            SourceSnapshot::default(),
        );
        assert!(!a.same_position(&c));

        let m = SequenceSymbol::macro_scoped(Id::intern("T"), loc, 2);
        assert!(!a.same_position(&m));
        assert!(m.same_position(&SequenceSymbol::macro_scoped(Id::intern("T"), loc, 2)));
    }
}
