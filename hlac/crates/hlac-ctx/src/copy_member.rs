//! Copy members.

use hlac_util::span::Location;
use hlac_util::Id;

use crate::cache::CachedBlock;

/// A registered copy member. The body is cached once; repeated COPY
/// references reuse the same statement list.
#[derive(Debug)]
pub struct CopyMember {
    pub name: Id,
    pub body: CachedBlock,
    pub location: Location,
    /// True when registration failed (unbalanced MACRO/MEND inside the
    /// member); the body is empty in that case.
    pub invalid: bool,
}

impl CopyMember {
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
