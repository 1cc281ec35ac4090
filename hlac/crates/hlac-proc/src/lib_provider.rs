//! Library provider interface.
//!
//! COPY members and library macros live outside the analyzed file; the
//! pipeline reaches them only through this interface. Fetches are async
//! (two of the three suspension points of the whole pipeline), and the
//! provider owns any recursion into its own storage when asked to
//! parse a member as a nested unit.

use async_trait::async_trait;

use hlac_ctx::HlasmContext;
use hlac_util::span::Location;
use hlac_util::CancellationToken;

/// What a member is parsed as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Macro,
    Copy,
}

/// Access to external library members, by case-exact name.
#[async_trait(?Send)]
pub trait LibraryProvider {
    /// Fast existence check.
    fn has_library(&self, name: &str) -> bool;

    /// Fetch a member's source text and its location.
    async fn get_library(&self, name: &str) -> Option<(String, Location)>;

    /// Fetch a member and analyze it as a nested unit into `ctx`.
    /// Returns true when the member was found and registered.
    async fn parse_library(
        &self,
        name: &str,
        ctx: &mut HlasmContext,
        kind: MemberKind,
        cancel: &CancellationToken,
    ) -> bool;
}

/// A provider with no members; every lookup fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyLibraryProvider;

#[async_trait(?Send)]
impl LibraryProvider for EmptyLibraryProvider {
    fn has_library(&self, _name: &str) -> bool {
        false
    }

    async fn get_library(&self, _name: &str) -> Option<(String, Location)> {
        None
    }

    async fn parse_library(
        &self,
        _name: &str,
        _ctx: &mut HlasmContext,
        _kind: MemberKind,
        _cancel: &CancellationToken,
    ) -> bool {
        false
    }
}
