//! hlac-proc - Statement Processing Pipeline
//!
//! The cooperative pipeline that multiplexes statements from four
//! concurrent sources (open code, macro expansion, copy members, an
//! attached preprocessor) into six processor kinds, resolving the macro
//! language along the way: SET variables, sequence-symbol branching with
//! lookahead, attribute lookahead for forward references, COPY activation
//! through an async library provider, and AINSERT/AREAD stream handling.
//!
//! Entry points: [`analyze_opencode`] for a document,
//! [`analyze_library_member`] for a COPY/macro member fetched by a
//! library provider (providers call it back from `parse_library`).

pub mod lib_provider;
pub mod manager;
pub mod processor;
pub mod provider;
pub mod reparse;

use hlac_ctx::HlasmContext;
use hlac_util::span::Location;
use hlac_util::{Canceled, CancellationToken, Id};

pub use lib_provider::{EmptyLibraryProvider, LibraryProvider, MemberKind};
pub use manager::ProcessingManager;
pub use processor::{DefaultChecker, InstructionChecker};
pub use provider::Preprocessor;

/// Analyze an open-code document into `ctx`.
pub async fn analyze_opencode(
    document: &str,
    ctx: &mut HlasmContext,
    lib: &dyn LibraryProvider,
    checker: Option<Box<dyn InstructionChecker>>,
    preprocessor: Option<Box<dyn Preprocessor>>,
    cancel: &CancellationToken,
) -> Result<(), Canceled> {
    let manager = ProcessingManager::new(document, ctx, lib, checker, preprocessor);
    manager.run(cancel).await
}

/// Analyze a library member as a nested unit (COPY or macro definition),
/// registering it into `ctx`. Returns true when the member registered.
///
/// Library providers call this from `parse_library`; the open-code source
/// state of the outer analysis is saved and restored around the nested
/// run.
pub async fn analyze_library_member(
    document: &str,
    location: Location,
    name: Id,
    kind: MemberKind,
    ctx: &mut HlasmContext,
    lib: &dyn LibraryProvider,
    cancel: &CancellationToken,
) -> bool {
    let saved_source = ctx.source.clone();
    ctx.source = Default::default();

    let manager = ProcessingManager::for_member(document, ctx, lib, name, location, kind);
    let outcome = manager.run(cancel).await;

    ctx.source = saved_source;
    if outcome.is_err() {
        return false;
    }
    match kind {
        MemberKind::Copy => ctx.get_copy_member(name).is_some(),
        MemberKind::Macro => ctx.get_macro(name).is_some(),
    }
}
