//! Statement providers.
//!
//! Four sources feed statements into the pipeline, tried in priority
//! order macro > copy > preprocessor > open code. The macro and copy
//! providers are stateless walkers over the context (the invocation frame
//! and the copy-frame stack hold the cursor); the open-code provider owns
//! the lexer; the preprocessor provider drains a queue of synthesized
//! statements.
//!
//! Every deferred statement a provider hands out goes through the reparse
//! step keyed by the current processor's processing status; reparses of
//! substitution-free statements are memoized in the statement cache.

pub mod opencode;
pub mod preprocessor;

use std::sync::Arc;

use hlac_ctx::copy_member::CopyMember;
use hlac_ctx::macro_def::MacroDef;
use hlac_ctx::HlasmContext;
use hlac_par::form::ProcessingForm;
use hlac_par::statement::{DeferredStatement, Statement};
use hlac_util::diagnostic::StackMember;
use hlac_util::Idx;

use crate::processor::Processor;
use crate::reparse::{resolve_deferred, resolve_instruction_name};

pub use opencode::OpencodeProvider;
pub use preprocessor::{Preprocessor, PreprocessorProvider};

/// Provider identity, in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Macro,
    Copy,
    Preprocessor,
    Opencode,
}

/// Where a statement's reparse cache lives.
#[derive(Clone, Copy, Debug)]
pub enum CacheSlot {
    None,
    Macro(Idx<MacroDef>, usize),
    Copy(Idx<CopyMember>, usize),
}

/// Resolve a deferred statement through the cache: ask the processor for
/// the processing status, consult the cache slot, reparse on miss.
pub(crate) fn resolve_via_cache(
    ctx: &mut HlasmContext,
    processor: &Processor,
    base: Arc<DeferredStatement>,
    slot: CacheSlot,
) -> Statement {
    let name = resolve_instruction_name(ctx, &base.instruction);
    let has_operands = !base.deferred_text.trim().is_empty();
    let status = processor.get_processing_status(ctx, name, has_operands);

    if matches!(
        status.format.form,
        ProcessingForm::Deferred | ProcessingForm::Unknown
    ) {
        return Statement::Deferred(base);
    }

    let key = status.format.reparse_key();
    if base.needs_substitution() {
        // Substituted text differs per expansion; never cached.
        return Statement::Resolved(Arc::new(resolve_deferred(ctx, &base, &status)));
    }

    let hit = match slot {
        CacheSlot::None => None,
        CacheSlot::Macro(def, index) => ctx.macros[def].body[index].get(key).cloned(),
        CacheSlot::Copy(member, index) => ctx.copy_members[member].body[index].get(key).cloned(),
    };
    if let Some(resolved) = hit {
        return Statement::Resolved(resolved);
    }

    let resolved = Arc::new(resolve_deferred(ctx, &base, &status));
    match slot {
        CacheSlot::None => {}
        CacheSlot::Macro(def, index) => {
            ctx.macros[def].body[index].insert(key, Arc::clone(&resolved));
        }
        CacheSlot::Copy(member, index) => {
            ctx.copy_members[member].body[index].insert(key, Arc::clone(&resolved));
        }
    }
    Statement::Resolved(resolved)
}

/// The macro provider: walks the innermost invocation's statement list.
pub mod macro_provider {
    use super::*;

    pub fn finished(ctx: &HlasmContext) -> bool {
        match ctx.current_frame() {
            None => true,
            Some(frame) => frame.current_statement >= ctx.macros[frame.def].body.len(),
        }
    }

    pub fn get_next(ctx: &mut HlasmContext, processor: &Processor) -> Option<Statement> {
        let frame = ctx.current_frame()?;
        let def = frame.def;
        let index = frame.current_statement;
        if index >= ctx.macros[def].body.len() {
            return None;
        }
        ctx.current_frame_mut()
            .expect("frame checked above")
            .current_statement += 1;

        let base = Arc::clone(ctx.macros[def].body[index].base());
        Some(resolve_via_cache(
            ctx,
            processor,
            base,
            CacheSlot::Macro(def, index),
        ))
    }
}

/// The copy provider: walks the top of the copy-frame stack, popping
/// frames as they exhaust.
pub mod copy_provider {
    use super::*;

    pub fn finished(ctx: &HlasmContext) -> bool {
        ctx.source.copy_stack.is_empty()
    }

    pub fn get_next(ctx: &mut HlasmContext, processor: &Processor) -> Option<Statement> {
        loop {
            let frame = ctx.source.copy_stack.last()?;
            let name = frame.copy_member;
            let offset = frame.statement_offset;
            let member = ctx.get_copy_member(name)?;

            if offset >= ctx.copy_members[member].body.len() {
                ctx.source.copy_stack.pop();
                pop_copy_processing_frame(ctx);
                continue;
            }
            ctx.source
                .copy_stack
                .last_mut()
                .expect("frame checked above")
                .statement_offset += 1;

            let base = Arc::clone(ctx.copy_members[member].body[offset].base());
            return Some(resolve_via_cache(
                ctx,
                processor,
                base,
                CacheSlot::Copy(member, offset),
            ));
        }
    }
}

/// Drop the innermost copy attribution frame, if the top is one.
pub(crate) fn pop_copy_processing_frame(ctx: &mut HlasmContext) {
    if matches!(
        ctx.processing_stack().last(),
        Some(frame) if matches!(frame.member, Some(StackMember::Copy(_)))
    ) {
        ctx.pop_processing_frame();
    }
}

/// Re-align diagnostic attribution frames with the copy stack after a
/// snapshot restore.
pub(crate) fn sync_copy_processing_frames(ctx: &mut HlasmContext) {
    loop {
        let copy_frames = ctx
            .processing_stack()
            .iter()
            .filter(|f| matches!(f.member, Some(StackMember::Copy(_))))
            .count();
        if copy_frames <= ctx.source.copy_stack.len() {
            break;
        }
        if !matches!(
            ctx.processing_stack().last(),
            Some(frame) if matches!(frame.member, Some(StackMember::Copy(_)))
        ) {
            break;
        }
        ctx.pop_processing_frame();
    }
}
