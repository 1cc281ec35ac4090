//! The processing manager.
//!
//! Owns the processor stack and the providers, runs the cooperative main
//! loop, and carries the pieces of state that span processors: the
//! lookahead-stop snapshot, the pending sequence-redefinition queue, and
//! the memo of external library requests.
//!
//! The loop is single-threaded and cooperative. Suspension points are
//! exactly the library-provider fetches, the preprocessor callback, and
//! the explicit yield between steps; between suspensions the manager owns
//! the whole analysis state exclusively. The cancellation flag is sampled
//! at every suspension and loop iteration.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use hlac_ctx::sequence::{SequenceSymbol, SequenceSymbolKind};
use hlac_ctx::source_ctx::{CopyFrame, SourcePosition, SourceSnapshot};
use hlac_ctx::variables::SetValue;
use hlac_ctx::HlasmContext;
use hlac_par::form::ProcessingKind;
use hlac_par::statement::Statement;
use hlac_util::diagnostic::{codes, StackMember};
use hlac_util::span::{Location, Range};
use hlac_util::{Canceled, CancellationToken, Diagnostic, Id};

use crate::lib_provider::{LibraryProvider, MemberKind};
use crate::processor::{
    Action, CopydefProcessor, DefaultChecker, EmptyProcessor, FinishOutcome, InstructionChecker,
    LookaheadAction, LookaheadProcessor, LookaheadResult, LookaheadStart, MacrodefProcessor,
    OrdinaryProcessor, Processor,
};
use crate::provider::{
    copy_provider, macro_provider, resolve_via_cache, sync_copy_processing_frames, CacheSlot,
    OpencodeProvider, Preprocessor, PreprocessorProvider, ProviderKind,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RedefState {
    /// Registered during the active lookahead; verdict pending.
    LookaheadPending,
    /// Lookahead finished cleanly; the definition stands.
    LookaheadDone,
    /// Lookahead finished with queued diagnostics; they are released when
    /// ordinary processing branches to the symbol.
    Diagnostics,
}

struct PendingRedef {
    state: RedefState,
    diags: Vec<Diagnostic>,
}

pub struct ProcessingManager<'a> {
    ctx: &'a mut HlasmContext,
    lib: &'a dyn LibraryProvider,
    document: &'a str,

    opencode: OpencodeProvider<'a>,
    preproc_provider: Option<PreprocessorProvider>,
    preprocessor: Option<Box<dyn Preprocessor>>,

    procs: Vec<Processor>,

    lookahead_stop: Option<(SourceSnapshot, usize)>,
    pending_redefs: FxHashMap<Id, PendingRedef>,
    pending_order: Vec<Id>,
    external_requests: FxHashMap<(Id, MemberKind), bool>,
}

impl<'a> ProcessingManager<'a> {
    /// Manager for ordinary analysis of an open-code document.
    pub fn new(
        document: &'a str,
        ctx: &'a mut HlasmContext,
        lib: &'a dyn LibraryProvider,
        checker: Option<Box<dyn InstructionChecker>>,
        preprocessor: Option<Box<dyn Preprocessor>>,
    ) -> Self {
        let file = ctx.opencode_file;
        let mut opencode = OpencodeProvider::new(document, file);
        opencode.set_dbcs(ctx.options.dbcs);
        let checker = checker.unwrap_or_else(|| Box::new(DefaultChecker));
        Self {
            ctx,
            lib,
            document,
            opencode,
            preproc_provider: None,
            preprocessor,
            procs: vec![Processor::Ordinary(OrdinaryProcessor::new(checker))],
            lookahead_stop: None,
            pending_redefs: FxHashMap::default(),
            pending_order: Vec::new(),
            external_requests: FxHashMap::default(),
        }
    }

    /// Manager for a library member analyzed as a nested unit.
    pub fn for_member(
        document: &'a str,
        ctx: &'a mut HlasmContext,
        lib: &'a dyn LibraryProvider,
        name: Id,
        location: Location,
        kind: MemberKind,
    ) -> Self {
        let processor = match kind {
            MemberKind::Copy => Processor::CopyDef(CopydefProcessor::new(name, location)),
            MemberKind::Macro => Processor::MacroDef(MacrodefProcessor::external(location)),
        };
        let mut opencode = OpencodeProvider::new(document, location.file);
        opencode.set_dbcs(ctx.options.dbcs);
        Self {
            ctx,
            lib,
            document,
            opencode,
            preproc_provider: None,
            preprocessor: None,
            procs: vec![processor],
            lookahead_stop: None,
            pending_redefs: FxHashMap::default(),
            pending_order: Vec::new(),
            external_requests: FxHashMap::default(),
        }
    }

    /// Run to completion.
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<(), Canceled> {
        if let Some(mut preprocessor) = self.preprocessor.take() {
            cancel.check()?;
            tracing::debug!(name = preprocessor.name(), "running preprocessor");
            let statements = preprocessor.generate(self.document).await;
            cancel.check()?;
            if !statements.is_empty() {
                self.preproc_provider = Some(PreprocessorProvider::new(statements));
                self.procs
                    .push(Processor::Preprocessor(Default::default()));
            }
        }
        while self.step(cancel).await? {}
        Ok(())
    }

    /// One step of the main loop: pick the highest-priority provider,
    /// feed one statement to the top processor (or finalize it).
    async fn step(&mut self, cancel: &CancellationToken) -> Result<bool, Canceled> {
        cancel.check()?;
        if self.procs.is_empty() {
            return Ok(false);
        }

        let provider = self.find_provider();
        {
            let top = self.procs.last().expect("checked non-empty");
            if top.finished() || (self.provider_finished(provider) && top.terminal_condition(provider))
            {
                let actions = self.finish_processor();
                self.apply_actions(actions, cancel).await?;
                return Ok(true);
            }
        }

        if let Some(statement) = self.get_next(provider) {
            self.update_metrics(provider);
            let actions = self
                .procs
                .last_mut()
                .expect("checked non-empty")
                .process_statement(self.ctx, statement);
            self.apply_actions(actions, cancel).await?;
        }

        // Keep the host responsive between steps.
        tokio::task::yield_now().await;
        Ok(true)
    }

    // -- providers ---------------------------------------------------------

    fn lookahead_active(&self) -> bool {
        matches!(self.procs.last(), Some(Processor::Lookahead(_)))
    }

    fn attr_lookahead_active(&self) -> bool {
        matches!(
            self.procs.last(),
            Some(Processor::Lookahead(p)) if p.action == LookaheadAction::Ord
        )
    }

    fn provider_finished(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Macro => macro_provider::finished(self.ctx),
            ProviderKind::Copy => copy_provider::finished(self.ctx),
            ProviderKind::Preprocessor => self
                .preproc_provider
                .as_ref()
                .is_none_or(PreprocessorProvider::finished),
            ProviderKind::Opencode => self.opencode.finished(),
        }
    }

    fn find_provider(&self) -> ProviderKind {
        if self.attr_lookahead_active() {
            // Attribute lookahead never consumes macro expansion input;
            // the expansion is resumed after the replay.
            if !copy_provider::finished(self.ctx) {
                return ProviderKind::Copy;
            }
            return ProviderKind::Opencode;
        }
        for kind in [
            ProviderKind::Macro,
            ProviderKind::Copy,
            ProviderKind::Preprocessor,
            ProviderKind::Opencode,
        ] {
            if !self.provider_finished(kind) {
                return kind;
            }
        }
        ProviderKind::Opencode
    }

    fn get_next(&mut self, kind: ProviderKind) -> Option<Statement> {
        let processor = self.procs.last().expect("checked non-empty");
        match kind {
            ProviderKind::Macro => macro_provider::get_next(self.ctx, processor),
            ProviderKind::Copy => copy_provider::get_next(self.ctx, processor),
            ProviderKind::Preprocessor => self.preproc_provider.as_mut()?.get_next(),
            ProviderKind::Opencode => self.opencode.get_next(self.ctx, processor),
        }
    }

    fn update_metrics(&mut self, provider: ProviderKind) {
        let kind = self
            .procs
            .last()
            .map(Processor::kind)
            .unwrap_or(ProcessingKind::Ordinary);
        let metrics = &mut self.ctx.metrics;
        match kind {
            ProcessingKind::Ordinary => match provider {
                ProviderKind::Opencode | ProviderKind::Preprocessor => {
                    metrics.open_code_statements += 1
                }
                ProviderKind::Copy => metrics.copy_statements += 1,
                ProviderKind::Macro => metrics.macro_statements += 1,
            },
            ProcessingKind::Lookahead => metrics.lookahead_statements += 1,
            ProcessingKind::Macro => metrics.macro_def_statements += 1,
            ProcessingKind::Copy => metrics.copy_def_statements += 1,
        }
    }

    // -- processor stack ---------------------------------------------------

    fn finish_processor(&mut self) -> Vec<Action> {
        let mut processor = self.procs.pop().expect("checked non-empty");
        let outcome = processor.end_processing(self.ctx);
        let mut actions = match outcome {
            FinishOutcome::Lookahead(result) => self.finish_lookahead(result),
            FinishOutcome::None => Vec::new(),
        };
        if let Processor::Preprocessor(p) = &mut processor {
            for (name, range) in p.take_pending_copies() {
                actions.push(Action::StartCopy { name, range });
            }
        }
        // END before end of input: an empty processor swallows the rest.
        if self.procs.is_empty()
            && matches!(processor, Processor::Ordinary(_))
            && !self.opencode.finished()
        {
            self.procs.push(Processor::Empty(EmptyProcessor));
        }
        actions
    }

    async fn apply_actions(
        &mut self,
        actions: Vec<Action>,
        cancel: &CancellationToken,
    ) -> Result<(), Canceled> {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            cancel.check()?;
            match action {
                Action::RegisterSeq { name, range } => self.register_sequence_symbol(name, range),
                Action::Jump { target, range } => self.jump_in_statements(target, range),
                Action::StartMacroDef { location } => self
                    .procs
                    .push(Processor::MacroDef(MacrodefProcessor::new(location))),
                Action::StartCopy { name, range } => self.start_copy(name, range, cancel).await,
                Action::AttrLookahead { symbols, statement } => {
                    self.start_attr_lookahead(symbols, statement)
                }
                Action::FetchMacro { name, statement } => {
                    if self.fetch_macro(name, cancel).await {
                        queue.push_back(Action::Reprocess(statement));
                    } else {
                        let range = statement
                            .instruction()
                            .map(|i| i.range())
                            .unwrap_or_default();
                        self.ctx.add_diagnostic(codes::e049(name.as_str(), range));
                    }
                }
                Action::Ainsert { record, back } => {
                    self.ctx.ainsert_generation += 1;
                    let generation = self.ctx.ainsert_generation;
                    self.opencode.ainsert(record, back, generation);
                }
                Action::Aread {
                    name, subscript, ..
                } => {
                    let record = self.opencode.aread();
                    self.ctx.set_variable(name, subscript, SetValue::C(record));
                }
                Action::Reprocess(statement) => {
                    let statement = self.prepare_statement(statement);
                    let more = self
                        .procs
                        .last_mut()
                        .expect("checked non-empty")
                        .process_statement(self.ctx, statement);
                    queue.extend(more);
                }
            }
        }
        Ok(())
    }

    fn prepare_statement(&mut self, statement: Statement) -> Statement {
        match statement {
            Statement::Deferred(base) => {
                let processor = self.procs.last().expect("checked non-empty");
                resolve_via_cache(self.ctx, processor, base, CacheSlot::None)
            }
            other => other,
        }
    }

    // -- external members --------------------------------------------------

    async fn fetch_macro(&mut self, name: Id, cancel: &CancellationToken) -> bool {
        let key = (name, MemberKind::Macro);
        if let Some(&known) = self.external_requests.get(&key) {
            return known && self.ctx.get_macro(name).is_some();
        }
        let found = if self.lib.has_library(name.as_str()) {
            self.lib
                .parse_library(name.as_str(), self.ctx, MemberKind::Macro, cancel)
                .await
        } else {
            false
        };
        self.external_requests.insert(key, found);
        found && self.ctx.get_macro(name).is_some()
    }

    async fn start_copy(&mut self, name: Id, range: Range, cancel: &CancellationToken) {
        if self.ctx.get_copy_member(name).is_none() {
            let key = (name, MemberKind::Copy);
            let found = match self.external_requests.get(&key) {
                Some(&known) => known,
                None => {
                    let found = self
                        .lib
                        .parse_library(name.as_str(), self.ctx, MemberKind::Copy, cancel)
                        .await;
                    self.external_requests.insert(key, found);
                    found
                }
            };
            if !found || self.ctx.get_copy_member(name).is_none() {
                self.ctx.add_diagnostic(codes::e058(name.as_str(), range));
                return;
            }
        }

        if self
            .ctx
            .source
            .copy_stack
            .iter()
            .any(|f| f.copy_member == name)
        {
            self.ctx.add_diagnostic(codes::e062(name.as_str(), range));
            return;
        }

        let member = self.ctx.get_copy_member(name).expect("registered above");
        let location = self.ctx.copy_members[member].location;
        self.ctx.source.copy_stack.push(CopyFrame::new(name, 0));
        self.ctx
            .push_processing_frame(location, StackMember::Copy(name));
        tracing::debug!(member = %name, "copy member activated");
    }

    // -- sequence symbols and branching ------------------------------------

    fn register_sequence_symbol(&mut self, name: Id, range: Range) {
        if !self.attr_lookahead_active() && self.ctx.is_in_macro() {
            return;
        }
        let in_lookahead = self.lookahead_active();
        let location = Location::new(self.ctx.current_file(), range.start);
        let (position, snapshot) = self.ctx.source.create_begin_snapshot();
        let candidate = SequenceSymbol::opencode(name, location, position, snapshot);

        match self.ctx.opencode_sequence(name).cloned() {
            None => {
                self.ctx.add_opencode_sequence(candidate);
                if in_lookahead {
                    self.pending_redefs.entry(name).or_insert(PendingRedef {
                        state: RedefState::LookaheadPending,
                        diags: Vec::new(),
                    });
                    self.pending_order.push(name);
                }
            }
            Some(existing) if existing.same_position(&candidate) => {}
            Some(_) => {
                if !in_lookahead {
                    self.ctx.add_diagnostic(codes::e045(name.as_str(), range));
                } else if let Some(entry) = self.pending_redefs.get_mut(&name) {
                    if entry.state == RedefState::LookaheadPending {
                        entry
                            .diags
                            .push(codes::e045(name.as_str(), range).in_file(location.file));
                    }
                }
                // Defined in normal processing or a previous lookahead:
                // silently ignored.
            }
        }
    }

    fn jump_in_statements(&mut self, target: Id, range: Range) {
        if let Some(offset) = self.ctx.macro_sequence_offset(target) {
            let frame = self.ctx.current_frame_mut().expect("offset implies frame");
            let backward = offset < frame.current_statement;
            frame.current_statement = offset;
            if backward {
                if let Some(counter) = self.ctx.decrement_branch_counter() {
                    if counter < 0 {
                        self.ctx.add_diagnostic(codes::e056(range));
                        self.ctx.leave_macro();
                        self.ctx.pop_processing_frame();
                    }
                }
            }
            return;
        }

        if self.ctx.is_in_macro() {
            self.ctx.add_diagnostic(codes::e047(target.as_str(), range));
            return;
        }

        if let Some(symbol) = self.ctx.opencode_sequence(target).cloned() {
            if let Some(entry) = self.pending_redefs.get_mut(&target) {
                if entry.state == RedefState::Diagnostics {
                    // The definition found by lookahead was dubious:
                    // release the queued diagnostics instead of jumping.
                    for d in std::mem::take(&mut entry.diags) {
                        self.ctx.add_diagnostic(d);
                    }
                    entry.state = RedefState::LookaheadDone;
                    return;
                }
            }
            if let SequenceSymbolKind::Opencode {
                statement_position,
                snapshot,
            } = symbol.kind
            {
                self.perform_opencode_jump(statement_position, snapshot);
            }
            return;
        }

        // Unknown open-code target: scan forward for it.
        let (position, snapshot) = self.ctx.source.create_end_snapshot();
        self.start_lookahead(LookaheadStart {
            action: LookaheadAction::Seq,
            target,
            targets: Vec::new(),
            range,
            statement_position: position,
            snapshot,
            pending_statement: None,
        });
    }

    fn start_attr_lookahead(&mut self, symbols: Vec<Id>, statement: Statement) {
        let range = statement.range().unwrap_or_default();
        let (position, snapshot) = self.ctx.source.create_end_snapshot();
        tracing::debug!(?symbols, "attribute lookahead");
        self.start_lookahead(LookaheadStart {
            action: LookaheadAction::Ord,
            target: Id::EMPTY,
            targets: symbols,
            range,
            statement_position: position,
            snapshot,
            pending_statement: Some(statement),
        });
    }

    fn start_lookahead(&mut self, start: LookaheadStart) {
        // Resume where the previous lookahead stopped when it is still
        // ahead of us and no AINSERT happened since.
        if let Some((stop_snapshot, stop_generation)) = &self.lookahead_stop {
            if self.ctx.source.end_index < stop_snapshot.end_index
                && self.ctx.ainsert_generation <= *stop_generation
            {
                let position =
                    SourcePosition::new(stop_snapshot.end_line, stop_snapshot.end_index);
                let snapshot = stop_snapshot.clone();
                self.perform_opencode_jump(position, snapshot);
            }
        }
        self.procs
            .push(Processor::Lookahead(LookaheadProcessor::new(start)));
    }

    fn finish_lookahead(&mut self, result: LookaheadResult) -> Vec<Action> {
        for name in std::mem::take(&mut self.pending_order) {
            if let Some(entry) = self.pending_redefs.get_mut(&name) {
                if entry.state == RedefState::LookaheadPending {
                    entry.state = if entry.diags.is_empty() {
                        RedefState::LookaheadDone
                    } else {
                        RedefState::Diagnostics
                    };
                }
            }
        }
        self.lookahead_stop = Some((
            self.ctx.source.create_snapshot(),
            self.ctx.ainsert_generation,
        ));

        match result.action {
            LookaheadAction::Seq => {
                if result.success {
                    self.jump_in_statements(result.target, result.range);
                } else {
                    self.perform_opencode_jump(result.statement_position, result.snapshot);
                    self.ctx
                        .add_diagnostic(codes::e047(result.target.as_str(), result.range));
                }
                Vec::new()
            }
            LookaheadAction::Ord => {
                self.perform_opencode_jump(result.statement_position, result.snapshot);
                match result.pending_statement {
                    Some(statement) => vec![Action::Reprocess(statement)],
                    None => Vec::new(),
                }
            }
        }
    }

    fn perform_opencode_jump(&mut self, position: SourcePosition, snapshot: SourceSnapshot) {
        self.opencode.rewind_input(position);
        self.ctx.source.apply_snapshot(snapshot);
        sync_copy_processing_frames(self.ctx);

        // A jump into a copy member may need attribution frames rebuilt.
        let have = self
            .ctx
            .processing_stack()
            .iter()
            .filter(|f| matches!(f.member, Some(StackMember::Copy(_))))
            .count();
        for frame in self.ctx.source.copy_stack.clone().iter().skip(have) {
            let location = self
                .ctx
                .get_copy_member(frame.copy_member)
                .map(|idx| self.ctx.copy_members[idx].location)
                .unwrap_or_default();
            self.ctx
                .push_processing_frame(location, StackMember::Copy(frame.copy_member));
        }
    }
}
