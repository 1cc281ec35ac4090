//! End-to-end pipeline tests over an in-memory library provider.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;

use hlac_ctx::ordinary::SymbolValue;
use hlac_ctx::{CtxOptions, HlasmContext};
use hlac_proc::{analyze_library_member, analyze_opencode, LibraryProvider, MemberKind};
use hlac_util::span::{Location, Position};
use hlac_util::{CancellationToken, Diagnostic, Id, Severity};

/// In-memory member store; `parse_library` recurses through the nested
/// analyzer the way a real provider does.
#[derive(Default)]
struct MemLib {
    members: HashMap<String, String>,
    fetches: RefCell<usize>,
}

impl MemLib {
    fn with(members: &[(&str, &str)]) -> Self {
        Self {
            members: members
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            fetches: RefCell::new(0),
        }
    }

    fn fetch_count(&self) -> usize {
        *self.fetches.borrow()
    }
}

#[async_trait(?Send)]
impl LibraryProvider for MemLib {
    fn has_library(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    async fn get_library(&self, name: &str) -> Option<(String, Location)> {
        let text = self.members.get(name)?.clone();
        let file = Id::intern(&format!("{name}.hlasm"));
        Some((text, Location::new(file, Position::new(0, 0))))
    }

    async fn parse_library(
        &self,
        name: &str,
        ctx: &mut HlasmContext,
        kind: MemberKind,
        cancel: &CancellationToken,
    ) -> bool {
        *self.fetches.borrow_mut() += 1;
        let Some((text, location)) = self.get_library(name).await else {
            return false;
        };
        analyze_library_member(&text, location, Id::from_upper(name), kind, ctx, self, cancel)
            .await
    }
}

async fn analyze_with(text: &str, lib: &MemLib, options: CtxOptions) -> HlasmContext {
    let mut ctx = HlasmContext::new(Id::intern("main.hlasm"), options);
    let cancel = CancellationToken::new();
    analyze_opencode(text, &mut ctx, lib, None, None, &cancel)
        .await
        .expect("analysis not canceled");
    ctx
}

async fn analyze(text: &str) -> HlasmContext {
    analyze_with(text, &MemLib::default(), CtxOptions::default()).await
}

fn mnotes(ctx: &HlasmContext) -> Vec<&Diagnostic> {
    ctx.collector
        .diagnostics()
        .iter()
        .filter(|d| d.code == "MNOTE")
        .collect()
}

fn codes(ctx: &HlasmContext) -> Vec<&str> {
    ctx.collector
        .diagnostics()
        .iter()
        .map(|d| d.code)
        .collect()
}

// ---------------------------------------------------------------------------
// sequence-symbol branching
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "current_thread")]
async fn simple_ago_skip() {
    let ctx = analyze(
        "         AGO   .L1\n\
         \x20        MNOTE 'SKIPPED'\n\
         .L1      MNOTE 'REACHED'\n",
    )
    .await;
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1, "{:?}", ctx.collector.diagnostics());
    assert_eq!(notes[0].message, "REACHED");
    assert!(notes[0].severity == Severity::Info || notes[0].severity == Severity::Warning);
    assert!(!codes(&ctx).contains(&"E047"));
}

#[tokio::test(flavor = "current_thread")]
async fn ago_backwards_in_open_code() {
    let ctx = analyze(
        "&N       SETA  &N+1\n\
         \x20        AIF   (&N GE 3).DONE\n\
         \x20        AGO   .TOP\n\
         .DONE    MNOTE 'DONE'\n",
    )
    .await;
    // .TOP is never defined: the lookahead fails with E047 and analysis
    // resumes after the AGO.
    assert!(codes(&ctx).contains(&"E047"));
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].message, "DONE");
}

#[tokio::test(flavor = "current_thread")]
async fn failed_lookahead_resumes_after_branch() {
    let ctx = analyze(
        "         AGO   .NOPE\n\
         \x20        MNOTE 'AFTER'\n",
    )
    .await;
    assert!(codes(&ctx).contains(&"E047"));
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].message, "AFTER");
}

#[tokio::test(flavor = "current_thread")]
async fn sequence_symbol_redefinition_is_diagnosed() {
    let ctx = analyze(
        ".DUP     ANOP\n\
         .DUP     ANOP\n",
    )
    .await;
    assert_eq!(
        codes(&ctx).iter().filter(|c| **c == "E045").count(),
        1,
        "{:?}",
        ctx.collector.diagnostics()
    );
}

#[tokio::test(flavor = "current_thread")]
async fn lookahead_across_copy_member() {
    let lib = MemLib::with(&[("CPY1", "         MNOTE 'INSIDE'\n")]);
    let ctx = analyze_with(
        "         AGO   .TARGET\n\
         \x20        COPY  CPY1\n\
         .TARGET  ANOP\n",
        &lib,
        CtxOptions::default(),
    )
    .await;
    assert!(mnotes(&ctx).is_empty(), "{:?}", ctx.collector.diagnostics());
    assert!(!codes(&ctx).contains(&"E047"));
}

// ---------------------------------------------------------------------------
// macros
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "current_thread")]
async fn macro_recursion_with_actr() {
    let ctx = analyze(
        "         MACRO\n\
         \x20        M     &P\n\
         \x20        AIF   (&P EQ 1).E\n\
         \x20        M     1\n\
         .E       MEND\n\
         \x20        M     0\n",
    )
    .await;
    assert!(
        ctx.collector.diagnostics().is_empty(),
        "{:?}",
        ctx.collector.diagnostics()
    );
}

#[tokio::test(flavor = "current_thread")]
async fn operand_reparse_after_substitution() {
    let ctx = analyze(
        "         MACRO\n\
         \x20        M     &OP\n\
         &OP      EQU   1\n\
         \x20        MEND\n\
         \x20        M     X\n",
    )
    .await;
    assert!(
        ctx.collector.diagnostics().is_empty(),
        "{:?}",
        ctx.collector.diagnostics()
    );
    let sym = ctx.ordinals.get(Id::intern("X")).expect("X defined");
    assert_eq!(sym.value, Some(SymbolValue::Abs(1)));
}

#[tokio::test(flavor = "current_thread")]
async fn branch_counter_exhaustion_terminates_macro() {
    let ctx = analyze(
        "         MACRO\n\
         \x20        M\n\
         \x20        ACTR  2\n\
         .L       ANOP\n\
         \x20        AGO   .L\n\
         \x20        MEND\n\
         \x20        M\n",
    )
    .await;
    assert!(codes(&ctx).contains(&"E056"), "{:?}", codes(&ctx));
}

#[tokio::test(flavor = "current_thread")]
async fn macro_sysndx_distinct_per_invocation() {
    let ctx = analyze(
        "         MACRO\n\
         \x20        M\n\
         \x20        MNOTE '&SYSNDX'\n\
         \x20        MEND\n\
         \x20        M\n\
         \x20        M\n",
    )
    .await;
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 2);
    assert_ne!(notes[0].message, notes[1].message);
}

#[tokio::test(flavor = "current_thread")]
async fn keyword_parameters_and_defaults() {
    let ctx = analyze(
        "         MACRO\n\
         \x20        M     &P,&K=DFLT\n\
         \x20        MNOTE '&P/&K'\n\
         \x20        MEND\n\
         \x20        M     A,K=OVR\n\
         \x20        M     B\n",
    )
    .await;
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].message, "A/OVR");
    assert_eq!(notes[1].message, "B/DFLT");
}

#[tokio::test(flavor = "current_thread")]
async fn missing_mend_is_diagnosed() {
    let ctx = analyze(
        "         MACRO\n\
         \x20        M\n\
         \x20        MNOTE 'BODY'\n",
    )
    .await;
    assert!(codes(&ctx).contains(&"E046"));
}

#[tokio::test(flavor = "current_thread")]
async fn library_macro_fetched_on_unknown_opcode() {
    let lib = MemLib::with(&[(
        "MYMAC",
        "         MACRO\n\
         \x20        MYMAC &X\n\
         \x20        MNOTE 'GOT &X'\n\
         \x20        MEND\n",
    )]);
    let ctx = analyze_with("         MYMAC 7\n", &lib, CtxOptions::default()).await;
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1, "{:?}", ctx.collector.diagnostics());
    assert_eq!(notes[0].message, "GOT 7");
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_opcode_is_e049() {
    let ctx = analyze("         NOSUCH 1\n").await;
    assert!(codes(&ctx).contains(&"E049"));
}

// ---------------------------------------------------------------------------
// attribute lookahead
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "current_thread")]
async fn attribute_lookahead_resolves_forward_type() {
    let ctx = analyze(
        "         AIF   (T'FWD EQ 'U').SKIP\n\
         \x20        MNOTE 'DEFINED'\n\
         .SKIP    ANOP\n\
         FWD      DS    F\n",
    )
    .await;
    // T'FWD resolves to F via lookahead, so the AIF is false and the
    // MNOTE is reached.
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1, "{:?}", ctx.collector.diagnostics());
    assert_eq!(notes[0].message, "DEFINED");
    assert!(!codes(&ctx).contains(&"E045"));
    assert!(!codes(&ctx).contains(&"E047"));

    let sym = ctx.ordinals.get(Id::intern("FWD")).expect("FWD known");
    assert_eq!(sym.attributes.type_attr, 'F');
    assert!(sym.is_defined());
}

#[tokio::test(flavor = "current_thread")]
async fn attribute_lookahead_miss_pins_undefined() {
    let ctx = analyze(
        "         AIF   (T'NEVER EQ 'U').SKIP\n\
         \x20        MNOTE 'WRONG'\n\
         .SKIP    MNOTE 'SKIPPED'\n",
    )
    .await;
    // NEVER stays type U; the branch is taken.
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1, "{:?}", ctx.collector.diagnostics());
    assert_eq!(notes[0].message, "SKIPPED");
}

// ---------------------------------------------------------------------------
// COPY
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "current_thread")]
async fn copy_member_cached_across_references() {
    let lib = MemLib::with(&[("CPY", "         MNOTE 'IN'\n")]);
    let ctx = analyze_with(
        "         COPY  CPY\n\
         \x20        COPY  CPY\n",
        &lib,
        CtxOptions::default(),
    )
    .await;
    assert_eq!(mnotes(&ctx).len(), 2);
    // Fetched and registered once; the second reference reuses the list.
    assert_eq!(lib.fetch_count(), 1);
    assert_eq!(ctx.metrics.copy_statements, 2);

    let member = ctx.get_copy_member(Id::intern("CPY")).unwrap();
    // One cached reparse per statement, shared by both expansions.
    assert_eq!(ctx.copy_members[member].body[0].len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn missing_copy_member_is_e058() {
    let ctx = analyze("         COPY  NOPE\n").await;
    assert!(codes(&ctx).contains(&"E058"));
}

#[tokio::test(flavor = "current_thread")]
async fn recursive_copy_is_e062() {
    let lib = MemLib::with(&[("LOOP", "         COPY  LOOP\n")]);
    let ctx = analyze_with("         COPY  LOOP\n", &lib, CtxOptions::default()).await;
    assert!(codes(&ctx).contains(&"E062"), "{:?}", codes(&ctx));
}

#[tokio::test(flavor = "current_thread")]
async fn copy_diagnostics_carry_processing_stack() {
    let lib = MemLib::with(&[("CPY", "         MNOTE 8,'BAD'\n")]);
    let ctx = analyze_with("         COPY  CPY\n", &lib, CtxOptions::default()).await;
    let note = mnotes(&ctx)[0];
    assert_eq!(note.severity, Severity::Error);
    assert!(
        note.stack.len() > 1,
        "expected nested stack, got {:?}",
        note.stack
    );
}

// ---------------------------------------------------------------------------
// AINSERT / AREAD
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "current_thread")]
async fn ainsert_front_precedes_back() {
    // Queue from inside a macro so both buckets are pending when the
    // open-code provider is consulted again: front records go first,
    // submission order preserved within each bucket.
    let ctx = analyze(
        "         MACRO\n\
         \x20        M\n\
         \x20        AINSERT '         MNOTE ''B1''',BACK\n\
         \x20        AINSERT '         MNOTE ''F1''',FRONT\n\
         \x20        AINSERT '         MNOTE ''B2''',BACK\n\
         \x20        AINSERT '         MNOTE ''F2''',FRONT\n\
         \x20        MEND\n\
         \x20        M\n\
         \x20        MNOTE 'L'\n",
    )
    .await;
    let order: Vec<_> = mnotes(&ctx).iter().map(|d| d.message.clone()).collect();
    assert_eq!(order, vec!["F1", "F2", "B1", "B2", "L"]);
}

#[tokio::test(flavor = "current_thread")]
async fn backward_branch_in_open_code() {
    let ctx = analyze(
        "&N       SETA  0\n\
         .TOP     ANOP\n\
         &N       SETA  &N+1\n\
         \x20        AIF   (&N LT 3).TOP\n\
         \x20        MNOTE 'N=&N'\n",
    )
    .await;
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1, "{:?}", ctx.collector.diagnostics());
    assert_eq!(notes[0].message, "N=3");
    assert!(!codes(&ctx).contains(&"E045"), "{:?}", codes(&ctx));
}

#[tokio::test(flavor = "current_thread")]
async fn ainserted_records_have_distinct_location() {
    let ctx = analyze("         AINSERT '         MNOTE ''X''',FRONT\n").await;
    let note = mnotes(&ctx)[0];
    assert!(note.file.as_str().starts_with("AINSERT:"), "{}", note.file);
}

#[tokio::test(flavor = "current_thread")]
async fn aread_consumes_next_record() {
    let ctx = analyze(
        "         MACRO\n\
         \x20        M\n\
         &L       AREAD\n\
         \x20        MNOTE '&L'\n\
         \x20        MEND\n\
         \x20        M\n\
         RAW RECORD CONTENT\n",
    )
    .await;
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1, "{:?}", ctx.collector.diagnostics());
    assert!(notes[0].message.starts_with("RAW RECORD CONTENT"));
    assert_eq!(notes[0].message.len(), 80);
}

#[tokio::test(flavor = "current_thread")]
async fn aread_outside_macro_is_e064() {
    let ctx = analyze("&L       AREAD\n").await;
    assert!(codes(&ctx).contains(&"E064"));
}

// ---------------------------------------------------------------------------
// preprocessor
// ---------------------------------------------------------------------------

/// A toy preprocessor: `*++INCLUDE NAME` comment lines become
/// synthesized COPY statements (the assembler itself sees only a
/// comment).
struct IncludePreprocessor;

#[async_trait(?Send)]
impl hlac_proc::Preprocessor for IncludePreprocessor {
    fn name(&self) -> &'static str {
        "INCLUDE"
    }

    async fn generate(&mut self, document: &str) -> Vec<hlac_par::PreprocStatement> {
        document
            .lines()
            .enumerate()
            .filter_map(|(line, text)| {
                let member = text.trim().strip_prefix("*++INCLUDE ")?;
                Some(hlac_par::PreprocStatement {
                    instruction: Id::intern("COPY"),
                    text: member.trim().to_owned(),
                    range: hlac_util::span::Range::in_line(line, 0, text.len()),
                })
            })
            .collect()
    }
}

#[tokio::test(flavor = "current_thread")]
async fn preprocessor_statements_inject_members_and_fade() {
    let lib = MemLib::with(&[("PRE", "         MNOTE 'FROM PRE'\n")]);
    let mut ctx = HlasmContext::new(Id::intern("main.hlasm"), CtxOptions::default());
    let cancel = CancellationToken::new();
    analyze_opencode(
        "*++INCLUDE PRE\n         MNOTE 'MAIN'\n",
        &mut ctx,
        &lib,
        None,
        Some(Box::new(IncludePreprocessor)),
        &cancel,
    )
    .await
    .unwrap();

    let order: Vec<_> = mnotes(&ctx).iter().map(|d| d.message.clone()).collect();
    assert_eq!(order, vec!["FROM PRE", "MAIN"]);
    assert_eq!(ctx.fade_messages.len(), 1);
    assert_eq!(
        ctx.fade_messages[0].reason,
        hlac_ctx::fade::FadeReason::Preprocessor
    );
}

// ---------------------------------------------------------------------------
// ordinary semantics
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "current_thread")]
async fn machine_operand_count_is_checked() {
    let ctx = analyze(
        "         LR    1,2\n\
         \x20        LR    1\n\
         \x20        LR    1,2,3\n",
    )
    .await;
    let c = codes(&ctx);
    assert!(c.contains(&"A011"), "{c:?}");
    assert!(c.contains(&"A010"), "{c:?}");
}

#[tokio::test(flavor = "current_thread")]
async fn symbols_and_sections() {
    let ctx = analyze(
        "SECT     CSECT\n\
         LBL      DS    2F\n\
         LEN      EQU   L'LBL\n\
         \x20        END\n",
    )
    .await;
    assert!(
        ctx.collector.diagnostics().is_empty(),
        "{:?}",
        ctx.collector.diagnostics()
    );
    let lbl = ctx.ordinals.get(Id::intern("LBL")).unwrap();
    assert_eq!(lbl.attributes.type_attr, 'F');
    assert_eq!(lbl.attributes.length, 4);
    let len = ctx.ordinals.get(Id::intern("LEN")).unwrap();
    assert_eq!(len.value, Some(SymbolValue::Abs(4)));
}

#[tokio::test(flavor = "current_thread")]
async fn ordinary_symbol_redefinition_is_e031() {
    let ctx = analyze(
        "X        EQU   1\n\
         X        EQU   2\n",
    )
    .await;
    assert!(codes(&ctx).contains(&"E031"));
}

#[tokio::test(flavor = "current_thread")]
async fn statements_after_end_are_swallowed() {
    let ctx = analyze(
        "         MNOTE 'BEFORE'\n\
         \x20        END\n\
         \x20        MNOTE 'AFTER'\n",
    )
    .await;
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].message, "BEFORE");
}

#[tokio::test(flavor = "current_thread")]
async fn global_variables_cross_macro_boundary() {
    let ctx = analyze(
        "         MACRO\n\
         \x20        M\n\
         \x20        GBLA  &G\n\
         &G       SETA  41\n\
         \x20        MEND\n\
         \x20        GBLA  &G\n\
         \x20        M\n\
         &G       SETA  &G+1\n\
         \x20        MNOTE '&G'\n",
    )
    .await;
    let notes = mnotes(&ctx);
    assert_eq!(notes.len(), 1, "{:?}", ctx.collector.diagnostics());
    assert_eq!(notes[0].message, "42");
}

#[tokio::test(flavor = "current_thread")]
async fn diagnostic_limit_suppresses_but_counts() {
    let options = CtxOptions {
        diagnostic_limit: Some(1),
        ..Default::default()
    };
    let ctx = analyze_with(
        "         NOSUCH1 1\n\
         \x20        NOSUCH2 2\n",
        &MemLib::default(),
        options,
    )
    .await;
    assert_eq!(ctx.collector.diagnostics().len(), 1);
    assert_eq!(ctx.collector.suppressed_count(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn cancellation_unwinds_cleanly() {
    let mut ctx = HlasmContext::new(Id::intern("main.hlasm"), CtxOptions::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let lib = MemLib::default();
    let outcome = analyze_opencode("         MNOTE 'X'\n", &mut ctx, &lib, None, None, &cancel).await;
    assert!(outcome.is_err());
}

#[tokio::test(flavor = "current_thread")]
async fn metrics_are_tracked() {
    let ctx = analyze(
        "         MACRO\n\
         \x20        M\n\
         \x20        MNOTE 'X'\n\
         \x20        MEND\n\
         \x20        M\n\
         \x20        LR    1,2\n",
    )
    .await;
    assert!(ctx.metrics.macro_def_statements > 0);
    assert!(ctx.metrics.macro_statements > 0);
    assert!(ctx.metrics.open_code_statements > 0);
    assert!(ctx.metrics.reparsed_statements > 0);
}
