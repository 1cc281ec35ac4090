//! hlac-drv - Analyzer Facade and Driver
//!
//! Ties the pieces together for a host: build the analysis context from
//! assembler options, attach a library provider, run the pipeline, and
//! hand back diagnostics plus metrics. The `hlac` binary in this crate is
//! a thin command-line wrapper over [`analyze`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use hlac_conf::AssemblerOptions;
use hlac_ctx::fade::FadeMessage;
use hlac_ctx::{CtxOptions, HlasmContext, Metrics};
use hlac_proc::{
    analyze_library_member, analyze_opencode, InstructionChecker, LibraryProvider, MemberKind,
    Preprocessor,
};
use hlac_util::span::{Location, Position};
use hlac_util::{Canceled, CancellationToken, Diagnostic, Id};

/// Everything the host configures for one analysis.
#[derive(Default)]
pub struct AnalyzerConfig {
    /// Name the open-code file is reported under.
    pub file_name: String,
    pub asm_options: AssemblerOptions,
    pub diagnostic_limit: Option<usize>,
    pub dbcs: bool,
    /// Replacement machine-instruction checker, when the host has a
    /// richer one than the format-level default.
    pub checker: Option<Box<dyn InstructionChecker>>,
    pub preprocessor: Option<Box<dyn Preprocessor>>,
}

/// What an analysis produced.
#[derive(Debug)]
pub struct AnalysisResult {
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics dropped by the retention cap.
    pub suppressed: usize,
    pub metrics: Metrics,
    pub fade_messages: Vec<FadeMessage>,
}

impl AnalysisResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == hlac_util::Severity::Error)
    }
}

fn ctx_options(config: &AnalyzerConfig) -> CtxOptions {
    let mut options = CtxOptions {
        diagnostic_limit: config.diagnostic_limit,
        dbcs: config.dbcs,
        ..Default::default()
    };
    let asm = &config.asm_options;
    if let Some(sysparm) = &asm.sysparm {
        options.sysparm = sysparm.clone();
    }
    if let Some(profile) = &asm.profile {
        options.profile = profile.clone();
    }
    if let Some(system_id) = &asm.system_id {
        options.system_id = system_id.clone();
    }
    if let Some(instr_set) = asm.instruction_set() {
        options.instr_set = instr_set;
    }
    options
}

/// Analyze one document.
pub async fn analyze(
    text: &str,
    mut config: AnalyzerConfig,
    lib: &dyn LibraryProvider,
    cancel: &CancellationToken,
) -> Result<AnalysisResult, Canceled> {
    let file = Id::intern(&config.file_name);
    let mut ctx = HlasmContext::new(file, ctx_options(&config));
    analyze_opencode(
        text,
        &mut ctx,
        lib,
        config.checker.take(),
        config.preprocessor.take(),
        cancel,
    )
    .await?;
    Ok(AnalysisResult {
        suppressed: ctx.collector.suppressed_count(),
        diagnostics: ctx.collector.into_diagnostics(),
        metrics: ctx.metrics,
        fade_messages: ctx.fade_messages,
    })
}

/// Library provider over plain directories: a member named `NAME` is a
/// file `NAME` (or `NAME.<ext>` for each configured macro extension) in
/// the first directory that has it.
pub struct FileLibProvider {
    dirs: Vec<PathBuf>,
    macro_extensions: Vec<String>,
}

impl FileLibProvider {
    pub fn new(dirs: Vec<PathBuf>, macro_extensions: Vec<String>) -> Self {
        Self {
            dirs,
            macro_extensions,
        }
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        for dir in &self.dirs {
            let plain = dir.join(name);
            if plain.is_file() {
                return Some(plain);
            }
            for ext in &self.macro_extensions {
                let with_ext = dir.join(format!("{name}.{ext}"));
                if with_ext.is_file() {
                    return Some(with_ext);
                }
            }
        }
        None
    }
}

#[async_trait(?Send)]
impl LibraryProvider for FileLibProvider {
    fn has_library(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    async fn get_library(&self, name: &str) -> Option<(String, Location)> {
        let path = self.resolve(name)?;
        let text = std::fs::read_to_string(&path).ok()?;
        let file = Id::intern(&path.to_string_lossy());
        Some((text, Location::new(file, Position::new(0, 0))))
    }

    async fn parse_library(
        &self,
        name: &str,
        ctx: &mut HlasmContext,
        kind: MemberKind,
        cancel: &CancellationToken,
    ) -> bool {
        let Some((text, location)) = self.get_library(name).await else {
            return false;
        };
        analyze_library_member(
            &text,
            location,
            Id::from_upper(name),
            kind,
            ctx,
            self,
            cancel,
        )
        .await
    }
}

/// Read a file for the CLI, mapping errors to a usage-style message.
pub fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read '{}': {e}", path.display()))
}
