//! hlac-ctx - Analysis Context
//!
//! The single mutable home of everything the pipeline knows about one
//! assembly: ordinary symbols and sections, SET variables and their
//! scopes, sequence symbols, macro and copy definitions (arena-owned,
//! referenced by index), the open-code source context with its
//! snapshots, the statement cache, metrics, and the diagnostic collector.
//!
//! The context is owned exclusively by the processing manager between
//! suspension points; no interior locking exists or is needed.

pub mod cache;
pub mod copy_member;
pub mod eval;
pub mod fade;
pub mod instruction;
pub mod macro_def;
pub mod ordinary;
pub mod sequence;
pub mod source_ctx;
pub mod variables;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use hlac_util::diagnostic::{StackFrame, StackMember};
use hlac_util::span::Location;
use hlac_util::{Arena, Diagnostic, DiagnosticCollector, Id, Idx, InstructionSetVersion};

use copy_member::CopyMember;
use fade::FadeMessage;
use instruction::{resolve_static, CaOpCode, MachineInstruction, StaticOpcode};
use macro_def::{MacroDef, MacroFrame, MacroScope};
use ordinary::OrdinaryTable;
use sequence::SequenceSymbol;
use source_ctx::SourceContext;
use variables::{CodeScope, SetType, SetValue, SetVariable};

pub use instruction::AsmOpCode;

/// Assembly-wide options the context carries.
#[derive(Clone, Debug)]
pub struct CtxOptions {
    pub sysparm: String,
    pub profile: String,
    pub system_id: String,
    pub instr_set: InstructionSetVersion,
    /// &SYSDATE / &SYSTIME values; fixed by the host for reproducibility.
    pub sysdate: String,
    pub systime: String,
    /// Retention cap for diagnostics; `None` is unlimited.
    pub diagnostic_limit: Option<usize>,
    /// Double-byte character set continuation handling.
    pub dbcs: bool,
}

impl Default for CtxOptions {
    fn default() -> Self {
        Self {
            sysparm: String::new(),
            profile: String::new(),
            system_id: "z/OS".to_owned(),
            instr_set: InstructionSetVersion::Uni,
            sysdate: "01/01/88".to_owned(),
            systime: "00.00".to_owned(),
            diagnostic_limit: None,
            dbcs: false,
        }
    }
}

/// Per-kind statement counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    pub open_code_statements: usize,
    pub copy_statements: usize,
    pub macro_statements: usize,
    pub lookahead_statements: usize,
    pub copy_def_statements: usize,
    pub macro_def_statements: usize,
    pub reparsed_statements: usize,
}

/// Resolution of an instruction name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedOpcode {
    Ca(CaOpCode),
    Asm(AsmOpCode),
    Mach(&'static MachineInstruction),
    Macro(Idx<MacroDef>),
}

/// The analysis context.
pub struct HlasmContext {
    /// The file open-code statements come from.
    pub opencode_file: Id,
    pub options: CtxOptions,

    pub ordinals: OrdinaryTable,

    /// Global SET variables.
    pub globals: FxHashMap<Id, SetVariable>,
    /// The open-code scope (bottom of the scope stack).
    pub opencode_scope: CodeScope,
    /// Macro invocation scopes, innermost last.
    pub macro_stack: Vec<MacroScope>,

    /// Open-code sequence symbols.
    pub opencode_sequences: FxHashMap<Id, SequenceSymbol>,

    pub macros: Arena<MacroDef>,
    /// Name index in definition order, for deterministic listings.
    macro_index: IndexMap<Id, Idx<MacroDef>>,
    pub copy_members: Arena<CopyMember>,
    copy_index: IndexMap<Id, Idx<CopyMember>>,

    pub source: SourceContext,
    /// Processing stack for diagnostics: open code, then one frame per
    /// entered copy member / macro expansion.
    processing_frames: Vec<StackFrame>,

    pub metrics: Metrics,
    sysndx_counter: u32,
    /// Monotonically increasing AINSERT generation counter.
    pub ainsert_generation: usize,

    pub collector: DiagnosticCollector,
    pub fade_messages: Vec<FadeMessage>,
}

impl HlasmContext {
    pub fn new(opencode_file: Id, options: CtxOptions) -> Self {
        let collector = match options.diagnostic_limit {
            Some(limit) => DiagnosticCollector::with_limit(limit),
            None => DiagnosticCollector::new(),
        };
        Self {
            opencode_file,
            options,
            ordinals: OrdinaryTable::new(),
            globals: FxHashMap::default(),
            opencode_scope: CodeScope::new(),
            macro_stack: Vec::new(),
            opencode_sequences: FxHashMap::default(),
            macros: Arena::new(),
            macro_index: IndexMap::new(),
            copy_members: Arena::new(),
            copy_index: IndexMap::new(),
            source: SourceContext::default(),
            processing_frames: vec![StackFrame {
                location: Location::new(opencode_file, Default::default()),
                member: None,
            }],
            metrics: Metrics::default(),
            sysndx_counter: 0,
            ainsert_generation: 0,
            collector,
            fade_messages: Vec::new(),
        }
    }

    // -- diagnostics -------------------------------------------------------

    /// File diagnostics should currently be attributed to.
    pub fn current_file(&self) -> Id {
        self.processing_frames
            .last()
            .map(|f| f.location.file)
            .unwrap_or(self.opencode_file)
    }

    /// Emit a diagnostic, attaching the current file (unless already
    /// set) and the processing stack.
    pub fn add_diagnostic(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.file.is_empty() {
            diagnostic.file = self.current_file();
        }
        if diagnostic.stack.is_empty() && self.processing_frames.len() > 1 {
            diagnostic.stack = self.processing_frames.clone();
        }
        self.collector.add(diagnostic);
    }

    /// Route a statement's reparse diagnostics through a child collector:
    /// each is tagged with the current file and processing stack, then the
    /// child is merged into the main collector.
    pub fn absorb_reparse_diags(&mut self, diags: &[Diagnostic]) {
        if diags.is_empty() {
            return;
        }
        let file = self.current_file();
        let mut child = DiagnosticCollector::new();
        for mut d in diags.iter().cloned() {
            if d.file.is_empty() {
                d.file = file;
            }
            if d.stack.is_empty() && self.processing_frames.len() > 1 {
                d.stack = self.processing_frames.clone();
            }
            child.add(d);
        }
        self.collector.absorb(child);
    }

    /// Enter a nested member for diagnostic attribution.
    pub fn push_processing_frame(&mut self, location: Location, member: StackMember) {
        self.processing_frames.push(StackFrame {
            location,
            member: Some(member),
        });
    }

    pub fn pop_processing_frame(&mut self) {
        if self.processing_frames.len() > 1 {
            self.processing_frames.pop();
        }
    }

    pub fn processing_stack(&self) -> &[StackFrame] {
        &self.processing_frames
    }

    // -- scopes and variables ----------------------------------------------

    pub fn is_in_macro(&self) -> bool {
        !self.macro_stack.is_empty()
    }

    pub fn current_scope(&self) -> &CodeScope {
        self.macro_stack
            .last()
            .map(|m| &m.scope)
            .unwrap_or(&self.opencode_scope)
    }

    pub fn current_scope_mut(&mut self) -> &mut CodeScope {
        self.macro_stack
            .last_mut()
            .map(|m| &mut m.scope)
            .unwrap_or(&mut self.opencode_scope)
    }

    pub fn current_frame(&self) -> Option<&MacroFrame> {
        self.macro_stack.last().map(|m| &m.frame)
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut MacroFrame> {
        self.macro_stack.last_mut().map(|m| &mut m.frame)
    }

    /// Declare a local SET variable in the current scope.
    pub fn declare_local(&mut self, name: Id, set_type: SetType) {
        self.current_scope_mut()
            .variables
            .entry(name)
            .or_insert_with(|| SetVariable::new(set_type));
    }

    /// Declare a global SET variable and alias it into the current scope.
    pub fn declare_global(&mut self, name: Id, set_type: SetType) {
        self.globals
            .entry(name)
            .or_insert_with(|| SetVariable::new(set_type));
        self.current_scope_mut().global_aliases.insert(name);
    }

    /// Assign a SET variable, creating an implicit local on first SET.
    pub fn set_variable(&mut self, name: Id, subscript: Option<u32>, value: SetValue) {
        let set_type = value.set_type();
        let var = if self.current_scope().global_aliases.contains(&name) {
            self.globals
                .entry(name)
                .or_insert_with(|| SetVariable::new(set_type))
        } else {
            self.current_scope_mut()
                .variables
                .entry(name)
                .or_insert_with(|| SetVariable::new(set_type))
        };
        match subscript {
            Some(index) => var.set_element(index, value),
            None => var.set_scalar(value),
        }
    }

    /// Find a SET variable visible from the current scope.
    pub fn find_variable(&self, name: Id) -> Option<&SetVariable> {
        if self.current_scope().global_aliases.contains(&name) {
            return self.globals.get(&name);
        }
        self.current_scope().variables.get(&name)
    }

    // -- macros ------------------------------------------------------------

    pub fn add_macro(&mut self, def: MacroDef) -> Idx<MacroDef> {
        let name = def.name;
        let idx = self.macros.alloc(def);
        self.macro_index.insert(name, idx);
        idx
    }

    pub fn get_macro(&self, name: Id) -> Option<Idx<MacroDef>> {
        self.macro_index.get(&name).copied()
    }

    /// Defined macros in definition order.
    pub fn macro_names(&self) -> impl Iterator<Item = Id> + '_ {
        self.macro_index.keys().copied()
    }

    pub fn next_sysndx(&mut self) -> u32 {
        self.sysndx_counter += 1;
        self.sysndx_counter
    }

    pub fn enter_macro(&mut self, frame: MacroFrame) {
        self.macro_stack.push(MacroScope {
            scope: CodeScope::new(),
            frame,
        });
    }

    pub fn leave_macro(&mut self) {
        self.macro_stack.pop();
    }

    /// Decrement the innermost branch counter; `None` outside macros.
    pub fn decrement_branch_counter(&mut self) -> Option<i64> {
        let frame = self.current_frame_mut()?;
        frame.branch_counter -= 1;
        Some(frame.branch_counter)
    }

    // -- copy members ------------------------------------------------------

    pub fn add_copy_member(&mut self, member: CopyMember) -> Idx<CopyMember> {
        let name = member.name;
        let idx = self.copy_members.alloc(member);
        self.copy_index.insert(name, idx);
        idx
    }

    pub fn get_copy_member(&self, name: Id) -> Option<Idx<CopyMember>> {
        self.copy_index.get(&name).copied()
    }

    // -- sequence symbols --------------------------------------------------

    /// Offset of a macro-scoped sequence symbol of the innermost macro.
    pub fn macro_sequence_offset(&self, name: Id) -> Option<usize> {
        let frame = self.current_frame()?;
        self.macros[frame.def].sequence_symbols.get(&name).copied()
    }

    pub fn opencode_sequence(&self, name: Id) -> Option<&SequenceSymbol> {
        self.opencode_sequences.get(&name)
    }

    pub fn add_opencode_sequence(&mut self, symbol: SequenceSymbol) {
        self.opencode_sequences.entry(symbol.name).or_insert(symbol);
    }

    // -- opcode resolution -------------------------------------------------

    /// Resolve an instruction name: conditional assembly, then assembler,
    /// then macros, then machine instructions filtered by the active
    /// instruction set.
    pub fn find_opcode(&self, name: Id) -> Option<ResolvedOpcode> {
        let text = name.as_str();
        if let Some(ca) = CaOpCode::from_name(text) {
            return Some(ResolvedOpcode::Ca(ca));
        }
        if let Some(asm) = AsmOpCode::from_name(text) {
            return Some(ResolvedOpcode::Asm(asm));
        }
        if let Some(idx) = self.get_macro(name) {
            return Some(ResolvedOpcode::Macro(idx));
        }
        match resolve_static(name, self.options.instr_set) {
            Some(StaticOpcode::Mach(instr)) => Some(ResolvedOpcode::Mach(instr)),
            _ => None,
        }
    }
}
