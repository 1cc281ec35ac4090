//! hlac-conf - Configuration Files
//!
//! Processor-group and program-mapping configuration, plus the assembler
//! options grammar shared by the configuration files and the source-level
//! `*PROCESS` statement.
//!
//! All files are JSON; parsing errors are reported as [`ConfigError`] at
//! the configuration boundary and never reach the analysis pipeline.

pub mod asm_options;
pub mod pgm_conf;
pub mod proc_grps;

use thiserror::Error;

pub use asm_options::{
    find_machine_instruction_set, find_optable_instruction_set, validate_process_option,
    AssemblerOptions,
};
pub use pgm_conf::{PgmConf, ProgramMapping};
pub use proc_grps::{Library, Preprocessor, ProcGrps, ProcessorGroup};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file is not valid JSON or does not match the schema.
    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The file parsed but violates a documented constraint.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The file could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
}
