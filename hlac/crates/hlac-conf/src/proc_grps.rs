//! Processor group configuration (`proc_grps.json`).

use serde::{Deserialize, Serialize};

use crate::asm_options::AssemblerOptions;
use crate::ConfigError;

/// One library entry of a processor group. The JSON accepts a plain
/// string (a path), a path object, a dataset object, or the Endevor
/// flavors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Library {
    Path {
        path: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        optional: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        macro_extensions: Vec<String>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        prefer_alternate_root: bool,
    },
    Dataset {
        dataset: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        optional: bool,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        profile: String,
    },
    Endevor {
        environment: String,
        stage: String,
        system: String,
        subsystem: String,
        #[serde(rename = "type")]
        type_: String,
        #[serde(default = "default_true")]
        use_map: bool,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        optional: bool,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        profile: String,
    },
    /// Shorthand: a plain workspace-relative path.
    Plain(String),
}

fn default_true() -> bool {
    true
}

/// Preprocessor options per recognized preprocessor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "UPPERCASE")]
pub enum PreprocessorEntry {
    Db2 {
        #[serde(default)]
        options: Db2Options,
    },
    Cics {
        #[serde(default)]
        options: Vec<String>,
    },
    Endevor {},
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Db2Options {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub conditional: bool,
}

/// Valid CICS preprocessor flags.
const CICS_FLAGS: &[&str] = &[
    "PROLOG", "NOPROLOG", "EPILOG", "NOEPILOG", "LEASM", "NOLEASM",
];

/// The `preprocessor` field: a bare name, one entry object, or a list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Preprocessor {
    Name(String),
    Entry(PreprocessorEntry),
    List(Vec<Preprocessor>),
}

impl Preprocessor {
    /// Validate names and option grammars.
    pub fn valid(&self) -> bool {
        match self {
            Preprocessor::Name(name) => {
                matches!(name.to_ascii_uppercase().as_str(), "DB2" | "CICS" | "ENDEVOR")
            }
            Preprocessor::Entry(PreprocessorEntry::Cics { options }) => options
                .iter()
                .all(|o| CICS_FLAGS.contains(&o.to_ascii_uppercase().as_str())),
            Preprocessor::Entry(_) => true,
            Preprocessor::List(list) => list.iter().all(Preprocessor::valid),
        }
    }
}

/// One processor group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessorGroup {
    pub name: String,
    #[serde(default)]
    pub libs: Vec<Library>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asm_options: Option<AssemblerOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessor: Option<Preprocessor>,
}

/// The `proc_grps.json` document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcGrps {
    pub pgroups: Vec<ProcessorGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub macro_extensions: Vec<String>,
}

impl ProcGrps {
    /// Parse and validate a `proc_grps.json` document.
    pub fn parse(text: &str) -> Result<ProcGrps, ConfigError> {
        let grps: ProcGrps = serde_json::from_str(text)?;
        for group in &grps.pgroups {
            if let Some(opts) = &group.asm_options {
                if !opts.valid() {
                    return Err(ConfigError::Invalid(format!(
                        "invalid asm_options in processor group '{}'",
                        group.name
                    )));
                }
            }
            if let Some(pre) = &group.preprocessor {
                if !pre.valid() {
                    return Err(ConfigError::Invalid(format!(
                        "invalid preprocessor in processor group '{}'",
                        group.name
                    )));
                }
            }
        }
        Ok(grps)
    }

    pub fn find(&self, name: &str) -> Option<&ProcessorGroup> {
        self.pgroups.iter().find(|g| g.name == name)
    }
}
