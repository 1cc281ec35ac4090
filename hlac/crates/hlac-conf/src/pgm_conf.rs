//! Program mapping configuration (`pgm_conf.json`).

use serde::{Deserialize, Serialize};

use crate::asm_options::AssemblerOptions;
use crate::ConfigError;

/// One program-to-processor-group mapping. The program name is a glob
/// pattern (`*` and `?` wildcards).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgramMapping {
    pub program: String,
    pub pgroup: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asm_options: Option<AssemblerOptions>,
}

/// The `pgm_conf.json` document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PgmConf {
    pub pgms: Vec<ProgramMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub always_recognize: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics_suppress_limit: Option<usize>,
}

impl PgmConf {
    /// Parse and validate a `pgm_conf.json` document.
    pub fn parse(text: &str) -> Result<PgmConf, ConfigError> {
        let conf: PgmConf = serde_json::from_str(text)?;
        for pgm in &conf.pgms {
            if let Some(opts) = &pgm.asm_options {
                if !opts.valid() {
                    return Err(ConfigError::Invalid(format!(
                        "invalid asm_options for program '{}'",
                        pgm.program
                    )));
                }
            }
        }
        Ok(conf)
    }

    /// Find the first mapping whose pattern matches `program`.
    pub fn find(&self, program: &str) -> Option<&ProgramMapping> {
        self.pgms
            .iter()
            .find(|m| wildcard_match(&m.program, program))
    }
}

/// Glob matching with `*` (any run) and `?` (any one character).
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    // Iterative matcher with star backtracking.
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("pgms/*", "pgms/deep/file.hlasm"));
        assert!(wildcard_match("file?.asm", "file1.asm"));
        assert!(!wildcard_match("file?.asm", "file12.asm"));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(!wildcard_match("a*b", "ac"));
        assert!(wildcard_match("exact", "exact"));
        assert!(!wildcard_match("exact", "exactly"));
    }

    #[test]
    fn test_parse_and_find() {
        let text = r#"{
            "pgms": [
                {"program": "source/main.hlasm", "pgroup": "MAIN"},
                {"program": "source/*", "pgroup": "REST",
                 "asm_options": {"SYSPARM": "LIB"}}
            ],
            "alwaysRecognize": ["*.mac"],
            "diagnosticsSuppressLimit": 15
        }"#;
        let conf = PgmConf::parse(text).unwrap();
        assert_eq!(conf.diagnostics_suppress_limit, Some(15));
        assert_eq!(conf.always_recognize, vec!["*.mac"]);

        assert_eq!(conf.find("source/main.hlasm").unwrap().pgroup, "MAIN");
        assert_eq!(conf.find("source/other.hlasm").unwrap().pgroup, "REST");
        assert!(conf.find("elsewhere/x").is_none());
    }

    #[test]
    fn test_invalid_asm_options_rejected() {
        let text = r#"{
            "pgms": [{"program":"*","pgroup":"G",
                "asm_options":{"SYSPARM":""}}]
        }"#;
        assert!(PgmConf::parse(text).is_ok());

        let bad = format!(
            r#"{{"pgms": [{{"program":"*","pgroup":"G",
                "asm_options":{{"SYSPARM":"{}"}}}}]}}"#,
            "Y".repeat(256)
        );
        assert!(matches!(PgmConf::parse(&bad), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_round_trip() {
        let text = r#"{
            "pgms": [{"program":"p/*","pgroup":"G"}],
            "alwaysRecognize": ["*.asmmac"]
        }"#;
        let conf = PgmConf::parse(text).unwrap();
        let emitted = serde_json::to_string(&conf).unwrap();
        assert_eq!(PgmConf::parse(&emitted).unwrap(), conf);
    }
}
