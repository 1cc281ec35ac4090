//! Assembler options.
//!
//! The JSON subset of HLASM invocation options, plus the MACHINE/OPTABLE
//! name tables mapping to instruction set versions. At most one of
//! MACHINE and OPTABLE may be given; SYSPARM is limited to 255
//! characters.

use serde::{Deserialize, Serialize};

use hlac_util::InstructionSetVersion::{self, *};

type InstrSetPair = (&'static str, InstructionSetVersion);

/// OPTABLE values, sorted by name.
pub const OPTABLE_EQUIVALENTS: &[InstrSetPair] = &[
    ("370", _370),
    ("DOS", Dos),
    ("ESA", Esa),
    ("UNI", Uni),
    ("XA", Xa),
    ("YOP", Yop),
    ("Z10", Z10),
    ("Z11", Z11),
    ("Z12", Z12),
    ("Z13", Z13),
    ("Z14", Z14),
    ("Z15", Z15),
    ("Z16", Z16),
    ("Z9", Z9),
    ("ZOP", Zop),
    ("ZS1", Zop),
    ("ZS2", Yop),
    ("ZS3", Z9),
    ("ZS4", Z10),
    ("ZS5", Z11),
    ("ZS6", Z12),
    ("ZS7", Z13),
    ("ZS8", Z14),
    ("ZS9", Z15),
    ("ZSA", Z16),
];

/// MACHINE values, sorted by name.
pub const MACHINE_EQUIVALENTS: &[InstrSetPair] = &[
    ("ARCH-0", Xa),
    ("ARCH-1", Esa),
    ("ARCH-10", Z12),
    ("ARCH-11", Z13),
    ("ARCH-12", Z14),
    ("ARCH-13", Z15),
    ("ARCH-14", Z16),
    ("ARCH-2", Esa),
    ("ARCH-3", Esa),
    ("ARCH-4", Esa),
    ("ARCH-5", Zop),
    ("ARCH-6", Yop),
    ("ARCH-7", Z9),
    ("ARCH-8", Z10),
    ("ARCH-9", Z11),
    ("S370", _370),
    ("S370ESA", Esa),
    ("S370XA", Xa),
    ("S390", Esa),
    ("S390E", Esa),
    ("Z10", Z10),
    ("Z11", Z11),
    ("Z114", Z11),
    ("Z12", Z12),
    ("Z13", Z13),
    ("Z14", Z14),
    ("Z15", Z15),
    ("Z16", Z16),
    ("Z196", Z11),
    ("Z800", Zop),
    ("Z890", Yop),
    ("Z9", Z9),
    ("Z900", Zop),
    ("Z990", Yop),
    ("ZBC12", Z12),
    ("ZEC12", Z12),
    ("ZS", Zop),
    ("ZS-1", Zop),
    ("ZS-10", Z16),
    ("ZS-2", Yop),
    ("ZS-3", Z9),
    ("ZS-4", Z10),
    ("ZS-5", Z11),
    ("ZS-6", Z12),
    ("ZS-7", Z13),
    ("ZS-8", Z14),
    ("ZS-9", Z15),
    ("ZSERIES", Zop),
    ("ZSERIES-1", Zop),
    ("ZSERIES-10", Z16),
    ("ZSERIES-2", Yop),
    ("ZSERIES-3", Z9),
    ("ZSERIES-4", Z10),
    ("ZSERIES-5", Z11),
    ("ZSERIES-6", Z12),
    ("ZSERIES-7", Z13),
    ("ZSERIES-8", Z14),
    ("ZSERIES-9", Z15),
];

fn find_in(table: &[InstrSetPair], name: &str) -> Option<InstructionSetVersion> {
    let upper = name.to_ascii_uppercase();
    table
        .binary_search_by(|(n, _)| (*n).cmp(upper.as_str()))
        .ok()
        .map(|i| table[i].1)
}

/// Translate a MACHINE option value.
pub fn find_machine_instruction_set(name: &str) -> Option<InstructionSetVersion> {
    find_in(MACHINE_EQUIVALENTS, name)
}

/// Translate an OPTABLE option value.
pub fn find_optable_instruction_set(name: &str) -> Option<InstructionSetVersion> {
    find_in(OPTABLE_EQUIVALENTS, name)
}

/// The assembler options JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct AssemblerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sysparm: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optable: Option<String>,

    /// GOFF object format; XOBJECT is a synonym.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "XOBJECT")]
    pub goff: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rent: Option<bool>,
}

impl AssemblerOptions {
    /// Check the documented constraints: SYSPARM length, exactly one of
    /// MACHINE and OPTABLE, and recognized names in either.
    pub fn valid(&self) -> bool {
        if self.sysparm.as_ref().is_some_and(|s| s.len() >= 256) {
            return false;
        }
        if self.machine.is_some() && self.optable.is_some() {
            return false;
        }
        if let Some(machine) = &self.machine {
            if !machine.is_empty() && find_machine_instruction_set(machine).is_none() {
                return false;
            }
        }
        if let Some(optable) = &self.optable {
            if !optable.is_empty() && find_optable_instruction_set(optable).is_none() {
                return false;
            }
        }
        true
    }

    /// The instruction set selected by MACHINE/OPTABLE, when any.
    pub fn instruction_set(&self) -> Option<InstructionSetVersion> {
        if let Some(machine) = &self.machine {
            return find_machine_instruction_set(machine);
        }
        if let Some(optable) = &self.optable {
            return find_optable_instruction_set(optable);
        }
        None
    }

    /// Overlay `other` on top of these options.
    pub fn merge(&mut self, other: &AssemblerOptions) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            };
        }
        take!(sysparm);
        take!(profile);
        take!(system_id);
        take!(machine);
        take!(optable);
        take!(goff);
        take!(rent);
    }
}

/// Validate one `*PROCESS` option. Recognized: the flag options, and the
/// parameterized `SYSPARM(..)`, `PROFILE(..)`, `MACHINE(..)`,
/// `OPTABLE(..)`.
pub fn validate_process_option(option: &str) -> bool {
    let upper = option.to_ascii_uppercase();
    match upper.as_str() {
        "GOFF" | "NOGOFF" | "XOBJECT" | "NOXOBJECT" | "RENT" | "NORENT" => return true,
        _ => {}
    }
    let Some(open) = upper.find('(') else {
        return false;
    };
    if !upper.ends_with(')') {
        return false;
    }
    let keyword = &upper[..open];
    let value = &upper[open + 1..upper.len() - 1];
    match keyword {
        "SYSPARM" | "PROFILE" => true,
        "MACHINE" => find_machine_instruction_set(value).is_some(),
        "OPTABLE" => find_optable_instruction_set(value).is_some(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_sorted() {
        for table in [MACHINE_EQUIVALENTS, OPTABLE_EQUIVALENTS] {
            for w in table.windows(2) {
                assert!(w[0].0 < w[1].0, "{} >= {}", w[0].0, w[1].0);
            }
        }
    }

    #[test]
    fn test_machine_lookup() {
        assert_eq!(find_machine_instruction_set("S370"), Some(_370));
        assert_eq!(find_machine_instruction_set("zseries-10"), Some(Z16));
        assert_eq!(find_machine_instruction_set("ARCH-8"), Some(Z10));
        assert_eq!(find_machine_instruction_set("BOGUS"), None);
    }

    #[test]
    fn test_optable_lookup() {
        assert_eq!(find_optable_instruction_set("UNI"), Some(Uni));
        assert_eq!(find_optable_instruction_set("ZSA"), Some(Z16));
        assert_eq!(find_optable_instruction_set("S370"), None);
    }

    #[test]
    fn test_validity_rules() {
        let mut opts = AssemblerOptions::default();
        assert!(opts.valid());

        opts.sysparm = Some("X".repeat(255));
        assert!(opts.valid());
        opts.sysparm = Some("X".repeat(256));
        assert!(!opts.valid());
        opts.sysparm = None;

        opts.machine = Some("S390".to_owned());
        assert!(opts.valid());
        opts.optable = Some("UNI".to_owned());
        assert!(!opts.valid()); // both present
        opts.machine = None;
        assert!(opts.valid());

        opts.optable = Some("NOPE".to_owned());
        assert!(!opts.valid());
    }

    #[test]
    fn test_json_round_trip() {
        let opts: AssemblerOptions = serde_json::from_str(
            r#"{"SYSPARM":"DEBUG","MACHINE":"zSeries-6","GOFF":true}"#,
        )
        .unwrap();
        assert_eq!(opts.sysparm.as_deref(), Some("DEBUG"));
        assert_eq!(opts.instruction_set(), Some(Z12));
        assert_eq!(opts.goff, Some(true));

        let emitted = serde_json::to_string(&opts).unwrap();
        let reread: AssemblerOptions = serde_json::from_str(&emitted).unwrap();
        assert_eq!(opts, reread);
    }

    #[test]
    fn test_xobject_synonym() {
        let opts: AssemblerOptions = serde_json::from_str(r#"{"XOBJECT":true}"#).unwrap();
        assert_eq!(opts.goff, Some(true));
    }

    #[test]
    fn test_merge() {
        let mut base: AssemblerOptions =
            serde_json::from_str(r#"{"SYSPARM":"A","RENT":false}"#).unwrap();
        let overlay: AssemblerOptions = serde_json::from_str(r#"{"SYSPARM":"B"}"#).unwrap();
        base.merge(&overlay);
        assert_eq!(base.sysparm.as_deref(), Some("B"));
        assert_eq!(base.rent, Some(false));
    }

    #[test]
    fn test_process_option_validation() {
        assert!(validate_process_option("RENT"));
        assert!(validate_process_option("NOGOFF"));
        assert!(validate_process_option("SYSPARM(ABC)"));
        assert!(validate_process_option("MACHINE(ZSERIES-4)"));
        assert!(!validate_process_option("MACHINE(WHAT)"));
        assert!(!validate_process_option("FLUFF"));
        assert!(!validate_process_option("OPTABLE(UNI"));
    }
}
