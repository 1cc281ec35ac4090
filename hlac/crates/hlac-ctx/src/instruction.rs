//! Static instruction tables.
//!
//! All tables are immutable static data keyed by uppercased mnemonic.
//! Machine instructions carry an availability bitmask over instruction
//! set versions; availability is a single AND against the active set.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use hlac_util::instr_set::{since, ALL_VERSIONS};
use hlac_util::InstructionSetVersion::{self, Esa, Yop, Z10, Z11, Z9, Zop};
use hlac_util::Id;

use hlac_par::form::ProcessingForm;

/// Conditional-assembly operation codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaOpCode {
    Ago,
    Aif,
    Anop,
    Actr,
    Seta,
    Setb,
    Setc,
    Lcla,
    Lclb,
    Lclc,
    Gbla,
    Gblb,
    Gblc,
    Mnote,
    Mexit,
    Mend,
    Macro,
    Aread,
}

impl CaOpCode {
    pub fn from_name(name: &str) -> Option<CaOpCode> {
        Some(match name {
            "AGO" => CaOpCode::Ago,
            "AIF" => CaOpCode::Aif,
            "ANOP" => CaOpCode::Anop,
            "ACTR" => CaOpCode::Actr,
            "SETA" => CaOpCode::Seta,
            "SETB" => CaOpCode::Setb,
            "SETC" => CaOpCode::Setc,
            "LCLA" => CaOpCode::Lcla,
            "LCLB" => CaOpCode::Lclb,
            "LCLC" => CaOpCode::Lclc,
            "GBLA" => CaOpCode::Gbla,
            "GBLB" => CaOpCode::Gblb,
            "GBLC" => CaOpCode::Gblc,
            "MNOTE" => CaOpCode::Mnote,
            "MEXIT" => CaOpCode::Mexit,
            "MEND" => CaOpCode::Mend,
            "MACRO" => CaOpCode::Macro,
            "AREAD" => CaOpCode::Aread,
            _ => return None,
        })
    }

    /// Whether the instruction takes an operand field.
    pub fn has_operands(self) -> bool {
        !matches!(
            self,
            CaOpCode::Anop | CaOpCode::Mexit | CaOpCode::Mend | CaOpCode::Macro
        )
    }
}

/// Assembler operation codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsmOpCode {
    Csect,
    Dsect,
    Start,
    Equ,
    Using,
    Drop,
    Copy,
    End,
    Dc,
    Ds,
    Dxd,
    Org,
    Ltorg,
    Ictl,
    Ainsert,
    Alias,
    Amode,
    Rmode,
    Entry,
    Extrn,
    Wxtrn,
    Title,
    Print,
    Space,
    Eject,
    Push,
    Pop,
}

impl AsmOpCode {
    pub fn from_name(name: &str) -> Option<AsmOpCode> {
        Some(match name {
            "CSECT" => AsmOpCode::Csect,
            "DSECT" => AsmOpCode::Dsect,
            "START" => AsmOpCode::Start,
            "EQU" => AsmOpCode::Equ,
            "USING" => AsmOpCode::Using,
            "DROP" => AsmOpCode::Drop,
            "COPY" => AsmOpCode::Copy,
            "END" => AsmOpCode::End,
            "DC" => AsmOpCode::Dc,
            "DS" => AsmOpCode::Ds,
            "DXD" => AsmOpCode::Dxd,
            "ORG" => AsmOpCode::Org,
            "LTORG" => AsmOpCode::Ltorg,
            "ICTL" => AsmOpCode::Ictl,
            "AINSERT" => AsmOpCode::Ainsert,
            "ALIAS" => AsmOpCode::Alias,
            "AMODE" => AsmOpCode::Amode,
            "RMODE" => AsmOpCode::Rmode,
            "ENTRY" => AsmOpCode::Entry,
            "EXTRN" => AsmOpCode::Extrn,
            "WXTRN" => AsmOpCode::Wxtrn,
            "TITLE" => AsmOpCode::Title,
            "PRINT" => AsmOpCode::Print,
            "SPACE" => AsmOpCode::Space,
            "EJECT" => AsmOpCode::Eject,
            "PUSH" => AsmOpCode::Push,
            "POP" => AsmOpCode::Pop,
        _ => return None,
        })
    }

    /// Operand grammar of the statement.
    pub fn form(self) -> ProcessingForm {
        match self {
            AsmOpCode::Alias => ProcessingForm::AsmAlias,
            AsmOpCode::End => ProcessingForm::AsmEnd,
            AsmOpCode::Using => ProcessingForm::AsmUsing,
            AsmOpCode::Dc | AsmOpCode::Ds | AsmOpCode::Dxd => ProcessingForm::Dat,
            AsmOpCode::Title | AsmOpCode::Print | AsmOpCode::Space | AsmOpCode::Eject => {
                ProcessingForm::Ignored
            }
            _ => ProcessingForm::AsmGeneric,
        }
    }
}

/// One machine instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineInstruction {
    pub name: &'static str,
    pub min_operands: u8,
    pub max_operands: u8,
    /// Instruction length in bytes, for location counter accounting.
    pub length: u8,
    /// Union of instruction-set-version masks the mnemonic exists on.
    pub availability: u16,
}

impl MachineInstruction {
    pub fn available_on(&self, version: InstructionSetVersion) -> bool {
        version.supported_by(self.availability)
    }
}

macro_rules! instr {
    ($name:literal, $min:literal, $max:literal, $len:literal, $avail:expr) => {
        MachineInstruction {
            name: $name,
            min_operands: $min,
            max_operands: $max,
            length: $len,
            availability: $avail,
        }
    };
}

/// Machine instruction table. A representative subset of the full
/// architecture: the classic 370 base, common extended branch mnemonics,
/// and 64-bit/z-series additions that exercise the availability filter.
pub static MACHINE_INSTRUCTIONS: &[MachineInstruction] = &[
    instr!("A", 2, 2, 4, ALL),
    instr!("AGR", 2, 2, 4, since_const(Zop)),
    instr!("AH", 2, 2, 4, ALL),
    instr!("AHI", 2, 2, 4, since_const(Esa)),
    instr!("AL", 2, 2, 4, ALL),
    instr!("ALR", 2, 2, 2, ALL),
    instr!("AR", 2, 2, 2, ALL),
    instr!("B", 1, 1, 4, ALL),
    instr!("BAL", 2, 2, 4, ALL),
    instr!("BALR", 2, 2, 2, ALL),
    instr!("BAS", 2, 2, 4, ALL),
    instr!("BASR", 2, 2, 2, ALL),
    instr!("BC", 2, 2, 4, ALL),
    instr!("BCR", 2, 2, 2, ALL),
    instr!("BCT", 2, 2, 4, ALL),
    instr!("BCTR", 2, 2, 2, ALL),
    instr!("BE", 1, 1, 4, ALL),
    instr!("BH", 1, 1, 4, ALL),
    instr!("BL", 1, 1, 4, ALL),
    instr!("BNE", 1, 1, 4, ALL),
    instr!("BNH", 1, 1, 4, ALL),
    instr!("BNL", 1, 1, 4, ALL),
    instr!("BNZ", 1, 1, 4, ALL),
    instr!("BR", 1, 1, 2, ALL),
    instr!("BXH", 3, 3, 4, ALL),
    instr!("BXLE", 3, 3, 4, ALL),
    instr!("BZ", 1, 1, 4, ALL),
    instr!("C", 2, 2, 4, ALL),
    instr!("CH", 2, 2, 4, ALL),
    instr!("CL", 2, 2, 4, ALL),
    instr!("CLC", 2, 2, 6, ALL),
    instr!("CLI", 2, 2, 4, ALL),
    instr!("CLR", 2, 2, 2, ALL),
    instr!("CR", 2, 2, 2, ALL),
    instr!("CVB", 2, 2, 4, ALL),
    instr!("CVD", 2, 2, 4, ALL),
    instr!("D", 2, 2, 4, ALL),
    instr!("DR", 2, 2, 2, ALL),
    instr!("EX", 2, 2, 4, ALL),
    instr!("IC", 2, 2, 4, ALL),
    instr!("L", 2, 2, 4, ALL),
    instr!("LA", 2, 2, 4, ALL),
    instr!("LG", 2, 2, 6, since_const(Zop)),
    instr!("LGF", 2, 2, 6, since_const(Zop)),
    instr!("LGR", 2, 2, 4, since_const(Zop)),
    instr!("LH", 2, 2, 4, ALL),
    instr!("LM", 3, 3, 4, ALL),
    instr!("LMG", 3, 3, 6, since_const(Zop)),
    instr!("LNR", 2, 2, 2, ALL),
    instr!("LPR", 2, 2, 2, ALL),
    instr!("LR", 2, 2, 2, ALL),
    instr!("LT", 2, 2, 6, since_const(Z9)),
    instr!("LTG", 2, 2, 6, since_const(Z9)),
    instr!("LTR", 2, 2, 2, ALL),
    instr!("M", 2, 2, 4, ALL),
    instr!("MR", 2, 2, 2, ALL),
    instr!("MVC", 2, 2, 6, ALL),
    instr!("MVCL", 2, 2, 2, ALL),
    instr!("MVI", 2, 2, 4, ALL),
    instr!("N", 2, 2, 4, ALL),
    instr!("NC", 2, 2, 6, ALL),
    instr!("NI", 2, 2, 4, ALL),
    instr!("NOP", 1, 1, 4, ALL),
    instr!("NOPR", 1, 1, 2, ALL),
    instr!("NR", 2, 2, 2, ALL),
    instr!("O", 2, 2, 4, ALL),
    instr!("OC", 2, 2, 6, ALL),
    instr!("OI", 2, 2, 4, ALL),
    instr!("OR", 2, 2, 2, ALL),
    instr!("PACK", 2, 2, 6, ALL),
    instr!("RISBG", 4, 5, 6, since_const(Z10)),
    instr!("S", 2, 2, 4, ALL),
    instr!("SGR", 2, 2, 4, since_const(Zop)),
    instr!("SH", 2, 2, 4, ALL),
    instr!("SL", 2, 2, 4, ALL),
    instr!("SLA", 2, 2, 4, ALL),
    instr!("SLL", 2, 2, 4, ALL),
    instr!("SLR", 2, 2, 2, ALL),
    instr!("SR", 2, 2, 2, ALL),
    instr!("SRA", 2, 2, 4, ALL),
    instr!("SRL", 2, 2, 4, ALL),
    instr!("ST", 2, 2, 4, ALL),
    instr!("STC", 2, 2, 4, ALL),
    instr!("STG", 2, 2, 6, since_const(Zop)),
    instr!("STH", 2, 2, 4, ALL),
    instr!("STM", 3, 3, 4, ALL),
    instr!("STMG", 3, 3, 6, since_const(Zop)),
    instr!("SVC", 1, 1, 2, ALL),
    instr!("TM", 2, 2, 4, ALL),
    instr!("TR", 2, 2, 6, ALL),
    instr!("TRT", 2, 2, 6, ALL),
    instr!("UNPK", 2, 2, 6, ALL),
    instr!("X", 2, 2, 4, ALL),
    instr!("XC", 2, 2, 6, ALL),
    instr!("XGR", 2, 2, 4, since_const(Zop)),
    instr!("XI", 2, 2, 4, ALL),
    instr!("XR", 2, 2, 2, ALL),
    instr!("LOCR", 3, 3, 4, since_const(Z11)),
    instr!("LOCGR", 3, 3, 4, since_const(Z11)),
    instr!("STOC", 3, 3, 6, since_const(Z11)),
    instr!("AGHIK", 3, 3, 6, since_const(Z11)),
    instr!("MSGR", 2, 2, 4, since_const(Zop)),
    instr!("MSR", 2, 2, 4, since_const(Esa)),
    instr!("DLR", 2, 2, 4, since_const(Yop)),
];

const ALL: u16 = ALL_VERSIONS;

const fn since_const(v: InstructionSetVersion) -> u16 {
    since(v)
}

static MACHINE_INDEX: LazyLock<FxHashMap<&'static str, &'static MachineInstruction>> =
    LazyLock::new(|| {
        MACHINE_INSTRUCTIONS
            .iter()
            .map(|instr| (instr.name, instr))
            .collect()
    });

/// Look up a machine instruction by mnemonic.
pub fn machine_instruction(name: &str) -> Option<&'static MachineInstruction> {
    MACHINE_INDEX.get(name).copied()
}

/// Resolution of an instruction name against the static tables; macros
/// are resolved separately (they live in the analysis context).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaticOpcode {
    Ca(CaOpCode),
    Asm(AsmOpCode),
    Mach(&'static MachineInstruction),
}

/// Resolve against the CA, assembler, and machine tables, in that order.
/// Machine instructions not present on `version` resolve to `None`.
pub fn resolve_static(name: Id, version: InstructionSetVersion) -> Option<StaticOpcode> {
    let text = name.as_str();
    if let Some(ca) = CaOpCode::from_name(text) {
        return Some(StaticOpcode::Ca(ca));
    }
    if let Some(asm) = AsmOpCode::from_name(text) {
        return Some(StaticOpcode::Asm(asm));
    }
    if let Some(instr) = machine_instruction(text) {
        if instr.available_on(version) {
            return Some(StaticOpcode::Mach(instr));
        }
    }
    None
}
