//! The 6502/6510/65C02 opcode table and addressing-mode selection
//!
//! One static table maps `(mnemonic, addressing mode)` to the opcode
//! byte, instruction size, base cycle count and page-cross penalty.
//! The table covers every official opcode plus the commonly used
//! undocumented 6510 opcodes; alternate mnemonics (DCM for DCP, ASO for
//! SLO, ...) are folded onto their canonical spelling before lookup.
//! Lookup is case-insensitive.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    Implied,     // imp
    Accumulator, // a
    Immediate,   // imm
    ZeroPage,    // zp
    ZeroPageX,   // zpx
    ZeroPageY,   // zpy
    Absolute,    // abs
    AbsoluteX,   // abx
    AbsoluteY,   // aby
    Indirect,    // ind
    IndirectX,   // izx
    IndirectY,   // izy
    Relative,    // rel
}

impl AddrMode {
    /// Operand bytes following the opcode byte
    pub fn operand_bytes(self) -> u8 {
        match self {
            AddrMode::Implied | AddrMode::Accumulator => 0,
            AddrMode::Immediate
            | AddrMode::ZeroPage
            | AddrMode::ZeroPageX
            | AddrMode::ZeroPageY
            | AddrMode::IndirectX
            | AddrMode::IndirectY
            | AddrMode::Relative => 1,
            AddrMode::Absolute | AddrMode::AbsoluteX | AddrMode::AbsoluteY | AddrMode::Indirect => 2,
        }
    }

    /// Whole instruction size in bytes
    pub fn size(self) -> u8 {
        1 + self.operand_bytes()
    }
}

/// Which processor the source targets. Only opcode gating depends on
/// this: the 6510 accepts the undocumented opcodes, the others reject
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cpu {
    Mos6502,
    Mos6510,
    Mos65C02,
}

impl Cpu {
    pub fn parse(name: &str) -> Option<Cpu> {
        match name.to_lowercase().as_str() {
            "6502" => Some(Cpu::Mos6502),
            "6510" => Some(Cpu::Mos6510),
            "65c02" => Some(Cpu::Mos65C02),
            _ => None,
        }
    }

    pub fn accepts_illegal(self) -> bool {
        matches!(self, Cpu::Mos6510)
    }
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cpu::Mos6502 => write!(f, "6502"),
            Cpu::Mos6510 => write!(f, "6510"),
            Cpu::Mos65C02 => write!(f, "65c02"),
        }
    }
}

/// One resolved table entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpcodeInfo {
    pub opcode: u8,
    pub size: u8,
    pub cycles: u8,
    pub page_penalty: bool,
    pub illegal: bool,
}

// (mnemonic, mode, opcode, cycles, page-cross penalty, undocumented)
type Entry = (&'static str, AddrMode, u8, u8, bool, bool);

use self::AddrMode::{
    Absolute as Abs, AbsoluteX as Abx, AbsoluteY as Aby, Accumulator as Acc, Immediate as Imm,
    Implied as Imp, Indirect as Ind, IndirectX as Izx, IndirectY as Izy, Relative as Rel,
    ZeroPage as Zp, ZeroPageX as Zpx, ZeroPageY as Zpy,
};

#[rustfmt::skip]
const OPCODES: &[Entry] = &[
    // Logical and arithmetic
    ("ORA", Imm, 0x09, 2, false, false),
    ("ORA", Zp,  0x05, 3, false, false),
    ("ORA", Zpx, 0x15, 4, false, false),
    ("ORA", Abs, 0x0d, 4, false, false),
    ("ORA", Abx, 0x1d, 4, true,  false),
    ("ORA", Aby, 0x19, 4, true,  false),
    ("ORA", Izx, 0x01, 6, false, false),
    ("ORA", Izy, 0x11, 5, true,  false),
    ("AND", Imm, 0x29, 2, false, false),
    ("AND", Zp,  0x25, 3, false, false),
    ("AND", Zpx, 0x35, 4, false, false),
    ("AND", Abs, 0x2d, 4, false, false),
    ("AND", Abx, 0x3d, 4, true,  false),
    ("AND", Aby, 0x39, 4, true,  false),
    ("AND", Izx, 0x21, 6, false, false),
    ("AND", Izy, 0x31, 5, true,  false),
    ("EOR", Imm, 0x49, 2, false, false),
    ("EOR", Zp,  0x45, 3, false, false),
    ("EOR", Zpx, 0x55, 4, false, false),
    ("EOR", Abs, 0x4d, 4, false, false),
    ("EOR", Abx, 0x5d, 4, true,  false),
    ("EOR", Aby, 0x59, 4, true,  false),
    ("EOR", Izx, 0x41, 6, false, false),
    ("EOR", Izy, 0x51, 5, true,  false),
    ("ADC", Imm, 0x69, 2, false, false),
    ("ADC", Zp,  0x65, 3, false, false),
    ("ADC", Zpx, 0x75, 4, false, false),
    ("ADC", Abs, 0x6d, 4, false, false),
    ("ADC", Abx, 0x7d, 4, true,  false),
    ("ADC", Aby, 0x79, 4, true,  false),
    ("ADC", Izx, 0x61, 6, false, false),
    ("ADC", Izy, 0x71, 5, true,  false),
    ("SBC", Imm, 0xe9, 2, false, false),
    ("SBC", Zp,  0xe5, 3, false, false),
    ("SBC", Zpx, 0xf5, 4, false, false),
    ("SBC", Abs, 0xed, 4, false, false),
    ("SBC", Abx, 0xfd, 4, true,  false),
    ("SBC", Aby, 0xf9, 4, true,  false),
    ("SBC", Izx, 0xe1, 6, false, false),
    ("SBC", Izy, 0xf1, 5, true,  false),
    ("CMP", Imm, 0xc9, 2, false, false),
    ("CMP", Zp,  0xc5, 3, false, false),
    ("CMP", Zpx, 0xd5, 4, false, false),
    ("CMP", Abs, 0xcd, 4, false, false),
    ("CMP", Abx, 0xdd, 4, true,  false),
    ("CMP", Aby, 0xd9, 4, true,  false),
    ("CMP", Izx, 0xc1, 6, false, false),
    ("CMP", Izy, 0xd1, 5, true,  false),
    ("CPX", Imm, 0xe0, 2, false, false),
    ("CPX", Zp,  0xe4, 3, false, false),
    ("CPX", Abs, 0xec, 4, false, false),
    ("CPY", Imm, 0xc0, 2, false, false),
    ("CPY", Zp,  0xc4, 3, false, false),
    ("CPY", Abs, 0xcc, 4, false, false),
    ("DEC", Zp,  0xc6, 5, false, false),
    ("DEC", Zpx, 0xd6, 6, false, false),
    ("DEC", Abs, 0xce, 6, false, false),
    ("DEC", Abx, 0xde, 7, false, false),
    ("DEX", Imp, 0xca, 2, false, false),
    ("DEY", Imp, 0x88, 2, false, false),
    ("INC", Zp,  0xe6, 5, false, false),
    ("INC", Zpx, 0xf6, 6, false, false),
    ("INC", Abs, 0xee, 6, false, false),
    ("INC", Abx, 0xfe, 7, false, false),
    ("INX", Imp, 0xe8, 2, false, false),
    ("INY", Imp, 0xc8, 2, false, false),
    ("ASL", Acc, 0x0a, 2, false, false),
    ("ASL", Zp,  0x06, 5, false, false),
    ("ASL", Zpx, 0x16, 6, false, false),
    ("ASL", Abs, 0x0e, 6, false, false),
    ("ASL", Abx, 0x1e, 7, false, false),
    ("ROL", Acc, 0x2a, 2, false, false),
    ("ROL", Zp,  0x26, 5, false, false),
    ("ROL", Zpx, 0x36, 6, false, false),
    ("ROL", Abs, 0x2e, 6, false, false),
    ("ROL", Abx, 0x3e, 7, false, false),
    ("LSR", Acc, 0x4a, 2, false, false),
    ("LSR", Zp,  0x46, 5, false, false),
    ("LSR", Zpx, 0x56, 6, false, false),
    ("LSR", Abs, 0x4e, 6, false, false),
    ("LSR", Abx, 0x5e, 7, false, false),
    ("ROR", Acc, 0x6a, 2, false, false),
    ("ROR", Zp,  0x66, 5, false, false),
    ("ROR", Zpx, 0x76, 6, false, false),
    ("ROR", Abs, 0x6e, 6, false, false),
    ("ROR", Abx, 0x7e, 7, false, false),
    ("BIT", Zp,  0x24, 3, false, false),
    ("BIT", Abs, 0x2c, 4, false, false),
    // Moves
    ("LDA", Imm, 0xa9, 2, false, false),
    ("LDA", Zp,  0xa5, 3, false, false),
    ("LDA", Zpx, 0xb5, 4, false, false),
    ("LDA", Abs, 0xad, 4, false, false),
    ("LDA", Abx, 0xbd, 4, true,  false),
    ("LDA", Aby, 0xb9, 4, true,  false),
    ("LDA", Izx, 0xa1, 6, false, false),
    ("LDA", Izy, 0xb1, 5, true,  false),
    ("STA", Zp,  0x85, 3, false, false),
    ("STA", Zpx, 0x95, 4, false, false),
    ("STA", Abs, 0x8d, 4, false, false),
    ("STA", Abx, 0x9d, 5, false, false),
    ("STA", Aby, 0x99, 5, false, false),
    ("STA", Izx, 0x81, 6, false, false),
    ("STA", Izy, 0x91, 6, false, false),
    ("LDX", Imm, 0xa2, 2, false, false),
    ("LDX", Zp,  0xa6, 3, false, false),
    ("LDX", Zpy, 0xb6, 4, false, false),
    ("LDX", Abs, 0xae, 4, false, false),
    ("LDX", Aby, 0xbe, 4, true,  false),
    ("STX", Zp,  0x86, 3, false, false),
    ("STX", Zpy, 0x96, 4, false, false),
    ("STX", Abs, 0x8e, 4, false, false),
    ("LDY", Imm, 0xa0, 2, false, false),
    ("LDY", Zp,  0xa4, 3, false, false),
    ("LDY", Zpx, 0xb4, 4, false, false),
    ("LDY", Abs, 0xac, 4, false, false),
    ("LDY", Abx, 0xbc, 4, true,  false),
    ("STY", Zp,  0x84, 3, false, false),
    ("STY", Zpx, 0x94, 4, false, false),
    ("STY", Abs, 0x8c, 4, false, false),
    ("TAX", Imp, 0xaa, 2, false, false),
    ("TXA", Imp, 0x8a, 2, false, false),
    ("TAY", Imp, 0xa8, 2, false, false),
    ("TYA", Imp, 0x98, 2, false, false),
    ("TSX", Imp, 0xba, 2, false, false),
    ("TXS", Imp, 0x9a, 2, false, false),
    ("PLA", Imp, 0x68, 4, false, false),
    ("PHA", Imp, 0x48, 3, false, false),
    ("PLP", Imp, 0x28, 4, false, false),
    ("PHP", Imp, 0x08, 3, false, false),
    // Jumps, branches and flags
    ("BPL", Rel, 0x10, 2, true,  false),
    ("BMI", Rel, 0x30, 2, true,  false),
    ("BVC", Rel, 0x50, 2, true,  false),
    ("BVS", Rel, 0x70, 2, true,  false),
    ("BCC", Rel, 0x90, 2, true,  false),
    ("BCS", Rel, 0xb0, 2, true,  false),
    ("BNE", Rel, 0xd0, 2, true,  false),
    ("BEQ", Rel, 0xf0, 2, true,  false),
    ("BRK", Imp, 0x00, 7, false, false),
    ("RTI", Imp, 0x40, 6, false, false),
    ("JSR", Abs, 0x20, 6, false, false),
    ("RTS", Imp, 0x60, 6, false, false),
    ("JMP", Abs, 0x4c, 3, false, false),
    ("JMP", Ind, 0x6c, 5, false, false),
    ("CLC", Imp, 0x18, 2, false, false),
    ("SEC", Imp, 0x38, 2, false, false),
    ("CLD", Imp, 0xd8, 2, false, false),
    ("SED", Imp, 0xf8, 2, false, false),
    ("CLI", Imp, 0x58, 2, false, false),
    ("SEI", Imp, 0x78, 2, false, false),
    ("CLV", Imp, 0xb8, 2, false, false),
    ("NOP", Imp, 0xea, 2, false, false),
    // Undocumented 6510 opcodes
    ("SLO", Zp,  0x07, 5, false, true),
    ("SLO", Zpx, 0x17, 6, false, true),
    ("SLO", Abs, 0x0f, 6, false, true),
    ("SLO", Abx, 0x1f, 7, false, true),
    ("SLO", Aby, 0x1b, 7, false, true),
    ("SLO", Izx, 0x03, 8, false, true),
    ("SLO", Izy, 0x13, 8, false, true),
    ("RLA", Zp,  0x27, 5, false, true),
    ("RLA", Zpx, 0x37, 6, false, true),
    ("RLA", Abs, 0x2f, 6, false, true),
    ("RLA", Abx, 0x3f, 7, false, true),
    ("RLA", Aby, 0x3b, 7, false, true),
    ("RLA", Izx, 0x23, 8, false, true),
    ("RLA", Izy, 0x33, 8, false, true),
    ("SRE", Zp,  0x47, 5, false, true),
    ("SRE", Zpx, 0x57, 6, false, true),
    ("SRE", Abs, 0x4f, 6, false, true),
    ("SRE", Abx, 0x5f, 7, false, true),
    ("SRE", Aby, 0x5b, 7, false, true),
    ("SRE", Izx, 0x43, 8, false, true),
    ("SRE", Izy, 0x53, 8, false, true),
    ("RRA", Zp,  0x67, 5, false, true),
    ("RRA", Zpx, 0x77, 6, false, true),
    ("RRA", Abs, 0x6f, 6, false, true),
    ("RRA", Abx, 0x7f, 7, false, true),
    ("RRA", Aby, 0x7b, 7, false, true),
    ("RRA", Izx, 0x63, 8, false, true),
    ("RRA", Izy, 0x73, 8, false, true),
    ("SAX", Zp,  0x87, 3, false, true),
    ("SAX", Zpy, 0x97, 4, false, true),
    ("SAX", Abs, 0x8f, 4, false, true),
    ("SAX", Izx, 0x83, 6, false, true),
    ("LAX", Imm, 0xab, 2, false, true),
    ("LAX", Zp,  0xa7, 3, false, true),
    ("LAX", Zpy, 0xb7, 4, false, true),
    ("LAX", Abs, 0xaf, 4, false, true),
    ("LAX", Aby, 0xbf, 4, true,  true),
    ("LAX", Izx, 0xa3, 6, false, true),
    ("LAX", Izy, 0xb3, 5, true,  true),
    ("DCP", Zp,  0xc7, 5, false, true),
    ("DCP", Zpx, 0xd7, 6, false, true),
    ("DCP", Abs, 0xcf, 6, false, true),
    ("DCP", Abx, 0xdf, 7, false, true),
    ("DCP", Aby, 0xdb, 7, false, true),
    ("DCP", Izx, 0xc3, 8, false, true),
    ("DCP", Izy, 0xd3, 8, false, true),
    ("ISC", Zp,  0xe7, 5, false, true),
    ("ISC", Zpx, 0xf7, 6, false, true),
    ("ISC", Abs, 0xef, 6, false, true),
    ("ISC", Abx, 0xff, 7, false, true),
    ("ISC", Aby, 0xfb, 7, false, true),
    ("ISC", Izx, 0xe3, 8, false, true),
    ("ISC", Izy, 0xf3, 8, false, true),
    ("ANC", Imm, 0x0b, 2, false, true),
    ("ALR", Imm, 0x4b, 2, false, true),
    ("ARR", Imm, 0x6b, 2, false, true),
    ("XAA", Imm, 0x8b, 2, false, true),
    ("AXS", Imm, 0xcb, 2, false, true),
    ("AHX", Izy, 0x93, 6, false, true),
    ("AHX", Aby, 0x9f, 5, false, true),
    ("SHY", Abx, 0x9c, 5, false, true),
    ("SHX", Aby, 0x9e, 5, false, true),
    ("TAS", Aby, 0x9b, 5, false, true),
    ("LAS", Aby, 0xbb, 4, true,  true),
    ("KIL", Imp, 0x02, 1, false, true),
    ("NOP", Imm, 0x80, 2, false, true),
    ("NOP", Zp,  0x04, 3, false, true),
    ("NOP", Zpx, 0x14, 4, false, true),
    ("NOP", Abs, 0x0c, 4, false, true),
    ("NOP", Abx, 0x1c, 4, true,  true),
];

const BRANCHES: &[&str] = &["BCC", "BCS", "BEQ", "BMI", "BNE", "BPL", "BVC", "BVS"];

/// Fold alternate spellings of the undocumented opcodes onto the
/// canonical mnemonic the table uses.
fn canonical_mnemonic(name: &str) -> String {
    let upper = name.to_uppercase();
    match upper.as_str() {
        "DCM" => "DCP".to_string(),
        "ISB" | "INS" => "ISC".to_string(),
        "ASO" => "SLO".to_string(),
        "LSE" => "SRE".to_string(),
        "SHA" => "AHX".to_string(),
        "LAR" => "LAS".to_string(),
        "HLT" | "JAM" => "KIL".to_string(),
        _ => upper,
    }
}

/// Whether a name is any known mnemonic, documented or not
pub fn is_mnemonic(name: &str) -> bool {
    let canonical = canonical_mnemonic(name);
    OPCODES.iter().any(|entry| entry.0 == canonical)
}

/// Branch instructions always assemble to the relative mode
pub fn is_branch(name: &str) -> bool {
    let canonical = canonical_mnemonic(name);
    BRANCHES.contains(&canonical.as_str())
}

/// Look a `(mnemonic, mode)` pair up
pub fn opcode_for(name: &str, mode: AddrMode) -> Option<OpcodeInfo> {
    let canonical = canonical_mnemonic(name);
    OPCODES
        .iter()
        .find(|entry| entry.0 == canonical && entry.1 == mode)
        .map(|&(_, mode, opcode, cycles, page_penalty, illegal)| OpcodeInfo {
            opcode,
            size: mode.size(),
            cycles,
            page_penalty,
            illegal,
        })
}

/// Whether the mnemonic has an encoding in the given mode
pub fn has_mode(name: &str, mode: AddrMode) -> bool {
    opcode_for(name, mode).is_some()
}

/// The operand shape the statement parser extracted, before any value is
/// known
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OperandShape {
    pub immediate: bool,
    pub indirect: bool,
    pub index_x: bool,
    pub index_y: bool,
    pub has_operand: bool,
    pub accumulator: bool,
}

/// Choose the addressing mode for an operand shape. The zero-page forms
/// are only chosen when the operand value is already known to fit; an
/// unknown operand falls back to the absolute form, which pins the
/// instruction size for pass 2.
pub fn select_mode(name: &str, shape: OperandShape, value: i32, value_known: bool) -> AddrMode {
    if is_branch(name) {
        return AddrMode::Relative;
    }
    if shape.immediate {
        return AddrMode::Immediate;
    }
    if !shape.has_operand {
        if has_mode(name, AddrMode::Accumulator) {
            return AddrMode::Accumulator;
        }
        return AddrMode::Implied;
    }
    if shape.indirect {
        if shape.index_x {
            return AddrMode::IndirectX;
        }
        if shape.index_y {
            return AddrMode::IndirectY;
        }
        return AddrMode::Indirect;
    }
    let fits = value_known && (0..=0xff).contains(&value);
    if shape.index_x {
        if fits && has_mode(name, AddrMode::ZeroPageX) {
            return AddrMode::ZeroPageX;
        }
        return AddrMode::AbsoluteX;
    }
    if shape.index_y {
        if fits && has_mode(name, AddrMode::ZeroPageY) {
            return AddrMode::ZeroPageY;
        }
        return AddrMode::AbsoluteY;
    }
    if fits && has_mode(name, AddrMode::ZeroPage) {
        return AddrMode::ZeroPage;
    }
    AddrMode::Absolute
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_official_load_mode_matches_the_datasheet() {
        assert_eq!(opcode_for("lda", Imm).unwrap().opcode, 0xa9);
        assert_eq!(opcode_for("lda", Zp).unwrap().opcode, 0xa5);
        assert_eq!(opcode_for("lda", Abs).unwrap().opcode, 0xad);
        assert_eq!(opcode_for("LDA", Izy).unwrap().opcode, 0xb1);
        assert_eq!(opcode_for("jmp", Ind).unwrap().opcode, 0x6c);
        assert_eq!(opcode_for("jsr", Abs).unwrap().opcode, 0x20);
    }

    #[test]
    fn sizes_follow_the_mode() {
        assert_eq!(opcode_for("nop", Imp).unwrap().size, 1);
        assert_eq!(opcode_for("lda", Imm).unwrap().size, 2);
        assert_eq!(opcode_for("lda", Abs).unwrap().size, 3);
        assert_eq!(opcode_for("bne", Rel).unwrap().size, 2);
    }

    #[test]
    fn branches_cost_two_cycles_plus_page_penalty() {
        let info = opcode_for("beq", Rel).unwrap();
        assert_eq!(info.cycles, 2);
        assert!(info.page_penalty);
    }

    #[test]
    fn undocumented_aliases_fold_to_canonical() {
        assert_eq!(opcode_for("dcm", Zp), opcode_for("dcp", Zp));
        assert_eq!(opcode_for("aso", Abs), opcode_for("slo", Abs));
        assert_eq!(opcode_for("lse", Izx), opcode_for("sre", Izx));
        assert_eq!(opcode_for("isb", Aby), opcode_for("isc", Aby));
        assert_eq!(opcode_for("sha", Izy), opcode_for("ahx", Izy));
        assert_eq!(opcode_for("lar", Aby), opcode_for("las", Aby));
        assert_eq!(opcode_for("hlt", Imp), opcode_for("kil", Imp));
        assert_eq!(opcode_for("jam", Imp), opcode_for("kil", Imp));
    }

    #[test]
    fn undocumented_entries_are_flagged() {
        assert!(opcode_for("slo", Zp).unwrap().illegal);
        assert!(!opcode_for("lda", Zp).unwrap().illegal);
        // the official NOP is legal, the operand-taking ones are not
        assert!(!opcode_for("nop", Imp).unwrap().illegal);
        assert!(opcode_for("nop", Zp).unwrap().illegal);
    }

    #[test]
    fn cpu_parsing_and_gating() {
        assert_eq!(Cpu::parse("6502"), Some(Cpu::Mos6502));
        assert_eq!(Cpu::parse("65C02"), Some(Cpu::Mos65C02));
        assert_eq!(Cpu::parse("z80"), None);
        assert!(Cpu::Mos6510.accepts_illegal());
        assert!(!Cpu::Mos6502.accepts_illegal());
        assert!(!Cpu::Mos65C02.accepts_illegal());
    }

    #[test]
    fn branches_select_relative_mode() {
        let shape = OperandShape {
            has_operand: true,
            ..Default::default()
        };
        assert_eq!(select_mode("bne", shape, 0x1000, true), Rel);
    }

    #[test]
    fn small_known_values_select_zero_page() {
        let shape = OperandShape {
            has_operand: true,
            ..Default::default()
        };
        assert_eq!(select_mode("lda", shape, 0x42, true), Zp);
        assert_eq!(select_mode("lda", shape, 0x142, true), Abs);
        // unknown value pins absolute even if it later fits
        assert_eq!(select_mode("lda", shape, 0x42, false), Abs);
    }

    #[test]
    fn indexed_selection_honours_missing_zero_page_forms() {
        let x = OperandShape {
            has_operand: true,
            index_x: true,
            ..Default::default()
        };
        assert_eq!(select_mode("lda", x, 0x10, true), Zpx);
        let y = OperandShape {
            has_operand: true,
            index_y: true,
            ..Default::default()
        };
        // LDA has no zero-page-Y form
        assert_eq!(select_mode("lda", y, 0x10, true), Aby);
        assert_eq!(select_mode("ldx", y, 0x10, true), Zpy);
    }

    #[test]
    fn indirect_selection() {
        let plain = OperandShape {
            has_operand: true,
            indirect: true,
            ..Default::default()
        };
        assert_eq!(select_mode("jmp", plain, 0x1234, true), Ind);
        let izx = OperandShape {
            has_operand: true,
            indirect: true,
            index_x: true,
            ..Default::default()
        };
        assert_eq!(select_mode("and", izx, 0xaa, true), Izx);
        let izy = OperandShape {
            has_operand: true,
            indirect: true,
            index_y: true,
            ..Default::default()
        };
        assert_eq!(select_mode("and", izy, 0xbb, true), Izy);
    }

    #[test]
    fn bare_shift_mnemonics_select_accumulator() {
        let none = OperandShape::default();
        assert_eq!(select_mode("asl", none, 0, false), Acc);
        assert_eq!(select_mode("nop", none, 0, false), Imp);
    }

    #[test]
    fn no_duplicate_table_entries() {
        for (index, a) in OPCODES.iter().enumerate() {
            for b in &OPCODES[index + 1..] {
                assert!(
                    !(a.0 == b.0 && a.1 == b.1),
                    "duplicate entry {} {:?}",
                    a.0,
                    a.1
                );
            }
        }
    }
}
