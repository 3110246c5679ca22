//! Machine instructions.
//!
//! A [`SimInstr`] is one 16-bit LC-3 word, split into its fields.
//! It is produced by the assembler (and then [`SimInstr::encode`]d)
//! and by the simulator (which [`SimInstr::decode`]s the word at the PC).

use super::{CondCode, IOffset, ImmOrReg, Reg, TrapVect8};
use super::reg_consts::R7;

/// A machine instruction, with one variant per opcode.
///
/// Every word decodes into some `SimInstr`, so there is no decoding failure.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimInstr {
    /// `0000 nzp PCoffset9`
    BR(CondCode, IOffset<9>),
    /// `0001 DR SR1 0 00 SR2` or `0001 DR SR1 1 imm5`
    ADD(Reg, Reg, ImmOrReg<5>),
    /// `0010 DR PCoffset9`
    LD(Reg, IOffset<9>),
    /// `0011 SR PCoffset9`
    ST(Reg, IOffset<9>),
    /// `0100 1 PCoffset11` or `0100 0 00 BaseR 000000`
    JSR(ImmOrReg<11>),
    /// `0101 DR SR1 0 00 SR2` or `0101 DR SR1 1 imm5`
    AND(Reg, Reg, ImmOrReg<5>),
    /// `0110 DR BaseR offset6`
    LDR(Reg, Reg, IOffset<6>),
    /// `0111 SR BaseR offset6`
    STR(Reg, Reg, IOffset<6>),
    /// `1000 000000000000`
    RTI,
    /// `1001 DR SR 111111`
    NOT(Reg, Reg),
    /// `1010 DR PCoffset9`
    LDI(Reg, IOffset<9>),
    /// `1011 SR PCoffset9`
    STI(Reg, IOffset<9>),
    /// `1100 000 BaseR 000000`
    JMP(Reg),
    /// `1101`, the reserved opcode (with its operand bits).
    Reserved(u16),
    /// `1110 DR PCoffset9`
    LEA(Reg, IOffset<9>),
    /// `1111 0000 trapvect8`
    TRAP(TrapVect8),
}

impl SimInstr {
    /// `RET`, which is `JMP R7`.
    pub const RET: SimInstr = SimInstr::JMP(R7);

    /// Gets the opcode of this instruction.
    pub fn opcode(&self) -> u16 {
        match self {
            SimInstr::BR(_, _)     => 0b0000,
            SimInstr::ADD(_, _, _) => 0b0001,
            SimInstr::LD(_, _)     => 0b0010,
            SimInstr::ST(_, _)     => 0b0011,
            SimInstr::JSR(_)       => 0b0100,
            SimInstr::AND(_, _, _) => 0b0101,
            SimInstr::LDR(_, _, _) => 0b0110,
            SimInstr::STR(_, _, _) => 0b0111,
            SimInstr::RTI          => 0b1000,
            SimInstr::NOT(_, _)    => 0b1001,
            SimInstr::LDI(_, _)    => 0b1010,
            SimInstr::STI(_, _)    => 0b1011,
            SimInstr::JMP(_)       => 0b1100,
            SimInstr::Reserved(_)  => 0b1101,
            SimInstr::LEA(_, _)    => 0b1110,
            SimInstr::TRAP(_)      => 0b1111,
        }
    }

    /// Encodes this instruction into a word.
    ///
    /// ```
    /// use lc3_twopass::ast::{IOffset, ImmOrReg};
    /// use lc3_twopass::ast::reg_consts::{R0, R1};
    /// use lc3_twopass::ast::sim::SimInstr;
    ///
    /// let add = SimInstr::ADD(R1, R0, ImmOrReg::Imm(IOffset::new(-1).unwrap()));
    /// assert_eq!(add.encode(), 0x123F);
    /// assert_eq!(SimInstr::RET.encode(), 0xC1C0);
    /// ```
    pub fn encode(&self) -> u16 {
        let op = self.opcode() << 12;
        let r = |reg: Reg, lo: u32| u16::from(reg) << lo;
        let ior = |ior: ImmOrReg<5>| match ior {
            ImmOrReg::Imm(imm) => (1 << 5) | imm.bits(),
            ImmOrReg::Reg(sr2) => r(sr2, 0),
        };

        let operands = match *self {
            SimInstr::BR(cc, off)        => (u16::from(cc & 0b111) << 9) | off.bits(),
            SimInstr::ADD(dr, sr1, sr2)  => r(dr, 9) | r(sr1, 6) | ior(sr2),
            SimInstr::LD(dr, off)        => r(dr, 9) | off.bits(),
            SimInstr::ST(sr, off)        => r(sr, 9) | off.bits(),
            SimInstr::JSR(ImmOrReg::Imm(off))  => (1 << 11) | off.bits(),
            SimInstr::JSR(ImmOrReg::Reg(br))   => r(br, 6),
            SimInstr::AND(dr, sr1, sr2)  => r(dr, 9) | r(sr1, 6) | ior(sr2),
            SimInstr::LDR(dr, br, off)   => r(dr, 9) | r(br, 6) | off.bits(),
            SimInstr::STR(sr, br, off)   => r(sr, 9) | r(br, 6) | off.bits(),
            SimInstr::RTI                => 0,
            SimInstr::NOT(dr, sr)        => r(dr, 9) | r(sr, 6) | 0b111111,
            SimInstr::LDI(dr, off)       => r(dr, 9) | off.bits(),
            SimInstr::STI(sr, off)       => r(sr, 9) | off.bits(),
            SimInstr::JMP(br)            => r(br, 6),
            SimInstr::Reserved(bits)     => bits & 0x0FFF,
            SimInstr::LEA(dr, off)       => r(dr, 9) | off.bits(),
            SimInstr::TRAP(vect)         => vect.bits(),
        };

        op | operands
    }

    /// Decodes a word into an instruction.
    ///
    /// Bits that a given opcode leaves unused are ignored.
    ///
    /// ```
    /// use lc3_twopass::ast::sim::SimInstr;
    ///
    /// assert_eq!(SimInstr::decode(0xC1C0), SimInstr::RET);
    /// assert_eq!(SimInstr::decode(0x102F).encode(), 0x102F);
    /// ```
    pub fn decode(word: u16) -> Self {
        let dr = Reg::from_bits(word, 9);
        let sr1 = Reg::from_bits(word, 6);
        let imm5 = || match word & (1 << 5) != 0 {
            true  => ImmOrReg::Imm(IOffset::new_trunc(word)),
            false => ImmOrReg::Reg(Reg::from_bits(word, 0)),
        };

        match word >> 12 {
            0b0000 => SimInstr::BR(((word >> 9) & 0b111) as CondCode, IOffset::new_trunc(word)),
            0b0001 => SimInstr::ADD(dr, sr1, imm5()),
            0b0010 => SimInstr::LD(dr, IOffset::new_trunc(word)),
            0b0011 => SimInstr::ST(dr, IOffset::new_trunc(word)),
            0b0100 => match word & (1 << 11) != 0 {
                true  => SimInstr::JSR(ImmOrReg::Imm(IOffset::new_trunc(word))),
                false => SimInstr::JSR(ImmOrReg::Reg(sr1)),
            },
            0b0101 => SimInstr::AND(dr, sr1, imm5()),
            0b0110 => SimInstr::LDR(dr, sr1, IOffset::new_trunc(word)),
            0b0111 => SimInstr::STR(dr, sr1, IOffset::new_trunc(word)),
            0b1000 => SimInstr::RTI,
            0b1001 => SimInstr::NOT(dr, sr1),
            0b1010 => SimInstr::LDI(dr, IOffset::new_trunc(word)),
            0b1011 => SimInstr::STI(dr, IOffset::new_trunc(word)),
            0b1100 => SimInstr::JMP(sr1),
            0b1101 => SimInstr::Reserved(word & 0x0FFF),
            0b1110 => SimInstr::LEA(dr, IOffset::new_trunc(word)),
            _      => SimInstr::TRAP(IOffset::new_trunc(word)),
        }
    }
}

impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimInstr::BR(cc, off) => {
                f.write_str("BR")?;
                if cc & 0b100 != 0 { f.write_str("n")?; }
                if cc & 0b010 != 0 { f.write_str("z")?; }
                if cc & 0b001 != 0 { f.write_str("p")?; }
                write!(f, " {off}")
            },
            SimInstr::ADD(dr, sr1, sr2) => write!(f, "ADD {dr}, {sr1}, {sr2}"),
            SimInstr::LD(dr, off)       => write!(f, "LD {dr}, {off}"),
            SimInstr::ST(sr, off)       => write!(f, "ST {sr}, {off}"),
            SimInstr::JSR(ImmOrReg::Imm(off)) => write!(f, "JSR {off}"),
            SimInstr::JSR(ImmOrReg::Reg(br))  => write!(f, "JSRR {br}"),
            SimInstr::AND(dr, sr1, sr2) => write!(f, "AND {dr}, {sr1}, {sr2}"),
            SimInstr::LDR(dr, br, off)  => write!(f, "LDR {dr}, {br}, {off}"),
            SimInstr::STR(sr, br, off)  => write!(f, "STR {sr}, {br}, {off}"),
            SimInstr::RTI               => f.write_str("RTI"),
            SimInstr::NOT(dr, sr)       => write!(f, "NOT {dr}, {sr}"),
            SimInstr::LDI(dr, off)      => write!(f, "LDI {dr}, {off}"),
            SimInstr::STI(sr, off)      => write!(f, "STI {sr}, {off}"),
            SimInstr::JMP(br)           => write!(f, "JMP {br}"),
            SimInstr::Reserved(bits)    => write!(f, "RESERVED x{bits:03X}"),
            SimInstr::LEA(dr, off)      => write!(f, "LEA {dr}, {off}"),
            SimInstr::TRAP(vect)        => write!(f, "TRAP x{:02X}", vect.bits()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{IOffset, ImmOrReg};
    use crate::ast::reg_consts::{R0, R1, R2, R3, R5, R6, R7};
    use super::SimInstr;

    fn off<const N: u32>(n: i32) -> IOffset<N> {
        IOffset::new(n).unwrap()
    }

    #[test]
    fn test_encode_layouts() {
        assert_eq!(SimInstr::AND(R0, R0, ImmOrReg::Imm(off(0))).encode(),   0x5020);
        assert_eq!(SimInstr::ADD(R0, R0, ImmOrReg::Imm(off(15))).encode(),  0x102F);
        assert_eq!(SimInstr::ADD(R1, R2, ImmOrReg::Reg(R3)).encode(),        0x1283);
        assert_eq!(SimInstr::BR(0b010, off(-3)).encode(),                    0x05FD);
        assert_eq!(SimInstr::BR(0b111, off(0)).encode(),                     0x0E00);
        assert_eq!(SimInstr::LD(R2, off(5)).encode(),                        0x2405);
        assert_eq!(SimInstr::JSR(ImmOrReg::Imm(off(-1))).encode(),           0x4FFF);
        assert_eq!(SimInstr::JSR(ImmOrReg::Reg(R5)).encode(),                0x4140);
        assert_eq!(SimInstr::LDR(R1, R6, off(-32)).encode(),                 0x63A0);
        assert_eq!(SimInstr::STR(R7, R6, off(31)).encode(),                  0x7F9F);
        assert_eq!(SimInstr::NOT(R1, R2).encode(),                           0x92BF);
        assert_eq!(SimInstr::LEA(R0, off(255)).encode(),                     0xE0FF);
        assert_eq!(SimInstr::TRAP(off(0x25)).encode(),                       0xF025);
        assert_eq!(SimInstr::RTI.encode(),                                   0x8000);
    }

    #[test]
    fn test_decode_ignores_unused_bits() {
        // JMP with garbage in its unused fields
        assert_eq!(SimInstr::decode(0xCFFF), SimInstr::JMP(R7));
        // register-mode ADD ignores bits 4-3
        assert_eq!(SimInstr::decode(0x1018), SimInstr::ADD(R0, R0, ImmOrReg::Reg(R0)));
        assert_eq!(SimInstr::decode(0xD123), SimInstr::Reserved(0x123));
        assert_eq!(SimInstr::decode(0x8FFF), SimInstr::RTI);
    }

    #[test]
    fn test_decode_sign_extends() {
        assert_eq!(SimInstr::decode(0x0FFF), SimInstr::BR(0b111, off(-1)));
        assert_eq!(SimInstr::decode(0x4C00), SimInstr::JSR(ImmOrReg::Imm(off(-1024))));
        assert_eq!(SimInstr::decode(0x6220), SimInstr::LDR(R1, R0, off(-32)));
        assert_eq!(SimInstr::decode(0x1030), SimInstr::ADD(R0, R0, ImmOrReg::Imm(off(-16))));
    }
}
