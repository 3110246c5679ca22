//! Components relating to the instruction records produced by the assembler.
//!
//! The operand types here (registers, bit-fitted offsets) are shared by
//! [`asm::Instr`], the record the second assembler pass produces for each line,
//! and [`sim::SimInstr`], a single machine word split into its fields.

pub mod asm;
pub mod sim;

use std::num::TryFromIntError;

/// One of the eight general purpose registers, `R0` through `R7`.
///
/// Use the constants in [`reg_consts`], or [`Reg::try_from`] for a register number only known at runtime.
///
/// ## Examples
///
/// ```text
/// AND R0, R0, #0
///     ~~  ~~
/// ADD R1, R1, R0
///     ~~  ~~  ~~
/// LD R2, VALUE
///    ~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Reg(pub(crate) u8);

/// The eight registers.
pub mod reg_consts {
    use super::Reg;

    /// Register 0.
    pub const R0: Reg = Reg(0);
    /// Register 1.
    pub const R1: Reg = Reg(1);
    /// Register 2.
    pub const R2: Reg = Reg(2);
    /// Register 3.
    pub const R3: Reg = Reg(3);
    /// Register 4.
    pub const R4: Reg = Reg(4);
    /// Register 5.
    pub const R5: Reg = Reg(5);
    /// Register 6.
    pub const R6: Reg = Reg(6);
    /// Register 7, which holds the return address after `JSR`/`JSRR`.
    pub const R7: Reg = Reg(7);
}
impl Reg {
    /// The register number, in `0..8`.
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Reads a register from the 3 bits of `word` starting at bit `lo`.
    pub(crate) fn from_bits(word: u16, lo: u32) -> Self {
        Reg(((word >> lo) & 0b111) as u8)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`crate::sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl From<Reg> for u16 {
    fn from(value: Reg) -> Self {
        u16::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Reg(value)),
            // TryFromIntError has no public constructor
            _     => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}

/// The `nzp` flags of a `BR` instruction, as 3 bits (`n` is the high bit).
///
/// `BR` and `BRnzp` are both `0b111`, `BRz` is `0b010`, `BRnp` is `0b101`, and so on.
pub type CondCode = u8;

/// A signed offset or a signed immediate value which fits in `N` bits.
///
/// ## Examples
///
/// `ADD`/`AND`'s imm5 operand is an `IOffset<5>`:
///
/// ```text
/// AND R0, R0, #0
///             ~~
/// ADD R1, R1, #1
///             ~~
/// ```
///
/// They are also used for PC offsets and base register offsets:
/// ```text
/// BR x-F
///    ~~~
/// JSR #99
///     ~~~
/// LDR R0, R0, #9
///             ~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct IOffset<const N: u32>(i16);

/// An 8-bit trap vector (used for `TRAP`).
///
/// Like every other operand field, this is range-checked as a signed 8-bit value.
///
/// ```text
/// TRAP x25
///      ~~~
/// ```
pub type TrapVect8 = IOffset<8>;

impl<const N: u32> std::fmt::Display for IOffset<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The error raised when a value does not fit in its operand field.
///
/// This holds the bit width of the field.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct OffsetNewErr(pub u32);

impl std::fmt::Display for OffsetNewErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "value is too big for signed {}-bit integer", self.0)
    }
}
impl std::error::Error for OffsetNewErr {}
impl crate::err::Error for OffsetNewErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        let n = self.0;
        Some(format!("the range for a signed {n}-bit integer is [{}, {}]", (-1i32) << (n - 1), (1i32 << (n - 1)) - 1).into())
    }
}

impl<const N: u32> IOffset<N> {
    /// Range-checks a value into an `N`-bit field.
    /// This must fit within `N` bits of a two's complement representation, otherwise an error is raised.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lc3_twopass::ast::IOffset;
    /// #
    /// assert!(IOffset::<5>::new(-16).is_ok());
    /// assert!(IOffset::<5>::new(15).is_ok());
    /// assert!(IOffset::<5>::new(16).is_err());
    /// assert!(IOffset::<5>::new(-17).is_err());
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is not between 1 and 16.
    pub fn new(n: i32) -> Result<Self, OffsetNewErr> {
        assert!((1..=16).contains(&N), "bit size {N} is not a valid offset size");
        let (min, max) = ((-1i32) << (N - 1), (1i32 << (N - 1)) - 1);

        match (min..=max).contains(&n) {
            true  => Ok(IOffset(n as i16)),
            false => Err(OffsetNewErr(N)),
        }
    }

    /// Creates a new offset by sign-extending the first N bits of the word,
    /// and discarding the rest.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lc3_twopass::ast::IOffset;
    /// #
    /// assert_eq!(IOffset::<5>::new_trunc(0b11011).get(), -5);
    /// assert_eq!(IOffset::<5>::new_trunc(0b01111).get(), 15);
    /// assert_eq!(IOffset::<5>::new_trunc(0b10000).get(), -16);
    /// assert_eq!(IOffset::<9>::new_trunc(0xF1FF).get(), -1);
    /// ```
    pub fn new_trunc(word: u16) -> Self {
        assert!((1..=16).contains(&N), "bit size {N} is not a valid offset size");
        let shift = 16 - N;
        Self(((word << shift) as i16) >> shift)
    }

    /// The (sign-extended) value.
    pub fn get(&self) -> i16 {
        self.0
    }

    /// The low `N` bits of the offset, as they appear in an encoded instruction.
    pub fn bits(&self) -> u16 {
        (self.0 as u16) & (u16::MAX >> (16 - N))
    }
}

/// The last operand of `ADD`/`AND` (an imm5 or a register),
/// or the target of `JSR`/`JSRR` (a PC offset or a base register).
///
/// ## Examples
/// ```text
/// AND R0, R0, #0
/// AND R1, R1, R1
///             ^^
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ImmOrReg<const N: u32> {
    #[allow(missing_docs)]
    Imm(IOffset<N>),
    #[allow(missing_docs)]
    Reg(Reg)
}
impl<const N: u32> std::fmt::Display for ImmOrReg<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImmOrReg::Imm(imm) => imm.fmt(f),
            ImmOrReg::Reg(reg) => reg.fmt(f),
        }
    }
}
