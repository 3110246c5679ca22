//! Machine state of the LC-3 simulator.
//!
//! - [`Mem`]: the 65536-word address space.
//! - [`RegFile`]: the eight general purpose registers.
//! - [`MachineInitStrategy`]: How the memory and register file are filled before a program writes to them.

use rand::rngs::StdRng;
use rand::Rng;

use crate::ast::Reg;

const N: usize = 1 << 16;

/// Trait that describes types that can be used to create the data for a word
/// which has not been written by a program.
pub trait WordFiller {
    /// Generate the data.
    fn generate(&mut self) -> u16;
}
impl WordFiller for () {
    /// Thread-local randomness.
    fn generate(&mut self) -> u16 {
        rand::random()
    }
}
impl WordFiller for u16 {
    /// The same value for every word.
    fn generate(&mut self) -> u16 {
        *self
    }
}
impl WordFiller for StdRng {
    /// Values drawn from the generator, reproducible when it was seeded.
    fn generate(&mut self) -> u16 {
        self.gen()
    }
}

/// Strategy used to initialize the `reg_file` and `mem` of the [`Simulator`].
///
/// Any memory location or register that a program never writes to
/// keeps the value it was given by this strategy.
///
/// [`Simulator`]: super::Simulator
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum MachineInitStrategy {
    /// Random values, different on every run.
    #[default]
    Unseeded,

    /// Random values from a seeded generator, the same on every run.
    Seeded {
        /// The generator's seed.
        seed: u64
    },

    /// One fixed value everywhere.
    Known {
        /// The fill value.
        value: u16
    }
}

impl MachineInitStrategy {
    pub(super) fn generator(&self) -> impl WordFiller {
        use rand::SeedableRng;

        match self {
            MachineInitStrategy::Unseeded => MIGenerator::Unseeded,
            MachineInitStrategy::Seeded { seed } => MIGenerator::Seeded(Box::new(StdRng::seed_from_u64(*seed))),
            MachineInitStrategy::Known { value } => MIGenerator::Known(*value),
        }
    }
}

enum MIGenerator {
    Unseeded,
    Seeded(Box<StdRng>),
    Known(u16)
}
impl WordFiller for MIGenerator {
    fn generate(&mut self) -> u16 {
        match self {
            MIGenerator::Unseeded  => ().generate(),
            MIGenerator::Seeded(r) => r.generate(),
            MIGenerator::Known(k)  => k.generate(),
        }
    }
}

/// Memory. This consists of 65536 16-bit words.
///
/// Memory can be indexed by address:
///
/// ```
/// use lc3_twopass::sim::mem::Mem;
///
/// let mut mem = Mem::new(&mut 0u16);
/// mem[0x3000] = 0x1234;
/// assert_eq!(mem[0x3000], 0x1234);
/// assert_eq!(mem[0x3001], 0);
/// ```
#[derive(Clone)]
pub struct Mem {
    data: Box<[u16; N]>,
}
impl Mem {
    /// Creates a new memory, filling every word with the provided filler.
    pub fn new(filler: &mut impl WordFiller) -> Self {
        Self {
            data: std::iter::repeat_with(|| filler.generate())
                .take(N)
                .collect::<Box<[u16]>>()
                .try_into()
                .unwrap_or_else(|_| unreachable!("iterator should have had {N} elements")),
        }
    }

    /// Writes the words of one object file block, starting at `start`.
    ///
    /// Uninitialized words in the block (`None`) leave the memory at that location untouched.
    /// A block which runs past xFFFF continues from x0000.
    ///
    /// ```
    /// use lc3_twopass::sim::mem::Mem;
    ///
    /// let mut mem = Mem::new(&mut 0xAAAAu16);
    /// mem.copy_obj_block(0xFFFF, &[Some(1), None, Some(3)]);
    /// assert_eq!(mem[0xFFFF], 1);
    /// assert_eq!(mem[0x0000], 0xAAAA);
    /// assert_eq!(mem[0x0001], 3);
    /// ```
    pub fn copy_obj_block(&mut self, start: u16, data: &[Option<u16>]) {
        let mut addr = start;
        for word in data {
            if let Some(w) = *word {
                self[addr] = w;
            }
            addr = addr.wrapping_add(1);
        }
    }
}
impl std::ops::Index<u16> for Mem {
    type Output = u16;

    fn index(&self, index: u16) -> &Self::Output {
        &self.data[usize::from(index)]
    }
}
impl std::ops::IndexMut<u16> for Mem {
    fn index_mut(&mut self, index: u16) -> &mut Self::Output {
        &mut self.data[usize::from(index)]
    }
}
impl std::fmt::Debug for Mem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mem")
            .finish_non_exhaustive()
    }
}

/// The register file.
///
/// Registers are read by indexing with a [`Reg`] (see [`crate::ast::reg_consts`]).
///
/// The register file can only be written to by the simulator,
/// so that every register write also updates the condition code
/// (see [`Simulator::set_reg`]).
///
/// # Example
///
/// ```
/// use lc3_twopass::sim::mem::RegFile;
/// use lc3_twopass::ast::reg_consts::{R0, R7};
///
/// let reg = RegFile::new(&mut 11u16);
/// assert_eq!(reg[R0], 11);
/// assert_eq!(reg[R7], 11);
/// ```
///
/// [`Simulator::set_reg`]: super::Simulator::set_reg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegFile([u16; 8]);
impl RegFile {
    /// Creates a register file, filling every register with the provided filler.
    pub fn new(filler: &mut impl WordFiller) -> Self {
        Self(std::array::from_fn(|_| filler.generate()))
    }

    pub(super) fn set(&mut self, reg: Reg, value: u16) {
        self.0[usize::from(reg)] = value;
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = u16;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{R0, R3};
    use super::{MachineInitStrategy, Mem, RegFile, WordFiller};

    #[test]
    fn test_known_fill() {
        let mut filler = MachineInitStrategy::Known { value: 0x1234 }.generator();
        let mem = Mem::new(&mut filler);
        assert_eq!(mem[0x0000], 0x1234);
        assert_eq!(mem[0xFFFF], 0x1234);

        let reg = RegFile::new(&mut filler);
        assert_eq!(reg[R3], 0x1234);
    }

    #[test]
    fn test_seeded_fill_is_deterministic() {
        let strat = MachineInitStrategy::Seeded { seed: 0xC0FFEE };
        let mut a = strat.generator();
        let mut b = strat.generator();

        let xs: Vec<_> = std::iter::repeat_with(|| a.generate()).take(32).collect();
        let ys: Vec<_> = std::iter::repeat_with(|| b.generate()).take(32).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_copy_obj_block() {
        let mut mem = Mem::new(&mut 0xFFFFu16);
        mem.copy_obj_block(0x3000, &[Some(0x5020), None, None, Some(0), Some(0x102F)]);

        assert_eq!(mem[0x2FFF], 0xFFFF);
        assert_eq!(mem[0x3000], 0x5020);
        assert_eq!(mem[0x3001], 0xFFFF);
        assert_eq!(mem[0x3002], 0xFFFF);
        assert_eq!(mem[0x3003], 0x0000);
        assert_eq!(mem[0x3004], 0x102F);
        assert_eq!(mem[0x3005], 0xFFFF);
    }

    #[test]
    fn test_reg_set() {
        let mut reg = RegFile::new(&mut 0u16);
        reg.set(R0, 0x8000);
        assert_eq!(reg[R0], 0x8000);
        assert_eq!(reg[R3], 0);
    }
}
