//! The LC-3 virtual machine.
//!
//! The simulator executes a loaded [`ObjectFile`] one instruction at a time.
//!
//! - [`Simulator`]: the machine itself.
//! - [`mem`]: The module handling memory and the register file.
//! - [`io`]: The module handling the character IO used by trap routines.
//!
//! # Usage
//!
//! Create a simulator, load an object file into it, and run:
//!
//! ```
//! use lc3_twopass::asm::{assemble_src, ObjectFile};
//! use lc3_twopass::sim::Simulator;
//! use lc3_twopass::ast::reg_consts::R0;
//!
//! let src = "
//!     .orig x3000
//!     AND R0, R0, #0
//!     ADD R0, R0, #1
//!     ADD R0, R0, #1
//!     ADD R0, R0, #1
//!     HALT
//!     .end
//! ";
//! let obj = ObjectFile::new(&assemble_src(src).unwrap());
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj_file(&obj);
//! sim.run();
//! assert_eq!(sim.reg(R0), 3);
//! ```
//!
//! ## Flags
//!
//! The simulator above uses the default flags.
//! To make untouched memory predictable (e.g., in tests), fill it with a known value:
//!
//! ```
//! # use lc3_twopass::sim::{Simulator, SimFlags};
//! # use lc3_twopass::sim::mem::MachineInitStrategy;
//! let mut sim = Simulator::new(SimFlags { machine_init: MachineInitStrategy::Known { value: 0 } });
//! assert_eq!(sim.mem[0x4000], 0);
//! ```
//!
//! See [`SimFlags`] for every option.
//!
//! ## Execution
//!
//! [`Simulator::run`] executes until `HALT`. For finer control, there are:
//! - [`Simulator::step`]: execute exactly one instruction
//! - [`Simulator::run_with_limit`]: run until halting or until a number of instructions have been executed
//!
//! ## IO
//!
//! By default, the trap routines read from stdin and write to stdout.
//! This can be changed by replacing [`Simulator::io`] (see [`io::SimIO`]).

pub mod mem;
pub mod io;

use crate::asm::encoding::{read_obj, LoadErr};
use crate::asm::ObjectFile;
use crate::ast::reg_consts::{R0, R7};
use crate::ast::sim::SimInstr;
use crate::ast::{ImmOrReg, Reg};

use self::io::{IODevice, SimIO};
use self::mem::{MachineInitStrategy, Mem, RegFile};

const USER_START: u16 = 0x3000;
const IN_PROMPT: &str = "Input a character> ";

/// The condition code of the simulator.
///
/// This is always exactly one of negative, zero, or positive,
/// and is recomputed every time a register is written to.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ConditionCode {
    #[allow(missing_docs)]
    Negative = 0b100,
    #[allow(missing_docs)]
    Zero = 0b010,
    #[allow(missing_docs)]
    Positive = 0b001,
}
impl ConditionCode {
    /// The condition code of a value written to a register.
    ///
    /// ```
    /// use lc3_twopass::sim::ConditionCode;
    ///
    /// assert_eq!(ConditionCode::of(0), ConditionCode::Zero);
    /// assert_eq!(ConditionCode::of(0x7FFF), ConditionCode::Positive);
    /// assert_eq!(ConditionCode::of(0x8000), ConditionCode::Negative);
    /// ```
    pub fn of(value: u16) -> Self {
        match (value as i16).cmp(&0) {
            std::cmp::Ordering::Less    => ConditionCode::Negative,
            std::cmp::Ordering::Equal   => ConditionCode::Zero,
            std::cmp::Ordering::Greater => ConditionCode::Positive,
        }
    }

    /// The `nzp` bits of this condition code, as they're matched against a `BR` instruction.
    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Whether the simulator can keep executing after a step.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum StepState {
    /// The simulator can execute another instruction.
    Continue,
    /// The simulator executed `HALT`.
    Halted,
}

/// Configuration flags for [`Simulator`].
///
/// These can be modified after the `Simulator` is created with [`Simulator::new`].
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The strategy for filling memory and registers that haven't been written to.
    ///
    /// This only goes into effect after a `Simulator::new` or `Simulator::reset` call.
    ///
    /// By default, this flag is [`MachineInitStrategy::default`].
    pub machine_init: MachineInitStrategy,
}

/// Executes assembled code.
#[derive(Debug)]
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// Memory (boxed, since it is 128 KiB).
    pub mem: Mem,

    /// Registers. These can only be written through [`Simulator::set_reg`].
    pub reg_file: RegFile,

    /// The program counter.
    pub pc: u16,

    /// The condition code.
    cc: ConditionCode,

    /// The number of instructions run since this `Simulator` was initialized.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    // ------------------ CONFIG STATE ------------------
    // Calling [`Simulator::reset`] does not reset these values.

    /// Configuration, preserved across resets.
    pub flags: SimFlags,

    /// The IO device used by trap routines.
    pub io: SimIO,
}
impl Simulator where Simulator: Send + Sync {}

impl Simulator {
    /// Creates a new simulator with the provided flags, without a loaded object file.
    ///
    /// The simulator starts at x3000 with a zero condition code
    /// and reads from stdin and writes to stdout.
    pub fn new(flags: SimFlags) -> Self {
        let mut filler = flags.machine_init.generator();

        Self {
            mem: Mem::new(&mut filler),
            reg_file: RegFile::new(&mut filler),
            pc: USER_START,
            cc: ConditionCode::Zero,
            instructions_run: 0,

            flags,
            io: SimIO::default(),
        }
    }

    /// Resets the simulator.
    ///
    /// This refills memory and registers (according to [`SimFlags::machine_init`])
    /// and resets the PC, condition code, and instruction counter,
    /// while preserving flags and IO.
    ///
    /// This does not reload object files.
    pub fn reset(&mut self) {
        let flags = self.flags;
        let io = std::mem::take(&mut self.io);

        *self = Simulator::new(flags);
        self.io = io;
    }

    /// Reads a register.
    pub fn reg(&self, reg: Reg) -> u16 {
        self.reg_file[reg]
    }

    /// Writes a register, updating the condition code.
    ///
    /// ```
    /// use lc3_twopass::sim::{ConditionCode, Simulator};
    /// use lc3_twopass::ast::reg_consts::R2;
    ///
    /// let mut sim = Simulator::new(Default::default());
    /// sim.set_reg(R2, 0xFFFF);
    /// assert_eq!(sim.reg(R2), 0xFFFF);
    /// assert_eq!(sim.cc(), ConditionCode::Negative);
    /// ```
    pub fn set_reg(&mut self, reg: Reg, value: u16) {
        self.reg_file.set(reg, value);
        self.cc = ConditionCode::of(value);
    }

    /// The current condition code.
    pub fn cc(&self) -> ConditionCode {
        self.cc
    }

    /// Copies an object file into memory.
    ///
    /// Each block is copied to its starting address
    /// (leaving memory untouched wherever the block is uninitialized),
    /// and the PC is set to the start of the first block.
    pub fn load_obj_file(&mut self, obj: &ObjectFile) {
        for (start, words) in obj.block_iter() {
            tracing::trace!(start = format_args!("x{start:04X}"), len = words.len(), "loading block");
            self.mem.copy_obj_block(start, words);
        }

        if let Some(origin) = obj.origin() {
            self.pc = origin;
        }
    }

    /// Reads an object file in the text object format and loads it into this simulator.
    ///
    /// If the object file is malformed, the simulator is left untouched.
    pub fn load_obj(&mut self, reader: impl std::io::Read) -> Result<(), LoadErr> {
        let obj = read_obj(reader)?;
        self.load_obj_file(&obj);
        Ok(())
    }

    /// Fetches, decodes, and executes the instruction at the PC.
    ///
    /// This returns [`StepState::Halted`] if the instruction was `HALT`.
    pub fn step(&mut self) -> StepState {
        let pc = self.pc;
        let word = self.mem[pc];
        let instr = SimInstr::decode(word);
        self.pc = pc.wrapping_add(1);

        tracing::trace!(
            pc = format_args!("x{pc:04X}"),
            word = format_args!("x{word:04X}"),
            %instr,
            "executing"
        );

        let mut state = StepState::Continue;
        match instr {
            SimInstr::BR(cc, off) => {
                if cc & self.cc.bits() != 0 {
                    self.pc = self.pc.wrapping_add_signed(off.get());
                }
            },
            SimInstr::ADD(dr, sr1, sr2) => {
                let val1 = self.reg_file[sr1];
                let val2 = self.alu_operand(sr2);
                self.set_reg(dr, val1.wrapping_add(val2));
            },
            SimInstr::LD(dr, off) => {
                let ea = self.pc.wrapping_add_signed(off.get());
                self.set_reg(dr, self.mem[ea]);
            },
            SimInstr::ST(sr, off) => {
                let ea = self.pc.wrapping_add_signed(off.get());
                self.mem[ea] = self.reg_file[sr];
            },
            SimInstr::JSR(op) => {
                // the base register is read before R7 is written, so JSRR R7 jumps to the old R7
                let addr = match op {
                    ImmOrReg::Imm(off) => self.pc.wrapping_add_signed(off.get()),
                    ImmOrReg::Reg(br)  => self.reg_file[br],
                };
                self.set_reg(R7, self.pc);
                self.pc = addr;
            },
            SimInstr::AND(dr, sr1, sr2) => {
                let val1 = self.reg_file[sr1];
                let val2 = self.alu_operand(sr2);
                self.set_reg(dr, val1 & val2);
            },
            SimInstr::LDR(dr, br, off) => {
                let ea = self.reg_file[br].wrapping_add_signed(off.get());
                self.set_reg(dr, self.mem[ea]);
            },
            SimInstr::STR(sr, br, off) => {
                let ea = self.reg_file[br].wrapping_add_signed(off.get());
                self.mem[ea] = self.reg_file[sr];
            },
            SimInstr::NOT(dr, sr) => {
                let val = self.reg_file[sr];
                self.set_reg(dr, !val);
            },
            SimInstr::LDI(dr, off) => {
                let shifted_pc = self.pc.wrapping_add_signed(off.get());
                let ea = self.mem[shifted_pc];
                self.set_reg(dr, self.mem[ea]);
            },
            SimInstr::STI(sr, off) => {
                let shifted_pc = self.pc.wrapping_add_signed(off.get());
                let ea = self.mem[shifted_pc];
                self.mem[ea] = self.reg_file[sr];
            },
            SimInstr::JMP(br) => {
                self.pc = self.reg_file[br];
            },
            SimInstr::LEA(dr, off) => {
                let ea = self.pc.wrapping_add_signed(off.get());
                self.set_reg(dr, ea);
            },
            SimInstr::TRAP(vect) => {
                state = self.trap(vect.bits());
            },
            // no privilege or interrupt model
            SimInstr::RTI | SimInstr::Reserved(_) => {},
        }

        self.instructions_run = self.instructions_run.wrapping_add(1);
        state
    }

    fn alu_operand(&self, op: ImmOrReg<5>) -> u16 {
        match op {
            ImmOrReg::Imm(imm) => imm.get() as u16,
            ImmOrReg::Reg(reg) => self.reg_file[reg],
        }
    }

    /// Executes the trap routine of the given vector.
    fn trap(&mut self, vect: u16) -> StepState {
        match vect {
            // GETC
            0x20 => {
                let ch = self.io.read_char();
                self.set_reg(R0, u16::from(ch));
            },
            // OUT
            0x21 => {
                self.io.write_char(self.reg_file[R0] as u8);
                self.io.flush();
            },
            // PUTS
            0x22 => {
                let start = self.reg_file[R0];
                let chars = (0..=u16::MAX)
                    .map(|i| self.mem[start.wrapping_add(i)])
                    .take_while(|&w| w != 0);

                for w in chars {
                    self.io.write_char(w as u8);
                }
                self.io.flush();
            },
            // IN
            0x23 => {
                IN_PROMPT.bytes().for_each(|b| self.io.write_char(b));
                self.io.flush();

                let ch = self.io.read_char();
                self.io.write_char(ch);
                self.io.write_char(b'\n');
                self.io.flush();
                self.set_reg(R0, u16::from(ch));
            },
            // PUTSP
            0x24 => {
                let start = self.reg_file[R0];
                let words = (0..=u16::MAX)
                    .map(|i| self.mem[start.wrapping_add(i)])
                    .take_while(|&w| w != 0);

                for w in words {
                    let [lo, hi] = w.to_le_bytes();
                    self.io.write_char(lo);
                    if hi != 0 {
                        self.io.write_char(hi);
                    }
                }
                self.io.flush();
            },
            // HALT
            0x25 => {
                self.io.flush();
                tracing::debug!(instructions_run = self.instructions_run, "halted");
                return StepState::Halted;
            },
            vect => tracing::warn!("unhandled trap vector x{vect:02X}, ignoring"),
        }

        StepState::Continue
    }

    /// Execute the program.
    ///
    /// This blocks until the program halts.
    /// If the program never halts, this never returns.
    /// Embedders that need a watchdog should use [`Simulator::run_with_limit`].
    pub fn run(&mut self) {
        let _span = tracing::debug_span!("run", pc = format_args!("x{:04X}", self.pc)).entered();
        while self.step() == StepState::Continue {}
    }

    /// Runs until `HALT` or until `max_steps` instructions have executed, whichever comes first.
    ///
    /// This blocks until the program halts or until the number of steps to execute has been hit.
    /// This returns [`StepState::Halted`] if the program halted, and [`StepState::Continue`] otherwise.
    pub fn run_with_limit(&mut self, max_steps: u64) -> StepState {
        let _span = tracing::debug_span!("run_with_limit", pc = format_args!("x{:04X}", self.pc), max_steps).entered();

        for _ in 0..max_steps {
            if self.step() == StepState::Halted {
                return StepState::Halted;
            }
        }
        StepState::Continue
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble_src, encoding, ObjectFile};
    use crate::ast::reg_consts::{R0, R1, R2, R3, R4, R5, R7};

    use super::io::{BufferedIO, SimIO};
    use super::mem::MachineInitStrategy;
    use super::{ConditionCode, SimFlags, Simulator, StepState};

    fn sim_with(src: &str, fill: u16) -> Simulator {
        let instrs = assemble_src(src).unwrap();

        let mut sim = Simulator::new(SimFlags { machine_init: MachineInitStrategy::Known { value: fill } });
        sim.io = SimIO::Empty;
        sim.load_obj_file(&ObjectFile::new(&instrs));
        sim
    }
    fn sim(src: &str) -> Simulator {
        sim_with(src, 0)
    }
    fn with_buffered_io(sim: &mut Simulator, input: &[u8]) -> BufferedIO {
        let io = BufferedIO::new();
        io.get_input().write().unwrap().extend(input);
        sim.io = SimIO::from(io.clone());
        io
    }

    #[test]
    fn test_end_to_end() {
        let instrs = assemble_src(".orig x3000\nAND R0,R0,0\nADD R0,R0,15\n.end").unwrap();
        let obj = encoding::serialize(&instrs);

        let mut sim = Simulator::new(Default::default());
        sim.load_obj(obj.as_bytes()).unwrap();
        assert_eq!(sim.pc, 0x3000);

        assert_eq!(sim.step(), StepState::Continue);
        assert_eq!(sim.step(), StepState::Continue);
        assert_eq!(sim.reg(R0), 15);
        assert_eq!(sim.cc(), ConditionCode::Positive);
        assert_eq!(sim.instructions_run, 2);
    }

    #[test]
    fn test_add_registers() {
        let mut sim = sim(".orig x3000\nADD R1, R0, R0\n.end");
        sim.set_reg(R0, 5);
        sim.step();

        assert_eq!(sim.reg(R1), 10);
        assert_eq!(sim.cc(), ConditionCode::Positive);
    }

    #[test]
    fn test_cc_updates() {
        let mut sim = sim(".orig x3000\nNOT R0, R0\nAND R1, R0, #0\nADD R2, R1, #-1\nADD R2, R2, #2\n.end");
        sim.step();
        assert_eq!(sim.reg(R0), 0xFFFF);
        assert_eq!(sim.cc(), ConditionCode::Negative);
        sim.step();
        assert_eq!(sim.cc(), ConditionCode::Zero);
        sim.step();
        assert_eq!(sim.reg(R2), 0xFFFF);
        assert_eq!(sim.cc(), ConditionCode::Negative);
        sim.step();
        assert_eq!(sim.reg(R2), 1);
        assert_eq!(sim.cc(), ConditionCode::Positive);
    }

    #[test]
    fn test_branch_loop() {
        let mut sim = sim(r"
            .orig x3000
                AND R0, R0, #0
                ADD R0, R0, #3
                AND R1, R1, #0
            LOOP ADD R1, R1, #2
                ADD R0, R0, #-1
                BRp LOOP
                HALT
            .end
        ");
        sim.run();

        assert_eq!(sim.reg(R0), 0);
        assert_eq!(sim.reg(R1), 6);
        assert_eq!(sim.cc(), ConditionCode::Zero);
        assert_eq!(sim.instructions_run, 13);
        assert_eq!(sim.pc, 0x3007);
    }

    #[test]
    fn test_subroutines() {
        let mut sim = sim(r"
            .orig x3000
                JSR SUB
                ADD R2, R2, #1
                HALT
            SUB AND R2, R2, #0
                ADD R2, R2, #4
                RET
            .end
        ");
        sim.run();
        assert_eq!(sim.reg(R2), 5);
        assert_eq!(sim.reg(R7), 0x3001);

        let mut sim = sim_with(r"
            .orig x3000
                LEA R3, SUB
                JSRR R3
                HALT
            SUB ADD R4, R7, #0
                RET
            .end
        ", 0);
        sim.run();
        assert_eq!(sim.reg(R4), 0x3002);

        // JSRR R7 jumps to the old R7
        let mut sim = sim_with(r"
            .orig x3000
                LEA R7, TARGET
                JSRR R7
                HALT
            TARGET ADD R0, R7, #0
                HALT
            .end
        ", 0);
        sim.step();
        sim.step();
        assert_eq!(sim.pc, 0x3003);
        assert_eq!(sim.reg(R7), 0x3002);
        sim.run();
        assert_eq!(sim.reg(R0), 0x3002);
    }

    #[test]
    fn test_memory_access() {
        let mut sim = sim(r"
            .orig x3000
                LD R0, VAL
                ST R0, COPY
                LDI R1, PTR
                STI R0, PTR
                LEA R2, ARR
                LDR R3, R2, #1
                STR R0, R2, #0
                HALT
            VAL  .fill #7
            COPY .blkw 1
            PTR  .fill x4000
            ARR  .fill x11
                 .fill x22
            .end
            .orig x4000
                .fill #-2
            .end
        ");

        sim.step();
        assert_eq!(sim.reg(R0), 7);
        sim.step();
        assert_eq!(sim.mem[0x3009], 7);
        sim.step();
        assert_eq!(sim.reg(R1), 0xFFFE);
        assert_eq!(sim.cc(), ConditionCode::Negative);
        sim.step();
        assert_eq!(sim.mem[0x4000], 7);

        sim.run();
        assert_eq!(sim.reg(R2), 0x300B);
        assert_eq!(sim.reg(R3), 0x22);
        assert_eq!(sim.mem[0x300B], 7);
    }

    #[test]
    fn test_lea_cc() {
        let mut sim = sim(".orig xC000\nLEA R5, #0\n.end");
        sim.set_reg(R0, 0);
        sim.step();

        assert_eq!(sim.reg(R5), 0xC001);
        assert_eq!(sim.cc(), ConditionCode::Negative);
    }

    #[test]
    fn test_char_traps() {
        let mut sim = sim(r#"
            .orig x3000
                GETC
                OUT
                LEA R0, MSG
                PUTS
                HALT
            MSG .stringz "ok\n"
            .end
        "#);
        let io = with_buffered_io(&mut sim, b"z");
        sim.run();

        assert_eq!(*io.get_output().read().unwrap(), b"zok\n");
        assert_eq!(sim.reg(R0), 0x3005);
        assert!(io.get_input().read().unwrap().is_empty());
    }

    #[test]
    fn test_in_trap() {
        let mut sim = sim(".orig x3000\nIN\nHALT\n.end");
        let io = with_buffered_io(&mut sim, b"q");
        sim.run();

        assert_eq!(*io.get_output().read().unwrap(), b"Input a character> q\n");
        assert_eq!(sim.reg(R0), u16::from(b'q'));
    }

    #[test]
    fn test_putsp_trap() {
        let mut sim = sim(r"
            .orig x3000
                LEA R0, MSG
                TRAP x24
                HALT
            MSG .fill x6968
                .fill x0021
                .fill #0
            .end
        ");
        let io = with_buffered_io(&mut sim, b"");
        sim.run();

        assert_eq!(*io.get_output().read().unwrap(), b"hi!");
    }

    #[test]
    fn test_halt_and_unknown_traps() {
        let mut sim = sim(".orig x3000\nTRAP x30\nHALT\nADD R0, R0, #1\n.end");

        assert_eq!(sim.step(), StepState::Continue);
        assert_eq!(sim.step(), StepState::Halted);
        assert_eq!(sim.pc, 0x3002);
        assert_eq!(sim.reg(R0), 0);
    }

    #[test]
    fn test_rti_and_reserved_are_noops() {
        let mut sim = sim(".orig x3000\n.fill x8000\n.fill xD123\nHALT\n.end");
        sim.set_reg(R1, 9);
        sim.run();

        assert_eq!(sim.reg(R1), 9);
        assert_eq!(sim.instructions_run, 3);
    }

    #[test]
    fn test_blkw_leaves_memory() {
        let instrs = assemble_src(".orig x3000\n.blkw 2\n.fill 1\n.end").unwrap();
        let obj = encoding::serialize(&instrs);

        let mut sim = Simulator::new(SimFlags { machine_init: MachineInitStrategy::Known { value: 0xABCD } });
        sim.load_obj(obj.as_bytes()).unwrap();

        assert_eq!(sim.mem[0x3000], 0xABCD);
        assert_eq!(sim.mem[0x3001], 0xABCD);
        assert_eq!(sim.mem[0x3002], 1);
    }

    #[test]
    fn test_bad_load_leaves_sim() {
        let mut sim = Simulator::new(SimFlags { machine_init: MachineInitStrategy::Known { value: 0 } });
        let err = sim.load_obj(&b"LC-3 OBJ FILE\n\n.TEXT\n4000\n2\n1234\n"[..]).unwrap_err();

        assert_eq!(err.kind, encoding::LoadErrKind::ShortRead);
        assert_eq!(sim.pc, 0x3000);
        assert_eq!(sim.mem[0x4000], 0);
    }

    #[test]
    fn test_run_with_limit() {
        let mut sim = sim(".orig x3000\nLOOP BR LOOP\n.end");

        assert_eq!(sim.run_with_limit(100), StepState::Continue);
        assert_eq!(sim.instructions_run, 100);
        assert_eq!(sim.pc, 0x3000);

        let mut sim = sim_with(".orig x3000\nHALT\n.end", 0);
        assert_eq!(sim.run_with_limit(100), StepState::Halted);
        assert_eq!(sim.instructions_run, 1);
    }

    #[test]
    fn test_reset() {
        let mut sim = sim(".orig x4000\nADD R0, R0, #1\n.end");
        sim.step();
        assert_eq!(sim.pc, 0x4001);

        sim.reset();
        assert_eq!(sim.pc, 0x3000);
        assert_eq!(sim.reg(R0), 0);
        assert_eq!(sim.mem[0x4000], 0);
        assert_eq!(sim.cc(), ConditionCode::Zero);
        assert_eq!(sim.instructions_run, 0);
        assert!(matches!(sim.io, SimIO::Empty));
    }
}
