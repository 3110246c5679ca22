//! A two-pass LC-3 assembler and virtual machine.
//!
//! The pipeline is split into stages which each fully consume the output of the last:
//! - [`parse`]: source lines are tokenized into per-line token sequences,
//! - [`asm`]: the first pass builds a [`SymbolTable`], the second encodes instructions,
//! - [`asm::encoding`]: instructions are written to (and read from) the text object format,
//! - [`sim`]: the object format is loaded into memory and executed.
//!
//! # Usage
//!
//! Source code is assembled into instructions, which can then be written out as an object file:
//! ```
//! use lc3_twopass::parse::tokenize;
//! use lc3_twopass::asm::{assemble, encoding};
//!
//! let code = ".orig x3000\nAND R0,R0,0\nADD R0,R0,15\n.end";
//! let lines = tokenize(code).unwrap();
//! let instrs = assemble(&lines).unwrap();
//!
//! let obj = encoding::serialize(&instrs);
//! assert_eq!(obj, "LC-3 OBJ FILE\n\n.TEXT\n3000\n2\n5020\n102F\n");
//! ```
//!
//! The object text can then be loaded into the simulator and executed:
//! ```
//! use lc3_twopass::sim::{Simulator, ConditionCode};
//! use lc3_twopass::ast::reg_consts::R0;
//!
//! let obj = "LC-3 OBJ FILE\n\n.TEXT\n3000\n3\n5020\n102F\nF025\n";
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj(obj.as_bytes()).unwrap();
//! sim.run();
//!
//! assert_eq!(sim.reg(R0), 15);
//! assert_eq!(sim.cc(), ConditionCode::Positive);
//! ```
//!
//! Errors from every stage carry the line they were detected on.
//! See [`err`] for the common interface.
//!
//! [`SymbolTable`]: asm::SymbolTable
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
