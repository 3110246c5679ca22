//! Error interface for this crate.
//!
//! Every stage of the pipeline reports its failure as an error kind
//! paired with the line it was detected on. The [`Error`] trait exposes
//! that pair (plus an optional hint) so callers can surface it however they like.
//!
//! ```
//! use lc3_twopass::asm::assemble_src;
//! use lc3_twopass::err::{AsmErrKind, Error as _};
//!
//! let err = assemble_src(".orig x3000\nBR UNDEFINED\n.end").unwrap_err();
//! assert_eq!(err.kind, AsmErrKind::SymbolNotFound);
//! assert_eq!(err.line(), Some(2));
//! ```
use std::borrow::Cow;

pub use crate::parse::lex::LexErr;
pub use crate::parse::ParseErr;
pub use crate::ast::OffsetNewErr;
pub use crate::asm::{AsmErr, AsmErrKind};
pub use crate::asm::encoding::{LoadErr, LoadErrKind};

/// Common interface for errors raised by this crate.
pub trait Error: std::error::Error {
    /// The 1-based line this error was detected on, if any.
    ///
    /// For assembly errors, this is the source line.
    /// For object loading errors, this is the line of the object text.
    fn line(&self) -> Option<usize> {
        None
    }

    /// A short message describing how to fix this error.
    fn help(&self) -> Option<Cow<str>> {
        None
    }
}
