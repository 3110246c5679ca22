//! The text object format.
//!
//! Assembled instructions are written out in this format, and it is read back
//! into an [`ObjectFile`] to be loaded into the simulator.
//!
//! The format consists of a header, then one group per `.orig`/`.end` block (in source order):
//! ```text
//! LC-3 OBJ FILE
//!
//! .TEXT
//! 3000        <- block origin, 4 upper-case hex digits
//! 3           <- number of words in the block, decimal
//! 5020        <- each word, 4 upper-case hex digits
//! ????        <- (or an uninitialized word)
//! F025
//! ```
//!
//! The word count of a block is the number of words *after* expanding `.blkw` and `.stringz`,
//! so it is computed in its own pass ([`block_sizes`]) before anything is written.

use std::fmt::Write;

use crate::ast::asm::Instr;
use super::ObjectFile;

const TFMT_MAGIC: &str = "LC-3 OBJ FILE";
const TFMT_SECTION: &str = ".TEXT";
const TFMT_UNINIT: &str = "????";
/// The most words a block can hold (all of memory).
const MAX_BLOCK_LEN: u32 = 1 << 16;

/// Computes the origin and word count of every block of assembled instructions.
///
/// ```
/// use lc3_twopass::asm::{assemble_src, encoding};
///
/// let src = ".orig x3000\n.blkw 5\n.stringz \"abc\"\nHALT\n.end\n.orig x4000\n.end";
/// let instrs = assemble_src(src).unwrap();
/// assert_eq!(encoding::block_sizes(&instrs), [(0x3000, 10), (0x4000, 0)]);
/// ```
pub fn block_sizes(instrs: &[Instr<'_>]) -> Vec<(u16, u32)> {
    let mut sizes: Vec<(u16, u32)> = vec![];

    for instr in instrs {
        match instr {
            Instr::Orig(addr) => sizes.push((*addr, 0)),
            instr => if let Some((_, len)) = sizes.last_mut() {
                *len += instr.word_len();
            },
        }
    }

    sizes
}

/// Writes assembled instructions in the text object format.
pub fn write_obj(instrs: &[Instr<'_>], buf: &mut impl Write) -> std::fmt::Result {
    let mut sizes = block_sizes(instrs).into_iter();

    writeln!(buf, "{TFMT_MAGIC}")?;
    writeln!(buf)?;
    writeln!(buf, "{TFMT_SECTION}")?;

    for instr in instrs {
        if let Instr::Orig(_) = instr {
            if let Some((addr, len)) = sizes.next() {
                writeln!(buf, "{addr:04X}")?;
                writeln!(buf, "{len}")?;
            }
        }

        for word in instr.words() {
            match word {
                Some(w) => writeln!(buf, "{w:04X}")?,
                None    => writeln!(buf, "{TFMT_UNINIT}")?,
            }
        }
    }

    Ok(())
}

/// Serializes assembled instructions into the text object format.
///
/// ```
/// use lc3_twopass::asm::{assemble_src, encoding};
///
/// let instrs = assemble_src(".orig x3000\n.blkw 2\n.fill xBEEF\n.end").unwrap();
/// assert_eq!(
///     encoding::serialize(&instrs),
///     "LC-3 OBJ FILE\n\n.TEXT\n3000\n3\n????\n????\nBEEF\n"
/// );
/// ```
pub fn serialize(instrs: &[Instr<'_>]) -> String {
    let mut buf = String::new();
    write_obj(instrs, &mut buf)
        .unwrap_or_else(|_| unreachable!("writing into String should not fail"));
    buf
}

/// Writes assembled instructions in the text object format to an I/O stream.
pub fn write_obj_io(instrs: &[Instr<'_>], mut w: impl std::io::Write) -> std::io::Result<()> {
    w.write_all(serialize(instrs).as_bytes())?;
    w.flush()
}

/// Kinds of errors that can occur from reading an object file.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum LoadErrKind {
    /// The file header or a block's origin is malformed.
    MalformedHeader,
    /// A block's word count is not a decimal number, or is larger than memory.
    BadCount,
    /// The file ended before all of a block's words were read.
    ShortRead,
    /// A word is neither 4 hex digits nor `????`.
    BadWord,
    /// The stream could not be read.
    Io(std::io::ErrorKind),
}
impl std::fmt::Display for LoadErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadErrKind::MalformedHeader => f.write_str("malformed object file header"),
            LoadErrKind::BadCount        => f.write_str("invalid block word count"),
            LoadErrKind::ShortRead       => f.write_str("object file ended unexpectedly"),
            LoadErrKind::BadWord         => f.write_str("invalid word"),
            LoadErrKind::Io(e)           => write!(f, "could not read object file: {e}"),
        }
    }
}

/// Error from reading an object file.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct LoadErr {
    /// The kind of error.
    pub kind: LoadErrKind,
    /// The 1-based line of the object file the error was detected on.
    ///
    /// This is 0 if the error occurred before any line could be read.
    pub line: usize,
}
impl std::fmt::Display for LoadErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for LoadErr {}
impl crate::err::Error for LoadErr {
    fn line(&self) -> Option<usize> {
        Some(self.line).filter(|&l| l != 0)
    }

    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self.kind {
            LoadErrKind::MalformedHeader => Some(format!("object files start with {TFMT_MAGIC:?} and {TFMT_SECTION:?}, and each block starts with a 4-digit hex address").into()),
            LoadErrKind::BadCount        => Some(format!("the word count must be written in decimal digits and be within [0, {MAX_BLOCK_LEN}]").into()),
            LoadErrKind::ShortRead       => None,
            LoadErrKind::BadWord         => Some(format!("each word must be 4 hex digits or {TFMT_UNINIT:?}").into()),
            LoadErrKind::Io(_)           => None,
        }
    }
}

/// The lines of an object file, trimmed and numbered.
struct ObjLines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
    line: usize,
}
impl<'a> ObjLines<'a> {
    fn new(src: &'a str) -> Self {
        ObjLines { inner: src.lines().enumerate(), line: 0 }
    }

    fn next(&mut self) -> Result<&'a str, LoadErr> {
        match self.inner.next() {
            Some((i, l)) => {
                self.line = i + 1;
                Ok(l.trim())
            },
            None => Err(LoadErr { kind: LoadErrKind::ShortRead, line: self.line + 1 }),
        }
    }

    fn next_nonblank(&mut self) -> Option<&'a str> {
        self.inner.by_ref()
            .find(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| {
                self.line = i + 1;
                l.trim()
            })
    }

    fn err(&self, kind: LoadErrKind) -> LoadErr {
        LoadErr { kind, line: self.line }
    }
}

/// Deserializes the text object format into an object file.
///
/// Blank lines are permitted before each block, but not within one.
/// Whitespace around each line (including a `\r` before the newline) is ignored.
/// Otherwise, every line must match the format exactly:
/// origins and words are 4 hex digits (of either case),
/// and counts are unsigned decimal digits.
///
/// ```
/// use lc3_twopass::asm::encoding;
///
/// let obj = encoding::deserialize("LC-3 OBJ FILE\n\n.TEXT\n3000\n2\n????\nF025\n").unwrap();
/// let words: Vec<_> = obj.addr_iter().collect();
/// assert_eq!(words, [(0x3000, None), (0x3001, Some(0xF025))]);
/// ```
pub fn deserialize(src: &str) -> Result<ObjectFile, LoadErr> {
    let mut lines = ObjLines::new(src);

    for header in [TFMT_MAGIC, TFMT_SECTION] {
        if lines.next_nonblank() != Some(header) {
            return Err(lines.err(LoadErrKind::MalformedHeader));
        }
    }

    let mut obj = ObjectFile::empty();
    while let Some(origin) = lines.next_nonblank() {
        let start = hex2u16(origin).ok_or_else(|| lines.err(LoadErrKind::MalformedHeader))?;
        let count = dec2u32(lines.next()?)
            .filter(|&n| n <= MAX_BLOCK_LEN)
            .ok_or_else(|| lines.err(LoadErrKind::BadCount))?;

        let mut words = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let word = maybe_hex2u16(lines.next()?).ok_or_else(|| lines.err(LoadErrKind::BadWord))?;
            words.push(word);
        }

        tracing::trace!(start, len = words.len(), "read object block");
        obj.push_block(start, words);
    }

    Ok(obj)
}

/// Reads an object file in the text object format from an I/O stream.
pub fn read_obj(mut r: impl std::io::Read) -> Result<ObjectFile, LoadErr> {
    let mut src = String::new();
    r.read_to_string(&mut src)
        .map_err(|e| LoadErr { kind: LoadErrKind::Io(e.kind()), line: 0 })?;

    deserialize(&src)
}

fn hex2u16(s: &str) -> Option<u16> {
    match s.len() == 4 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        true => u16::from_str_radix(s, 16).ok(),
        false => None
    }
}
fn dec2u32(s: &str) -> Option<u32> {
    match !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        true => s.parse().ok(),
        false => None
    }
}
fn maybe_hex2u16(s: &str) -> Option<Option<u16>> {
    match s {
        TFMT_UNINIT => Some(None),
        s => hex2u16(s).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble_src, ObjectFile};
    use super::{deserialize, read_obj, serialize, write_obj_io, LoadErr, LoadErrKind};

    fn assert_load_fail(src: &str, kind: LoadErrKind, line: usize) {
        assert_eq!(deserialize(src), Err(LoadErr { kind, line }));
    }

    #[test]
    fn test_end_to_end() {
        let instrs = assemble_src(".orig x3000\nAND R0,R0,0\nADD R0,R0,15\n.end").unwrap();
        assert_eq!(serialize(&instrs), "LC-3 OBJ FILE\n\n.TEXT\n3000\n2\n5020\n102F\n");
    }

    #[test]
    fn test_multiple_blocks() {
        let src = r#"
        .orig x4000
        MSG .stringz "Hi"
        .end
        .orig x3000
            LEA R0, #-1
            .blkw 2
            HALT
        .end
        .orig x5000
        .end
        "#;
        let instrs = assemble_src(src).unwrap();

        assert_eq!(serialize(&instrs), concat!(
            "LC-3 OBJ FILE\n\n.TEXT\n",
            "4000\n3\n0048\n0069\n0000\n",
            "3000\n4\nE1FF\n????\n????\nF025\n",
            "5000\n0\n",
        ));
    }

    #[test]
    fn test_round_trip() {
        let src = r#"
        .orig x3000
            LD R1, VALUE
            ADD R1, R1, #-1
            BRp #-2
            HALT
        VALUE .fill #10
        BUF   .blkw 3
        MSG   .stringz "ok\n"
        .end
        .orig x0200
            JSR #-1
            .blkw 1
        .end
        "#;
        let instrs = assemble_src(src).unwrap();

        let mut bytes = vec![];
        write_obj_io(&instrs, &mut bytes).unwrap();
        let obj = read_obj(bytes.as_slice()).unwrap();

        assert_eq!(obj, ObjectFile::new(&instrs));
        assert_eq!(obj.origin(), Some(0x3000));
        assert_eq!(obj.addr_iter().filter(|(_, w)| w.is_none()).count(), 4);
    }

    #[test]
    fn test_round_trip_full_memory() {
        let instrs = assemble_src(".orig x0000\n.blkw 65535\n.fill 7\n.end").unwrap();
        let text = serialize(&instrs);
        assert!(text.starts_with("LC-3 OBJ FILE\n\n.TEXT\n0000\n65536\n"));

        let obj = deserialize(&text).unwrap();
        assert_eq!(obj, ObjectFile::new(&instrs));
        assert_eq!(obj.addr_iter().last(), Some((0xFFFF, Some(7))));
    }

    #[test]
    fn test_lenient_whitespace() {
        let obj = deserialize("\nLC-3 OBJ FILE\r\n\r\n.TEXT\r\n3000\r\n1\r\nabcd\r\n\r\n\r\n4000\n0\n\n").unwrap();
        let blocks: Vec<_> = obj.block_iter().collect();
        assert_eq!(blocks, [(0x3000, &[Some(0xABCD)][..]), (0x4000, &[][..])]);

        // padding around a line is ignored
        let obj = deserialize("LC-3 OBJ FILE\n\n.TEXT\n  3000 \n\t1\n F025\n").unwrap();
        assert_eq!(obj.addr_iter().collect::<Vec<_>>(), [(0x3000, Some(0xF025))]);

        // no blocks at all
        assert_eq!(deserialize("LC-3 OBJ FILE\n\n.TEXT\n"), Ok(ObjectFile::empty()));
    }

    #[test]
    fn test_load_errors() {
        assert_load_fail("", LoadErrKind::MalformedHeader, 0);
        assert_load_fail("LC-3 OBJECT FILE\n\n.TEXT\n", LoadErrKind::MalformedHeader, 1);
        assert_load_fail("LC-3 OBJ FILE\n\n.DATA\n", LoadErrKind::MalformedHeader, 3);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\nx3000\n1\n0000\n", LoadErrKind::MalformedHeader, 4);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n300\n1\n0000\n", LoadErrKind::MalformedHeader, 4);

        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\nx1\n0000\n", LoadErrKind::BadCount, 5);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n-1\n", LoadErrKind::BadCount, 5);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n+1\n0000\n", LoadErrKind::BadCount, 5);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n65537\n", LoadErrKind::BadCount, 5);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n99999999999\n", LoadErrKind::BadCount, 5);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n", LoadErrKind::ShortRead, 5);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n3\n0000\n1111\n", LoadErrKind::ShortRead, 8);

        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n2\n0000\n\n", LoadErrKind::BadWord, 7);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n1\n+FFF\n", LoadErrKind::BadWord, 6);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n1\n???\n", LoadErrKind::BadWord, 6);
        assert_load_fail("LC-3 OBJ FILE\n\n.TEXT\n3000\n1\n12345\n", LoadErrKind::BadWord, 6);
    }

    #[test]
    fn test_read_invalid_utf8() {
        let err = read_obj(&b"LC-3 OBJ FILE\n\n.TEXT\n\xFF\xFE"[..]).unwrap_err();
        assert_eq!(err.kind, LoadErrKind::Io(std::io::ErrorKind::InvalidData));
    }
}
