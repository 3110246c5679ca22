//! Assembling tokenized LC-3 source into instruction records.
//!
//! Assembly happens in two passes over the same token sequences ([`LineTokens`]):
//! 1. [`SymbolTable::new`] assigns an address to every line, records labels,
//!    and validates the block structure (`.ORIG`/`.END` pairing, no overlapping blocks).
//! 2. [`encode`] re-walks the tokens with the finished symbol table, producing
//!    one [`Instr`] per instruction or directive with every operand resolved and range-checked.
//!
//! The assembler module notably consists of:
//! - [`assemble`] and [`assemble_src`]: the main functions which run both passes.
//! - [`SymbolTable`]: a struct holding the symbol table, built by the first pass.
//! - [`ObjectFile`]: the memory image of a program, which can be loaded into the simulator.
//! - [`encoding`]: the text object format which instructions are written to and object files are read from.
//!
//! Assembly stops at the first error, and there is never partial output.

pub mod encoding;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::Range;

use crate::ast::asm::Instr;
use crate::ast::sim::SimInstr;
use crate::ast::{IOffset, ImmOrReg, OffsetNewErr, Reg};
use crate::parse::lex::{Directive, LexErr, Mnemonic, Token, TokenKind};
use crate::parse::{tokenize, unescape, LineTokens, ParseErr};

/// Assembles tokenized source lines into instruction records.
///
/// This runs both assembler passes.
///
/// # Example
/// ```
/// use lc3_twopass::parse::tokenize;
/// use lc3_twopass::asm::assemble;
/// use lc3_twopass::ast::asm::Instr;
///
/// let lines = tokenize(".orig x3000\nLABEL .fill LABEL\n.end").unwrap();
/// let instrs = assemble(&lines).unwrap();
/// assert_eq!(instrs, [Instr::Orig(0x3000), Instr::Fill(0x3000), Instr::End]);
/// ```
pub fn assemble<'src>(lines: &[LineTokens<'src>]) -> Result<Vec<Instr<'src>>, AsmErr> {
    let sym = SymbolTable::new(lines)?;
    encode(lines, &sym)
}

/// Tokenizes and assembles source code.
///
/// # Example
/// ```
/// use lc3_twopass::asm::assemble_src;
///
/// let instrs = assemble_src(".orig x3000\nHALT\n.end").unwrap();
/// assert_eq!(instrs.len(), 3);
/// ```
pub fn assemble_src(src: &str) -> Result<Vec<Instr<'_>>, AsmErr> {
    let lines = tokenize(src)?;
    assemble(&lines)
}

/// Kinds of errors that can occur from assembling given assembly code.
///
/// See [`AsmErr`] for this error type with line information included.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsmErrKind {
    /// The line could not be tokenized.
    Lex(LexErr),
    /// A token appeared outside of an `.orig`/`.end` block.
    TokenBeforeOrig,
    /// A line ended before its instruction or directive was complete.
    NoMoreTokens,
    /// A token of the wrong kind appeared where an operand was required.
    BadToken,
    /// `.orig` was given a negative address.
    NegativeOrig,
    /// `.orig` was not followed by a number.
    NoOrigNumber,
    /// There was an `.orig` opened inside another `.orig` block.
    OrigInsideOrig,
    /// There was an `.orig` but no corresponding `.end`.
    MissingEnd,
    /// There are blocks that overlap ranges of memory.
    OverlappingMemory,
    /// A block runs past the end of memory.
    WrappingBlock,
    /// A label was placed after the last word of memory (xFFFF).
    LabelPastMemory,
    /// `.blkw` was not given a positive number of words.
    BadBlkwAmount,
    /// `.stringz` was not followed by a quoted string.
    BadStringz,
    /// A string literal used an escape other than `\n` or `\\`.
    BadStringEscape,
    /// A label was defined more than once.
    DuplicateSymbol,
    /// There were tokens left over after a complete instruction or directive.
    TrailingTokens,
    /// A numeric operand (or a label's offset) does not fit its field.
    NumberTooLarge(OffsetNewErr),
    /// A label was referenced but never defined.
    SymbolNotFound,
}
impl std::fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lex(e)            => e.fmt(f),
            Self::TokenBeforeOrig   => f.write_str("token found outside of an .orig block"),
            Self::NoMoreTokens      => f.write_str("expected more tokens"),
            Self::BadToken          => f.write_str("unexpected token"),
            Self::NegativeOrig      => f.write_str(".orig address cannot be negative"),
            Self::NoOrigNumber      => f.write_str(".orig must be followed by an address"),
            Self::OrigInsideOrig    => f.write_str("cannot have an .orig inside another region"),
            Self::MissingEnd        => f.write_str(".orig directive was never closed"),
            Self::OverlappingMemory => f.write_str("regions overlap in memory"),
            Self::WrappingBlock     => f.write_str("block wraps around in memory"),
            Self::LabelPastMemory   => f.write_str("label does not name an address in memory"),
            Self::BadBlkwAmount     => f.write_str(".blkw must reserve a positive number of words"),
            Self::BadStringz        => f.write_str(".stringz must be followed by a string literal"),
            Self::BadStringEscape   => f.write_str("invalid escape in string literal"),
            Self::DuplicateSymbol   => f.write_str("label was defined multiple times"),
            Self::TrailingTokens    => f.write_str("unexpected tokens after instruction"),
            Self::NumberTooLarge(e) => e.fmt(f),
            Self::SymbolNotFound    => f.write_str("label could not be found"),
        }
    }
}

/// Error from assembling given assembly code.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct AsmErr {
    /// The kind of error.
    pub kind: AsmErrKind,
    /// The 1-based source line the error was detected on.
    pub line: usize,
}
impl AsmErr {
    /// Creates a new [`AsmErr`].
    pub fn new(kind: AsmErrKind, line: usize) -> Self {
        AsmErr { kind, line }
    }
}
impl From<ParseErr> for AsmErr {
    fn from(value: ParseErr) -> Self {
        AsmErr::new(AsmErrKind::Lex(value.kind), value.line)
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for AsmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AsmErrKind::Lex(e) => Some(e),
            AsmErrKind::NumberTooLarge(e) => Some(e),
            _ => None
        }
    }
}
impl crate::err::Error for AsmErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }

    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match &self.kind {
            AsmErrKind::Lex(e)            => crate::err::Error::help(e),
            AsmErrKind::TokenBeforeOrig   => Some("try moving this line inside of an .orig/.end block".into()),
            AsmErrKind::NoMoreTokens      => None,
            AsmErrKind::BadToken          => None,
            AsmErrKind::NegativeOrig      => Some("addresses are within [x0000, xFFFF]".into()),
            AsmErrKind::NoOrigNumber      => Some("try adding a starting address (e.g., .orig x3000)".into()),
            AsmErrKind::OrigInsideOrig    => Some("try adding an .end directive at the end of the outer .orig block".into()),
            AsmErrKind::MissingEnd        => Some("try adding an .end directive at the end of this block".into()),
            AsmErrKind::OverlappingMemory => Some("try moving the starting address of one of these regions".into()),
            AsmErrKind::WrappingBlock     => Some("user code typically starts at x3000 and is short enough to not wrap memory".into()),
            AsmErrKind::LabelPastMemory   => Some("the block already fills memory up to xFFFF, try moving this label before the last word".into()),
            AsmErrKind::BadBlkwAmount     => None,
            AsmErrKind::BadStringz        => Some("try surrounding the string with quotes".into()),
            AsmErrKind::BadStringEscape   => Some("the only supported escapes are \\n and \\\\".into()),
            AsmErrKind::DuplicateSymbol   => Some("labels are case-insensitive and must be unique within a file, try renaming one of the labels".into()),
            AsmErrKind::TrailingTokens    => None,
            AsmErrKind::NumberTooLarge(e) => crate::err::Error::help(e),
            AsmErrKind::SymbolNotFound    => Some("try adding this label before an instruction or directive".into()),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
struct SymbolData {
    addr: u16,
    line: usize,
}

/// The symbol table created in the first assembler pass,
/// mapping each label (case-insensitively) to its address.
#[derive(PartialEq, Eq, Clone, Default)]
pub struct SymbolTable {
    /// A mapping from (uppercased) label to address and line of the label.
    label_map: HashMap<String, SymbolData>,
}

impl SymbolTable {
    /// Creates a new symbol table.
    ///
    /// This performs the first assembler pass, calculating the memory address of
    /// each line and recording the address of every label.
    ///
    /// This pass also validates the block structure of the program:
    /// - every line must be within an `.orig`/`.end` block,
    /// - blocks cannot be nested or left unclosed,
    /// - blocks cannot overlap each other or run past the end of memory.
    ///
    /// ## Example
    /// ```
    /// use lc3_twopass::parse::tokenize;
    /// use lc3_twopass::asm::SymbolTable;
    ///
    /// let src = "
    ///     .orig x3000
    ///     LABEL HALT
    ///     .end
    /// ";
    /// let lines = tokenize(src).unwrap();
    ///
    /// let sym = SymbolTable::new(&lines).unwrap();
    /// assert_eq!(sym.lookup_label("LABEL"), Some(0x3000));
    /// assert_eq!(sym.label_line("label"), Some(3));
    /// ```
    pub fn new(lines: &[LineTokens<'_>]) -> Result<Self, AsmErr> {
        struct Cursor {
            // The current location counter.
            // This is x10000 if the block ends exactly at the end of memory.
            lc: u32,
            // The starting address of the block.
            orig: u16,
            // The line of the .orig directive.
            orig_line: usize,
        }
        impl Cursor {
            fn new(orig: u16, orig_line: usize) -> Self {
                Self { lc: u32::from(orig), orig, orig_line }
            }
            fn addr(&self) -> Result<u16, AsmErrKind> {
                u16::try_from(self.lc).map_err(|_| AsmErrKind::LabelPastMemory)
            }
            /// The memory the block has occupied so far.
            fn span(&self) -> Range<u32> {
                u32::from(self.orig) .. self.lc
            }
            /// Attempts to shift the LC forward by n word locations,
            /// failing if the newly occupied words run past memory or
            /// overlap an already closed block.
            fn shift(&mut self, n: u32, closed: &[Range<u32>]) -> Result<(), AsmErrKind> {
                if n == 0 { return Ok(()); }

                let occupied = self.lc .. self.lc.saturating_add(n);
                if occupied.end > 0x10000 {
                    return Err(AsmErrKind::WrappingBlock);
                }
                if closed.iter().any(|block| ranges_overlap(block.clone(), occupied.clone())) {
                    return Err(AsmErrKind::OverlappingMemory);
                }

                self.lc = occupied.end;
                Ok(())
            }
        }

        fn add_label(
            labels: &mut HashMap<String, SymbolData>,
            label: &str,
            addr: u16,
            line: usize
        ) -> Result<(), AsmErr> {
            match labels.entry(label.to_ascii_uppercase()) {
                Entry::Occupied(_) => Err(AsmErr::new(AsmErrKind::DuplicateSymbol, line)),
                Entry::Vacant(e) => {
                    tracing::trace!(label, line, addr = %Addr(addr), "defined label");
                    e.insert(SymbolData { addr, line });
                    Ok(())
                }
            }
        }

        let _span = tracing::debug_span!("resolve").entered();

        let mut cursor: Option<Cursor> = None;
        let mut closed: Vec<Range<u32>> = vec![];
        let mut label_map = HashMap::new();

        for LineTokens { tokens, line } in lines {
            let line = *line;
            let err = |kind: AsmErrKind| AsmErr::new(kind, line);

            let mut toks = tokens.iter();
            let Some(first) = toks.next() else { continue };

            // Outside of a block, the only valid line is an .orig.
            let cur = match &mut cursor {
                Some(cur) => cur,
                None => {
                    if first.kind != TokenKind::Directive(Directive::Orig) {
                        return Err(err(AsmErrKind::TokenBeforeOrig));
                    }
                    let orig = match toks.next().map(|t| t.kind) {
                        Some(TokenKind::Number(n)) => u16::try_from(n).map_err(|_| err(AsmErrKind::NegativeOrig))?,
                        Some(_) => return Err(err(AsmErrKind::NoOrigNumber)),
                        None    => return Err(err(AsmErrKind::NoMoreTokens)),
                    };

                    tracing::trace!(line, orig = %Addr(orig), "opened block");
                    cursor.replace(Cursor::new(orig, line));
                    continue;
                }
            };

            let mut op = first;
            if first.kind == TokenKind::Text {
                add_label(&mut label_map, first.text, cur.addr().map_err(err)?, line)?;
                match toks.next() {
                    Some(t) => op = t,
                    None => continue,
                }
            }

            let advance = match op.kind {
                TokenKind::Directive(Directive::Orig) => return Err(err(AsmErrKind::OrigInsideOrig)),
                TokenKind::Directive(Directive::End) => {
                    let span = cur.span();
                    tracing::trace!(line, start = %Addr(cur.orig), len = span.len(), "closed block");
                    if !span.is_empty() {
                        closed.push(span);
                    }
                    cursor.take();
                    continue;
                },
                TokenKind::Directive(Directive::Blkw) => match toks.next().map(|t| t.kind) {
                    Some(TokenKind::Number(n)) if n > 0 => n.unsigned_abs(),
                    Some(_) => return Err(err(AsmErrKind::BadBlkwAmount)),
                    None    => return Err(err(AsmErrKind::NoMoreTokens)),
                },
                TokenKind::Directive(Directive::Stringz) => {
                    let (_, text) = stringz_operand(&mut toks).map_err(err)?;
                    u32::try_from(text.len()).map_or(u32::MAX, |n| n.saturating_add(1))
                },
                _ => 1,
            };
            cur.shift(advance, &closed).map_err(err)?;
        }

        if let Some(cur) = cursor {
            return Err(AsmErr::new(AsmErrKind::MissingEnd, cur.orig_line));
        }

        Ok(SymbolTable { label_map })
    }

    /// Gets the memory address of a given label (if it exists).
    ///
    /// Labels are case-insensitive.
    ///
    /// ## Example
    /// ```
    /// use lc3_twopass::parse::tokenize;
    /// use lc3_twopass::asm::SymbolTable;
    ///
    /// let src = "
    ///     .orig x3000
    ///     LOOP  ADD R0, R0, #1
    ///           BR LOOP
    ///     Loop2 ADD R0, R0, #2
    ///           BR LOOP2
    ///     .end
    /// ";
    /// let lines = tokenize(src).unwrap();
    ///
    /// let sym = SymbolTable::new(&lines).unwrap();
    /// assert_eq!(sym.lookup_label("LOOP"), Some(0x3000));
    /// assert_eq!(sym.lookup_label("loop2"), Some(0x3002));
    /// assert_eq!(sym.lookup_label("LOOP_DE_LOOP"), None);
    /// ```
    pub fn lookup_label(&self, label: &str) -> Option<u16> {
        self.label_map.get(&label.to_ascii_uppercase()).map(|sym_data| sym_data.addr)
    }

    /// Gets the label at a given memory address (if it exists).
    ///
    /// If several labels share the address, this is the one defined first in the source.
    /// Labels are stored uppercased, so the returned label is uppercase.
    pub fn rev_lookup_label(&self, addr: u16) -> Option<&str> {
        let (label, _) = self.label_map.iter()
            .filter(|&(_, sym_data)| sym_data.addr == addr)
            .min_by_key(|&(_, sym_data)| sym_data.line)?;

        Some(label)
    }

    /// Gets the source line a given label was defined on (if it exists).
    pub fn label_line(&self, label: &str) -> Option<usize> {
        self.label_map.get(&label.to_ascii_uppercase()).map(|sym_data| sym_data.line)
    }

    /// Gets an iterable of the mapping from labels to addresses.
    ///
    /// Labels are yielded in the order they were defined in the source.
    pub fn label_iter(&self) -> impl Iterator<Item=(&str, u16)> + '_ {
        let mut entries: Vec<_> = self.label_map.iter().collect();
        entries.sort_by_key(|&(_, sym_data)| sym_data.line);

        entries.into_iter()
            .map(|(label, sym_data)| (&**label, sym_data.addr))
    }

    /// The number of labels in the table.
    pub fn len(&self) -> usize {
        self.label_map.len()
    }

    /// Whether the table has no labels.
    pub fn is_empty(&self) -> bool {
        self.label_map.is_empty()
    }
}
impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.label_map.iter().map(|(k, data)| (k, Addr(data.addr))))
            .finish()
    }
}

/// Checks if two ranges overlap.
///
/// This assumes (start <= end) for both ranges.
fn ranges_overlap<T: Ord>(a: Range<T>, b: Range<T>) -> bool {
    let Range { start: a_start, end: a_end } = a;
    let Range { start: b_start, end: b_end } = b;

    // Range not overlapping: a_start >= b_end || b_start >= a_end
    // This is just the inverse.
    a_start < b_end && b_start < a_end
}

/// Reads the `"body"` operand of a `.stringz` directive,
/// returning the body as written and the body with its escapes processed.
fn stringz_operand<'src>(toks: &mut std::slice::Iter<'_, Token<'src>>) -> Result<(&'src str, String), AsmErrKind> {
    let mut expect = |kind: TokenKind| match toks.next() {
        Some(t) if t.kind == kind => Ok(t.text),
        Some(_) => Err(AsmErrKind::BadStringz),
        None    => Err(AsmErrKind::NoMoreTokens),
    };

    expect(TokenKind::Quote)?;
    let raw = expect(TokenKind::Text)?;
    expect(TokenKind::Quote)?;

    let text = unescape(raw).ok_or(AsmErrKind::BadStringEscape)?;
    Ok((raw, text))
}

/// The operands of a line, consumed in order by the second pass.
struct Operands<'t, 'src> {
    tokens: std::slice::Iter<'t, Token<'src>>,
}
impl<'t, 'src> Operands<'t, 'src> {
    fn next(&mut self) -> Result<&'t Token<'src>, AsmErrKind> {
        self.tokens.next().ok_or(AsmErrKind::NoMoreTokens)
    }

    fn comma(&mut self) -> Result<(), AsmErrKind> {
        match self.next()?.kind {
            TokenKind::Comma => Ok(()),
            _ => Err(AsmErrKind::BadToken),
        }
    }

    fn reg(&mut self) -> Result<Reg, AsmErrKind> {
        match self.next()?.kind {
            TokenKind::Reg(r) => Ok(r),
            _ => Err(AsmErrKind::BadToken),
        }
    }

    fn number(&mut self) -> Result<i32, AsmErrKind> {
        match self.next()?.kind {
            TokenKind::Number(n) => Ok(n),
            _ => Err(AsmErrKind::BadToken),
        }
    }

    /// A literal immediate value of N bits.
    fn imm<const N: u32>(&mut self) -> Result<IOffset<N>, AsmErrKind> {
        IOffset::new(self.number()?).map_err(AsmErrKind::NumberTooLarge)
    }

    /// `DR, SR1, SR2|imm5`
    fn alu(&mut self) -> Result<(Reg, Reg, ImmOrReg<5>), AsmErrKind> {
        let dr = self.reg()?;
        self.comma()?;
        let sr1 = self.reg()?;
        self.comma()?;

        let sr2 = match self.next()?.kind {
            TokenKind::Reg(r)    => ImmOrReg::Reg(r),
            TokenKind::Number(n) => ImmOrReg::Imm(IOffset::new(n).map_err(AsmErrKind::NumberTooLarge)?),
            _ => return Err(AsmErrKind::BadToken),
        };

        Ok((dr, sr1, sr2))
    }

    /// `REG, PCoffset9`
    fn reg_pc_offset(&mut self, pc: u16, sym: &SymbolTable) -> Result<(Reg, IOffset<9>), AsmErrKind> {
        let reg = self.reg()?;
        self.comma()?;
        Ok((reg, self.pc_offset(pc, sym)?))
    }

    /// `REG, BaseR, offset6`
    fn reg_base_offset(&mut self) -> Result<(Reg, Reg, IOffset<6>), AsmErrKind> {
        let reg = self.reg()?;
        self.comma()?;
        let base = self.reg()?;
        self.comma()?;
        Ok((reg, base, self.imm()?))
    }

    /// A PC-relative offset of N bits, either as a literal or as a label.
    ///
    /// Labels are converted to an offset relative to `pc`,
    /// the address following the current instruction.
    fn pc_offset<const N: u32>(&mut self, pc: u16, sym: &SymbolTable) -> Result<IOffset<N>, AsmErrKind> {
        let offset = match *self.next()? {
            Token { kind: TokenKind::Number(n), .. } => n,
            Token { kind: TokenKind::Text, text, .. } => {
                let addr = sym.lookup_label(text).ok_or(AsmErrKind::SymbolNotFound)?;
                i32::from(addr) - i32::from(pc)
            },
            _ => return Err(AsmErrKind::BadToken),
        };

        IOffset::new(offset).map_err(AsmErrKind::NumberTooLarge)
    }

    fn finish(&mut self) -> Result<(), AsmErrKind> {
        match self.tokens.next() {
            Some(_) => Err(AsmErrKind::TrailingTokens),
            None => Ok(()),
        }
    }
}

/// Encodes tokenized source lines into instruction records.
///
/// This performs the second assembler pass, using the symbol table
/// from the first pass ([`SymbolTable::new`]) to resolve label operands.
///
/// ## Example
/// ```
/// use lc3_twopass::parse::tokenize;
/// use lc3_twopass::asm::{encode, SymbolTable};
/// use lc3_twopass::ast::asm::Instr;
///
/// let lines = tokenize(".orig x3000\nBR NEXT\nNEXT HALT\n.end").unwrap();
/// let sym = SymbolTable::new(&lines).unwrap();
///
/// let words: Vec<_> = encode(&lines, &sym).unwrap()
///     .iter()
///     .flat_map(Instr::words)
///     .collect();
/// assert_eq!(words, [Some(0x0E00), Some(0xF025)]);
/// ```
pub fn encode<'src>(lines: &[LineTokens<'src>], sym: &SymbolTable) -> Result<Vec<Instr<'src>>, AsmErr> {
    let _span = tracing::debug_span!("encode").entered();

    let mut lc: Option<u16> = None;
    let mut instrs = vec![];

    for LineTokens { tokens, line } in lines {
        let mut ops = Operands { tokens: tokens.iter() };
        let instr = encode_line(&mut ops, lc, sym)
            .and_then(|instr| ops.finish().map(|_| instr))
            .map_err(|kind| AsmErr::new(kind, *line))?;

        if let Some(instr) = instr {
            lc = match &instr {
                Instr::Orig(addr) => Some(*addr),
                Instr::End => None,
                // the first pass ensures blocks do not wrap
                i => lc.map(|addr| addr.wrapping_add(i.word_len() as u16)),
            };
            instrs.push(instr);
        }
    }

    tracing::debug!(len = instrs.len(), "encoded instructions");
    Ok(instrs)
}

fn encode_line<'src>(ops: &mut Operands<'_, 'src>, lc: Option<u16>, sym: &SymbolTable) -> Result<Option<Instr<'src>>, AsmErrKind> {
    let Some(mut op) = ops.tokens.next() else { return Ok(None) };

    let Some(addr) = lc else {
        if op.kind != TokenKind::Directive(Directive::Orig) {
            return Err(AsmErrKind::TokenBeforeOrig);
        }
        let orig = u16::try_from(ops.number()?).map_err(|_| AsmErrKind::NegativeOrig)?;
        return Ok(Some(Instr::Orig(orig)));
    };

    // skip the label
    if op.kind == TokenKind::Text {
        match ops.tokens.next() {
            Some(t) => op = t,
            None => return Ok(None),
        }
    }

    let pc = addr.wrapping_add(1);
    let instr = match op.kind {
        TokenKind::Op(m)  => Instr::Op(encode_op(m, ops, pc, sym)?),
        TokenKind::Br(cc) => Instr::Op(SimInstr::BR(cc, ops.pc_offset(pc, sym)?)),
        TokenKind::Directive(Directive::Orig) => return Err(AsmErrKind::OrigInsideOrig),
        TokenKind::Directive(Directive::End)  => Instr::End,
        TokenKind::Directive(Directive::Fill) => match *ops.next()? {
            // values are within [-32768, 65535], so this keeps their bit pattern
            Token { kind: TokenKind::Number(n), .. } => Instr::Fill(n as u16),
            Token { kind: TokenKind::Text, text, .. } => Instr::Fill(sym.lookup_label(text).ok_or(AsmErrKind::SymbolNotFound)?),
            _ => return Err(AsmErrKind::BadToken),
        },
        TokenKind::Directive(Directive::Blkw) => match ops.number()? {
            n @ 1.. => Instr::Blkw(u16::try_from(n).map_err(|_| AsmErrKind::BadBlkwAmount)?),
            _ => return Err(AsmErrKind::BadBlkwAmount),
        },
        TokenKind::Directive(Directive::Stringz) => {
            let (raw, text) = stringz_operand(&mut ops.tokens)?;
            Instr::Stringz { raw, text }
        },
        TokenKind::Comma | TokenKind::Quote | TokenKind::Number(_) | TokenKind::Reg(_) | TokenKind::Text => {
            return Err(AsmErrKind::BadToken)
        },
    };

    Ok(Some(instr))
}

fn encode_op(m: Mnemonic, ops: &mut Operands<'_, '_>, pc: u16, sym: &SymbolTable) -> Result<SimInstr, AsmErrKind> {
    fn trap(vect: u16) -> SimInstr {
        SimInstr::TRAP(IOffset::new_trunc(vect))
    }

    let instr = match m {
        Mnemonic::ADD => {
            let (dr, sr1, sr2) = ops.alu()?;
            SimInstr::ADD(dr, sr1, sr2)
        },
        Mnemonic::AND => {
            let (dr, sr1, sr2) = ops.alu()?;
            SimInstr::AND(dr, sr1, sr2)
        },
        Mnemonic::JMP  => SimInstr::JMP(ops.reg()?),
        Mnemonic::JSR  => SimInstr::JSR(ImmOrReg::Imm(ops.pc_offset(pc, sym)?)),
        Mnemonic::JSRR => SimInstr::JSR(ImmOrReg::Reg(ops.reg()?)),
        Mnemonic::LD => {
            let (dr, off) = ops.reg_pc_offset(pc, sym)?;
            SimInstr::LD(dr, off)
        },
        Mnemonic::LDI => {
            let (dr, off) = ops.reg_pc_offset(pc, sym)?;
            SimInstr::LDI(dr, off)
        },
        Mnemonic::LEA => {
            let (dr, off) = ops.reg_pc_offset(pc, sym)?;
            SimInstr::LEA(dr, off)
        },
        Mnemonic::ST => {
            let (sr, off) = ops.reg_pc_offset(pc, sym)?;
            SimInstr::ST(sr, off)
        },
        Mnemonic::STI => {
            let (sr, off) = ops.reg_pc_offset(pc, sym)?;
            SimInstr::STI(sr, off)
        },
        Mnemonic::LDR => {
            let (dr, br, off) = ops.reg_base_offset()?;
            SimInstr::LDR(dr, br, off)
        },
        Mnemonic::STR => {
            let (sr, br, off) = ops.reg_base_offset()?;
            SimInstr::STR(sr, br, off)
        },
        Mnemonic::NOT => {
            let dr = ops.reg()?;
            ops.comma()?;
            SimInstr::NOT(dr, ops.reg()?)
        },
        Mnemonic::RTI  => SimInstr::RTI,
        Mnemonic::TRAP => SimInstr::TRAP(ops.imm()?),
        Mnemonic::GETC => trap(0x20),
        Mnemonic::OUT  => trap(0x21),
        Mnemonic::PUTS => trap(0x22),
        Mnemonic::IN   => trap(0x23),
        Mnemonic::HALT => trap(0x25),
        Mnemonic::RET  => SimInstr::RET,
    };

    Ok(instr)
}

/// An object file.
///
/// This is the memory image of a program: a list of blocks,
/// each holding a starting address and the words that follow it.
/// An uninitialized word (from `.blkw`) is represented as `None`.
///
/// This can be created from assembled instructions ([`ObjectFile::new`])
/// or read from the text object format ([`encoding::deserialize`]),
/// and then loaded into the simulator.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ObjectFile {
    /// The blocks of the object file, in the order they were declared.
    blocks: Vec<(u16, Vec<Option<u16>>)>,
}
impl ObjectFile {
    /// Creates an empty object file.
    pub fn empty() -> Self {
        ObjectFile { blocks: vec![] }
    }

    /// Creates the memory image of assembled instructions.
    ///
    /// ```
    /// use lc3_twopass::asm::{assemble_src, ObjectFile};
    ///
    /// let instrs = assemble_src(".orig x3000\n.blkw 1\n.fill 5\n.end").unwrap();
    /// let obj = ObjectFile::new(&instrs);
    ///
    /// let words: Vec<_> = obj.addr_iter().collect();
    /// assert_eq!(words, [(0x3000, None), (0x3001, Some(5))]);
    /// ```
    pub fn new(instrs: &[Instr<'_>]) -> Self {
        let mut obj = ObjectFile::empty();
        let mut current: Option<(u16, Vec<Option<u16>>)> = None;

        for instr in instrs {
            match instr {
                Instr::Orig(addr) => {
                    obj.blocks.extend(current.replace((*addr, vec![])));
                },
                Instr::End => {
                    obj.blocks.extend(current.take());
                },
                instr => if let Some((_, words)) = &mut current {
                    words.extend(instr.words());
                },
            }
        }
        obj.blocks.extend(current);

        obj
    }

    /// Adds a block to the end of the object file.
    pub(crate) fn push_block(&mut self, start: u16, words: Vec<Option<u16>>) {
        self.blocks.push((start, words));
    }

    /// The starting address of the first block (if there is one).
    pub fn origin(&self) -> Option<u16> {
        self.blocks.first().map(|&(start, _)| start)
    }

    /// Get an iterator over all of the blocks of the object file.
    pub fn block_iter(&self) -> impl Iterator<Item=(u16, &[Option<u16>])> {
        self.blocks.iter()
            .map(|(addr, block)| (*addr, block.as_slice()))
    }

    /// Gets an iterator over all of the memory locations defined in the object file.
    pub fn addr_iter(&self) -> impl Iterator<Item=(u16, Option<u16>)> + '_ {
        self.block_iter()
            .flat_map(|(addr, block)| {
                block.iter()
                    .enumerate()
                    .map(move |(i, &v)| (addr.wrapping_add(i as u16), v))
            })
    }
}

/// Used for [`std::fmt::Debug`] and [`std::fmt::Display`] purposes.
#[repr(transparent)]
struct Addr(u16);
impl std::fmt::Debug for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{:04X}", self.0)
    }
}
impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
