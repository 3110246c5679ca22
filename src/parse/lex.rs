//! Tokenizing LC-3 assembly.
//!
//! This module holds the tokens that characterize one line of LC-3 assembly ([`Token`])
//! and the lexer which produces them ([`LineLexer`]).
//!
//! Separators (whitespace and commas) split a line into maximal runs,
//! and each run is classified by [`TokenKind::classify`].
//! Tokens never own their text; they borrow it from the line they were lexed from.

use std::num::IntErrorKind;
use std::ops::Range;

use logos::{Lexer, Logos};

use crate::ast::{CondCode, Reg};

/// The raw units a line is broken into before classification.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f\x0B]+", error = LexErr)]
enum RawToken {
    /// A maximal run of non-separator characters.
    #[regex(r#"[^ \t\r\n\f\x0B,";]+"#, |lx| TokenKind::classify(lx.slice()))]
    Run(TokenKind),

    #[token(",")]
    Comma,

    #[token("\"")]
    Quote,

    #[regex(r";[^\r\n]*")]
    Comment,
}

macro_rules! mnemonic_enum {
    ($($instr:ident),+) => {
        /// An instruction mnemonic (or one of the named trap aliases).
        ///
        /// `BR` is not included here, since it carries its condition flags
        /// (see [`TokenKind::Br`]).
        #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
        pub enum Mnemonic {
            $(
                #[allow(missing_docs)]
                $instr
            ),+
        }

        impl Mnemonic {
            /// Matches a run against the mnemonic table (case-insensitive, exact).
            pub fn lookup(run: &str) -> Option<Self> {
                $(
                    if run.eq_ignore_ascii_case(stringify!($instr)) {
                        return Some(Self::$instr);
                    }
                )+
                None
            }
        }
    };
}
mnemonic_enum! {
    ADD, AND, JMP, JSR, JSRR, LD, LDI, LDR, LEA, NOT, RTI, ST, STI, STR, TRAP,
    GETC, OUT, PUTS, IN, HALT, RET
}

/// An assembler directive (pseudo-op).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Directive {
    /// `.ORIG`
    Orig,
    /// `.FILL`
    Fill,
    /// `.BLKW`
    Blkw,
    /// `.STRINGZ`
    Stringz,
    /// `.END`
    End,
}
impl Directive {
    /// Matches a directive name (without its leading dot), case-insensitively.
    pub fn lookup(name: &str) -> Option<Self> {
        [
            ("ORIG", Directive::Orig),
            ("FILL", Directive::Fill),
            ("BLKW", Directive::Blkw),
            ("STRINGZ", Directive::Stringz),
            ("END", Directive::End),
        ]
        .into_iter()
        .find(|(s, _)| name.eq_ignore_ascii_case(s))
        .map(|(_, d)| d)
    }
}

const BR_VARIANTS: [(&str, CondCode); 8] = [
    ("BR",    0b111),
    ("BRN",   0b100),
    ("BRZ",   0b010),
    ("BRP",   0b001),
    ("BRNZ",  0b110),
    ("BRNP",  0b101),
    ("BRZP",  0b011),
    ("BRNZP", 0b111),
];

/// The type of a [`Token`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum TokenKind {
    /// An instruction mnemonic or trap alias.
    Op(Mnemonic),
    /// A `BR` instruction with its `nzp` flags.
    Br(CondCode),
    /// A directive (e.g., `.ORIG`).
    Directive(Directive),
    /// A comma.
    Comma,
    /// A double quote.
    Quote,
    /// A numeric literal.
    ///
    /// This is always within `[-32768, 65535]`.
    Number(i32),
    /// A register (`R0`-`R7`).
    Reg(Reg),
    /// A label, identifier, or the body of a string literal.
    Text,
}
impl TokenKind {
    /// Classifies a maximal run of non-separator characters.
    ///
    /// In priority order, a run is:
    /// 1. a mnemonic or trap alias,
    /// 2. a `BR` variant,
    /// 3. a directive, if it starts with `.`,
    /// 4. a register, if it is `R` followed by one digit,
    /// 5. a number, if it starts with a digit, `-`, `#`, or `x` followed by a hex digit,
    /// 6. otherwise, text.
    ///
    /// ```
    /// use lc3_twopass::parse::lex::{TokenKind, Mnemonic};
    ///
    /// assert_eq!(TokenKind::classify("add"), Ok(TokenKind::Op(Mnemonic::ADD)));
    /// assert_eq!(TokenKind::classify("BRnz"), Ok(TokenKind::Br(0b110)));
    /// assert_eq!(TokenKind::classify("x3000"), Ok(TokenKind::Number(0x3000)));
    /// assert_eq!(TokenKind::classify("ADDER"), Ok(TokenKind::Text));
    /// ```
    pub fn classify(run: &str) -> Result<Self, LexErr> {
        if let Some(m) = Mnemonic::lookup(run) {
            return Ok(TokenKind::Op(m));
        }
        if let Some(&(_, cc)) = BR_VARIANTS.iter().find(|(s, _)| run.eq_ignore_ascii_case(s)) {
            return Ok(TokenKind::Br(cc));
        }
        if let Some(name) = run.strip_prefix('.') {
            return Directive::lookup(name)
                .map(TokenKind::Directive)
                .ok_or(LexErr::BadPseudoOp);
        }
        if let [b'R' | b'r', digit @ b'0'..=b'9'] = run.as_bytes() {
            return Reg::try_from(digit - b'0')
                .map(TokenKind::Reg)
                .map_err(|_| LexErr::InvalidReg);
        }
        if looks_numeric(run) {
            return parse_int(run).map(TokenKind::Number);
        }

        Ok(TokenKind::Text)
    }
}

fn looks_numeric(run: &str) -> bool {
    let mut chars = run.chars();
    match chars.next() {
        Some('0'..='9' | '-' | '#') => true,
        Some('x' | 'X') => chars.next().is_some_and(|c| c.is_ascii_hexdigit()),
        _ => false,
    }
}

fn parse_int(run: &str) -> Result<i32, LexErr> {
    let (digits, radix) = match run.strip_prefix(['x', 'X']) {
        Some(hex) => (hex, 16),
        None => (run.strip_prefix('#').unwrap_or(run), 10),
    };

    let value = i64::from_str_radix(digits, radix)
        .map_err(|e| match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => LexErr::IntegerTooLarge,
            _ => LexErr::InvalidInteger,
        })?;

    match value {
        -0x8000..=0xFFFF => Ok(value as i32),
        _ => Err(LexErr::IntegerTooLarge),
    }
}

/// A unit of information in one line of LC-3 source code.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Token<'src> {
    /// What this token is.
    pub kind: TokenKind,
    /// The text of the token, borrowed from its line.
    pub text: &'src str,
    /// The byte offset of the token within its line.
    pub start: usize,
}
impl Token<'_> {
    /// The span of the token within its line.
    pub fn span(&self) -> Range<usize> {
        self.start .. (self.start + self.text.len())
    }
}

/// Any errors raised in attempting to tokenize a line.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal has characters which are not digits of its base.
    InvalidInteger,
    /// Numeric literal does not fit in 16 bits (signed or unsigned).
    IntegerTooLarge,
    /// A run starting with `.` is not a known directive.
    BadPseudoOp,
    /// Token had the format R\d, but \d isn't 0-7.
    InvalidReg,
    /// A symbol was used which is not allowed in LC-3 assembly files.
    #[default]
    InvalidSymbol,
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::InvalidInteger  => f.write_str("invalid integer"),
            LexErr::IntegerTooLarge => f.write_str("integer too large"),
            LexErr::BadPseudoOp     => f.write_str("unrecognized pseudo-op"),
            LexErr::InvalidReg      => f.write_str("invalid register"),
            LexErr::InvalidSymbol   => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::InvalidInteger  => Some("a decimal literal only consists of digits 0-9, a hex literal starts with 'x' and consists of 0-9, A-F".into()),
            LexErr::IntegerTooLarge => Some(format!("integer literals must be within [{}, {}]", i16::MIN, u16::MAX).into()),
            LexErr::BadPseudoOp     => Some("valid pseudo-ops are .ORIG, .FILL, .BLKW, .STRINGZ, and .END".into()),
            LexErr::InvalidReg      => Some("this must be R0-R7".into()),
            LexErr::InvalidSymbol   => None,
        }
    }
}

/// A lexer over a single line of LC-3 source code.
///
/// This yields tokens lazily and stops at the first comment or error.
/// It has no way of being reset; a new line requires a new lexer.
///
/// The body of a string literal (everything between its quotes) is yielded as one [`TokenKind::Text`] token,
/// so string literals may contain spaces, commas, and semicolons.
///
/// ```
/// use lc3_twopass::parse::lex::{LineLexer, TokenKind, Directive};
///
/// let kinds: Vec<_> = LineLexer::new(r#"HELLO .stringz "Hi, you" ; greeting"#)
///     .map(|t| t.map(|t| t.kind))
///     .collect::<Result<_, _>>()
///     .unwrap();
///
/// assert_eq!(kinds, [
///     TokenKind::Text,
///     TokenKind::Directive(Directive::Stringz),
///     TokenKind::Quote,
///     TokenKind::Text,
///     TokenKind::Quote,
/// ]);
/// ```
pub struct LineLexer<'src> {
    inner: Lexer<'src, RawToken>,
    quote: QuoteState,
    done: bool,
}
#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Outside,
    Opened,
    Body,
}
impl<'src> LineLexer<'src> {
    /// Creates a new lexer over the given line.
    pub fn new(line: &'src str) -> Self {
        LineLexer { inner: RawToken::lexer(line), quote: QuoteState::Outside, done: false }
    }

    /// Consumes the body of a string literal, up to (but excluding) its closing quote.
    fn string_body(&mut self) -> Token<'src> {
        let rem = self.inner.remainder();
        let start = self.inner.span().end;

        let mut escaped = false;
        let len = rem.char_indices()
            .find(|&(_, c)| match c {
                _ if escaped => { escaped = false; false },
                '\\' => { escaped = true; false },
                c => c == '"' || c == '\n'
            })
            .map_or(rem.len(), |(i, _)| i);

        self.inner.bump(len);
        Token { kind: TokenKind::Text, text: &rem[..len], start }
    }
}
impl<'src> Iterator for LineLexer<'src> {
    type Item = Result<Token<'src>, LexErr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done { return None; }
        if self.quote == QuoteState::Opened {
            self.quote = QuoteState::Body;
            return Some(Ok(self.string_body()));
        }

        let kind = match self.inner.next()? {
            Ok(RawToken::Run(kind)) => kind,
            Ok(RawToken::Comma) => TokenKind::Comma,
            Ok(RawToken::Quote) => {
                self.quote = match self.quote {
                    QuoteState::Outside => QuoteState::Opened,
                    _ => QuoteState::Outside,
                };
                TokenKind::Quote
            },
            Ok(RawToken::Comment) => {
                self.done = true;
                return None;
            },
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            },
        };

        Some(Ok(Token { kind, text: self.inner.slice(), start: self.inner.span().start }))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{R0, R1, R7};
    use crate::err::LexErr;
    use super::{Directive, LineLexer, Mnemonic, Token, TokenKind};

    fn kinds(line: &str) -> Result<Vec<TokenKind>, LexErr> {
        LineLexer::new(line)
            .map(|r| r.map(|t| t.kind))
            .collect()
    }
    fn first(line: &str) -> Result<TokenKind, LexErr> {
        LineLexer::new(line).next().expect("expected a token")
            .map(|t| t.kind)
    }

    #[test]
    fn test_numeric_dec() {
        assert_eq!(kinds("0 123 -456 #789 #-3"), Ok(vec![
            TokenKind::Number(0),
            TokenKind::Number(123),
            TokenKind::Number(-456),
            TokenKind::Number(789),
            TokenKind::Number(-3),
        ]));
    }

    #[test]
    fn test_numeric_hex() {
        assert_eq!(kinds("x3000 XABCD xabcd xA xFFFF"), Ok(vec![
            TokenKind::Number(0x3000),
            TokenKind::Number(0xABCD),
            TokenKind::Number(0xABCD),
            TokenKind::Number(0xA),
            TokenKind::Number(0xFFFF),
        ]));
    }

    #[test]
    fn test_numeric_range() {
        assert_eq!(kinds("65535 -32768"), Ok(vec![TokenKind::Number(65535), TokenKind::Number(-32768)]));

        assert_eq!(first("65536"), Err(LexErr::IntegerTooLarge));
        assert_eq!(first("-32769"), Err(LexErr::IntegerTooLarge));
        assert_eq!(first("x10000"), Err(LexErr::IntegerTooLarge));
        assert_eq!(first("999999999999999999999999999999"), Err(LexErr::IntegerTooLarge));
    }

    #[test]
    fn test_numeric_invalid() {
        assert_eq!(first("3Q"), Err(LexErr::InvalidInteger));
        assert_eq!(first("x0Q"), Err(LexErr::InvalidInteger));
        assert_eq!(first("-"), Err(LexErr::InvalidInteger));
        assert_eq!(first("#"), Err(LexErr::InvalidInteger));
        assert_eq!(first("-x7FFF"), Err(LexErr::InvalidInteger));

        // not numeric, so these are identifiers
        assert_eq!(first("xyz"), Ok(TokenKind::Text));
        assert_eq!(first("x"), Ok(TokenKind::Text));
    }

    #[test]
    fn test_registers() {
        assert_eq!(kinds("R0 r1 R7"), Ok(vec![TokenKind::Reg(R0), TokenKind::Reg(R1), TokenKind::Reg(R7)]));
        assert_eq!(first("R8"), Err(LexErr::InvalidReg));
        assert_eq!(first("R9"), Err(LexErr::InvalidReg));

        // more than one digit is not a register
        assert_eq!(first("R10"), Ok(TokenKind::Text));
        assert_eq!(first("RA"), Ok(TokenKind::Text));
    }

    #[test]
    fn test_mnemonics_exact() {
        assert_eq!(first("add"), Ok(TokenKind::Op(Mnemonic::ADD)));
        assert_eq!(first("Halt"), Ok(TokenKind::Op(Mnemonic::HALT)));
        assert_eq!(first("JSRR"), Ok(TokenKind::Op(Mnemonic::JSRR)));
        assert_eq!(first("ret"), Ok(TokenKind::Op(Mnemonic::RET)));

        // prefixes and extensions of mnemonics are labels
        assert_eq!(first("ADDITION"), Ok(TokenKind::Text));
        assert_eq!(first("LDX"), Ok(TokenKind::Text));
        assert_eq!(first("HAL"), Ok(TokenKind::Text));
        assert_eq!(first("INPUT"), Ok(TokenKind::Text));
    }

    #[test]
    fn test_br_variants() {
        assert_eq!(kinds("BR BRn BRz BRp BRnz BRnp BRzp BRnzp"), Ok(vec![
            TokenKind::Br(0b111),
            TokenKind::Br(0b100),
            TokenKind::Br(0b010),
            TokenKind::Br(0b001),
            TokenKind::Br(0b110),
            TokenKind::Br(0b101),
            TokenKind::Br(0b011),
            TokenKind::Br(0b111),
        ]));

        // flags must be in nzp order
        assert_eq!(first("BRpz"), Ok(TokenKind::Text));
    }

    #[test]
    fn test_directives() {
        assert_eq!(kinds(".orig .FILL .Blkw .stringz .END"), Ok(vec![
            TokenKind::Directive(Directive::Orig),
            TokenKind::Directive(Directive::Fill),
            TokenKind::Directive(Directive::Blkw),
            TokenKind::Directive(Directive::Stringz),
            TokenKind::Directive(Directive::End),
        ]));

        assert_eq!(first(".origin"), Err(LexErr::BadPseudoOp));
        assert_eq!(first(".external"), Err(LexErr::BadPseudoOp));
        assert_eq!(first("."), Err(LexErr::BadPseudoOp));
    }

    #[test]
    fn test_separators_and_comments() {
        assert_eq!(kinds("ADD R0,R0,R1"), Ok(vec![
            TokenKind::Op(Mnemonic::ADD),
            TokenKind::Reg(R0),
            TokenKind::Comma,
            TokenKind::Reg(R0),
            TokenKind::Comma,
            TokenKind::Reg(R1),
        ]));

        assert_eq!(kinds(""), Ok(vec![]));
        assert_eq!(kinds("   \t  "), Ok(vec![]));
        assert_eq!(kinds("; just a comment"), Ok(vec![]));
        assert_eq!(kinds("HALT;done"), Ok(vec![TokenKind::Op(Mnemonic::HALT)]));
        assert_eq!(kinds("HALT ; R8 .bad"), Ok(vec![TokenKind::Op(Mnemonic::HALT)]));
    }

    #[test]
    fn test_string_bodies() {
        let tokens: Vec<_> = LineLexer::new(r#".stringz "a; b, \"c\"" x"#)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1], Token { kind: TokenKind::Quote, text: "\"", start: 9 });
        assert_eq!(tokens[2], Token { kind: TokenKind::Text, text: r#"a; b, \"c\""#, start: 10 });
        assert_eq!(tokens[3].kind, TokenKind::Quote);
        assert_eq!(tokens[4].kind, TokenKind::Text);

        // empty body
        assert_eq!(kinds(r#".stringz """#), Ok(vec![
            TokenKind::Directive(Directive::Stringz),
            TokenKind::Quote,
            TokenKind::Text,
            TokenKind::Quote,
        ]));

        // unclosed body runs to the end of the line
        assert_eq!(kinds(r#".stringz "abc"#), Ok(vec![
            TokenKind::Directive(Directive::Stringz),
            TokenKind::Quote,
            TokenKind::Text,
        ]));
    }

    #[test]
    fn test_spans() {
        let tokens: Vec<_> = LineLexer::new("  LOOP ADD R1, R1, #-1")
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(tokens[0].text, "LOOP");
        assert_eq!(tokens[0].span(), 2..6);
        assert_eq!(tokens[1].span(), 7..10);
        assert_eq!(tokens[6].text, "#-1");
        assert_eq!(tokens[6].kind, TokenKind::Number(-1));
    }

    #[test]
    fn test_error_stops_line() {
        let mut lexer = LineLexer::new("ADD .bad R0");
        assert_eq!(lexer.next().map(|r| r.map(|t| t.kind)), Some(Ok(TokenKind::Op(Mnemonic::ADD))));
        assert_eq!(lexer.next().map(|r| r.map(|t| t.kind)), Some(Err(LexErr::BadPseudoOp)));
        assert_eq!(lexer.next(), None);
    }
}
