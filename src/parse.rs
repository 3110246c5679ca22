//! Splitting LC-3 source code into per-line token sequences.
//!
//! The source is handed to the assembler as an ordered sequence of lines
//! (see [`tokenize_lines`] and [`tokenize`]). Each line is tokenized on its own by a [`LineLexer`],
//! and the resulting [`LineTokens`] are consumed read-only by both assembler passes.

pub mod lex;

use self::lex::{LexErr, LineLexer, Token};

/// The tokens of one line of source code, with the line's 1-based number.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LineTokens<'src> {
    /// The tokens of the line, in order.
    pub tokens: Vec<Token<'src>>,
    /// The 1-based source line number.
    pub line: usize,
}
impl<'src> LineTokens<'src> {
    /// Tokenizes one line of source code.
    pub fn new(src: &'src str, line: usize) -> Result<Self, ParseErr> {
        let tokens = LineLexer::new(src)
            .collect::<Result<_, _>>()
            .map_err(|kind| ParseErr { kind, line })?;

        Ok(LineTokens { tokens, line })
    }

    /// Whether this line has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A lexical error, together with the line it occurred on.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ParseErr {
    /// The error that occurred.
    pub kind: LexErr,
    /// The 1-based line it occurred on.
    pub line: usize,
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}
impl std::error::Error for ParseErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
impl crate::err::Error for ParseErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }

    fn help(&self) -> Option<std::borrow::Cow<str>> {
        crate::err::Error::help(&self.kind)
    }
}

/// Tokenizes an ordered sequence of source lines.
///
/// Lines are numbered from 1 in the order they are given.
/// This stops at the first line which fails to tokenize.
///
/// ```
/// use lc3_twopass::parse::tokenize_lines;
///
/// let lines = tokenize_lines([".orig x3000", "", "HALT", ".end"]).unwrap();
/// assert_eq!(lines.len(), 4);
/// assert!(lines[1].is_empty());
/// assert_eq!(lines[2].line, 3);
/// ```
pub fn tokenize_lines<'src, I>(lines: I) -> Result<Vec<LineTokens<'src>>, ParseErr>
    where I: IntoIterator<Item = &'src str>
{
    let _span = tracing::debug_span!("tokenize").entered();

    lines.into_iter()
        .enumerate()
        .map(|(i, src)| LineTokens::new(src, i + 1))
        .collect()
}

/// Tokenizes source code, splitting it into lines.
pub fn tokenize(src: &str) -> Result<Vec<LineTokens<'_>>, ParseErr> {
    tokenize_lines(src.lines())
}

/// Processes the escapes in the body of a string literal.
///
/// Only `\n` and `\\` are accepted. Any other escape (including a trailing `\`)
/// results in `None`.
///
/// ```
/// use lc3_twopass::parse::unescape;
///
/// assert_eq!(unescape(r"a\nb\\c").as_deref(), Some("a\nb\\c"));
/// assert_eq!(unescape(r"\t"), None);
/// ```
pub fn unescape(raw: &str) -> Option<String> {
    let mut buf = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n'  => buf.push('\n'),
                '\\' => buf.push('\\'),
                _    => return None,
            },
            c => buf.push(c),
        }
    }

    Some(buf)
}
