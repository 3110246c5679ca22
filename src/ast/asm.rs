//! Assembled instruction records.
//!
//! The second assembler pass produces one [`Instr`] per instruction or directive line.
//! Every operand held here has already been resolved and range-checked,
//! so each record knows exactly which words it occupies in memory.

use super::sim::SimInstr;

/// An assembled instruction or directive.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Instr<'src> {
    /// A machine instruction (one word).
    Op(SimInstr),
    /// `.ORIG addr`, which opens a block at the given address.
    Orig(u16),
    /// `.FILL value`, one word holding the given value.
    Fill(u16),
    /// `.BLKW n`, `n` uninitialized words.
    Blkw(u16),
    /// `.STRINGZ "..."`, one word per byte of the string, followed by a zero word.
    Stringz {
        /// The raw text of the literal's body, as written in source.
        raw: &'src str,
        /// The literal with its escapes processed.
        text: String,
    },
    /// `.END`, which closes the current block.
    End,
}

impl Instr<'_> {
    /// The number of words this record occupies in memory.
    ///
    /// ```
    /// use lc3_twopass::ast::asm::Instr;
    ///
    /// assert_eq!(Instr::Fill(0).word_len(), 1);
    /// assert_eq!(Instr::Blkw(10).word_len(), 10);
    /// assert_eq!(Instr::Stringz { raw: "hi", text: "hi".to_string() }.word_len(), 3);
    /// assert_eq!(Instr::End.word_len(), 0);
    /// ```
    pub fn word_len(&self) -> u32 {
        match self {
            Instr::Op(_) | Instr::Fill(_) => 1,
            Instr::Orig(_) | Instr::End   => 0,
            Instr::Blkw(n) => u32::from(*n),
            // resolution ensures every block fits in memory, so this never saturates in practice
            Instr::Stringz { text, .. } => u32::try_from(text.len()).map_or(u32::MAX, |n| n + 1),
        }
    }

    /// The words this record occupies in memory, in order.
    ///
    /// `None` represents an uninitialized word (from `.BLKW`).
    pub fn words(&self) -> impl Iterator<Item = Option<u16>> + '_ {
        let (single, blkw, string): (Option<u16>, u16, &[u8]) = match self {
            Instr::Op(op)   => (Some(op.encode()), 0, &[]),
            Instr::Fill(v)  => (Some(*v), 0, &[]),
            Instr::Blkw(n)  => (None, *n, &[]),
            Instr::Stringz { text, .. } => (None, 0, text.as_bytes()),
            Instr::Orig(_) | Instr::End => (None, 0, &[]),
        };
        let terminator = matches!(self, Instr::Stringz { .. }).then_some(0);

        single.into_iter().map(Some)
            .chain(std::iter::repeat(None).take(usize::from(blkw)))
            .chain(string.iter().map(|&b| Some(u16::from(b))))
            .chain(terminator.into_iter().map(Some))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::sim::SimInstr;
    use super::Instr;

    #[test]
    fn test_words() {
        let words: Vec<_> = Instr::Op(SimInstr::RET).words().collect();
        assert_eq!(words, [Some(0xC1C0)]);

        let words: Vec<_> = Instr::Blkw(3).words().collect();
        assert_eq!(words, [None, None, None]);

        let words: Vec<_> = Instr::Stringz { raw: r"a\n", text: "a\n".to_string() }.words().collect();
        assert_eq!(words, [Some(0x61), Some(0x0A), Some(0)]);

        let words: Vec<_> = Instr::Stringz { raw: "", text: String::new() }.words().collect();
        assert_eq!(words, [Some(0)]);

        assert_eq!(Instr::Orig(0x3000).words().count(), 0);
        assert_eq!(Instr::End.words().count(), 0);
    }

    #[test]
    fn test_word_len_matches_words() {
        let instrs = [
            Instr::Fill(0xFFFF),
            Instr::Blkw(7),
            Instr::Stringz { raw: r"\\", text: "\\".to_string() },
        ];
        for instr in &instrs {
            assert_eq!(instr.words().count() as u32, instr.word_len());
        }
    }
}
