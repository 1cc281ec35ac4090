//! Character scanner over a flattened operand field.
//!
//! Reparsing works on the operand field as plain text: continuations were
//! already flattened by the lexer, so the field is one string. The
//! [`RangeProvider`] maps character offsets within that string back to
//! source ranges; after macro substitution the mapping goes through the
//! recorded per-operand pieces, since the substituted text no longer
//! matches source columns.

use hlac_util::span::{Position, Range};

/// Maps reparsed character offsets back to original source columns.
#[derive(Clone, Debug)]
pub enum RangeProvider {
    /// The field text sits verbatim in the source starting at `base`.
    Simple { base: Position },
    /// The field was reassembled from pieces (macro operand re-split
    /// after substitution): each piece knows its original range.
    Pieces {
        /// (start offset, end offset, original range) per piece.
        pieces: Vec<(usize, usize, Range)>,
    },
}

impl RangeProvider {
    pub fn simple(base: Position) -> Self {
        RangeProvider::Simple { base }
    }

    /// Range of the whole field.
    pub fn whole(&self, len: usize) -> Range {
        self.adjust(0, len)
    }

    /// Map the character interval `[start, end)` to a source range.
    pub fn adjust(&self, start: usize, end: usize) -> Range {
        match self {
            RangeProvider::Simple { base } => Range::new(
                Position::new(base.line, base.column + start),
                Position::new(base.line, base.column + end),
            ),
            RangeProvider::Pieces { pieces } => {
                let find = |offset: usize| {
                    pieces
                        .iter()
                        .find(|(s, e, _)| *s <= offset && offset < *e)
                        .or_else(|| pieces.last())
                        .map(|(_, _, r)| *r)
                        .unwrap_or_default()
                };
                let first = find(start);
                let last = find(end.saturating_sub(1));
                first.union(last)
            }
        }
    }
}

/// Scanner over the characters of one field.
pub struct Scanner<'a> {
    chars: Vec<char>,
    pos: usize,
    provider: &'a RangeProvider,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &str, provider: &'a RangeProvider) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            provider,
        }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    #[inline]
    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    #[inline]
    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Reset the scanner to a previously saved position.
    #[inline]
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Consume `c` if it is next; returns whether it was.
    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    /// Consume a run of characters matching `pred`, returning its text.
    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Consume an assembler word: alphanumerics plus the national
    /// characters `@#$` and underscore.
    pub fn take_word(&mut self) -> String {
        self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '#' | '$' | '_'))
    }

    /// Map a character interval to a source range.
    pub fn range(&self, start: usize, end: usize) -> Range {
        self.provider.adjust(start, end)
    }

    /// Range of the single character at `pos`.
    pub fn range_at(&self, pos: usize) -> Range {
        self.provider.adjust(pos, pos + 1)
    }

    /// Text of a previously scanned interval.
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end.min(self.chars.len())].iter().collect()
    }
}

/// Returns true when the apostrophe at `i` introduces an attribute
/// reference (`L'SYM`) rather than opening a string: the previous
/// character must be an attribute letter that is itself preceded by a
/// non-alphanumeric character, and the quote must be followed by
/// something that can start an attribute operand.
pub fn is_attribute_quote(chars: &[char], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    let attr = chars[i - 1].to_ascii_uppercase();
    if !matches!(attr, 'T' | 'L' | 'S' | 'I' | 'K' | 'N' | 'D' | 'O') {
        return false;
    }
    if i >= 2 {
        let before = chars[i - 2];
        if before.is_ascii_alphanumeric() || matches!(before, '@' | '#' | '$' | '_' | '&') {
            return false;
        }
    }
    matches!(
        chars.get(i + 1),
        Some(c) if c.is_ascii_alphanumeric() || matches!(c, '&' | '@' | '#' | '$' | '_' | '*' | '=')
    )
}
