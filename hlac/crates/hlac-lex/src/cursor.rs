//! Character cursor with card-column accounting.
//!
//! This module provides the `Cursor` struct which maintains position state
//! while iterating through source code characters. Unlike a plain text
//! cursor it tracks the *column* of the current character the way the
//! assembler counts card columns: 0-based, reset at every physical line,
//! with tabs widened to a fixed width.

/// Number of columns a tab occupies in column accounting.
pub const TAB_SIZE: usize = 4;

/// A cursor for traversing source code character by character.
///
/// The cursor maintains the byte position, 0-based line, and 0-based
/// column of the current character. Line start offsets are precomputed so
/// the pipeline can rewind to any line in O(1).
///
/// # Example
///
/// ```
/// use hlac_lex::cursor::Cursor;
///
/// let mut cursor = Cursor::new("LABEL    LR 1,2");
/// assert_eq!(cursor.current(), Some('L'));
/// cursor.advance();
/// assert_eq!(cursor.column(), 1);
/// ```
pub struct Cursor<'a> {
    /// The source text being traversed.
    source: &'a str,

    /// Current byte position in the source.
    pos: usize,

    /// Current line number (0-based).
    line: usize,

    /// Current column number (0-based, tab-widened).
    column: usize,

    /// Byte offset of the start of each line.
    line_offsets: Vec<usize>,
}

impl<'a> Cursor<'a> {
    /// Creates a new cursor at the start of `source`.
    pub fn new(source: &'a str) -> Self {
        let mut line_offsets = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_offsets.push(i + 1);
            }
        }
        Self {
            source,
            pos: 0,
            line: 0,
            column: 0,
            line_offsets,
        }
    }

    /// The full source text.
    #[inline]
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Current byte position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Current line (0-based).
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Current column (0-based, tab-widened).
    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Number of physical lines in the source.
    #[inline]
    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    /// Returns true once every character has been consumed.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// The character under the cursor, or `None` at end of input.
    #[inline]
    pub fn current(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    /// The character `offset` characters ahead of the cursor.
    pub fn peek(&self, offset: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(offset)
    }

    /// The character at 0-based column `column` of the current line.
    ///
    /// Used by the double-byte continuation check, which inspects fixed
    /// columns of the line the cursor stands on.
    pub fn char_in_line_at_column(&self, column: usize) -> Option<char> {
        let start = self.line_offsets[self.line.min(self.line_offsets.len() - 1)];
        let mut col = 0;
        for c in self.source[start..].chars() {
            if c == '\n' {
                return None;
            }
            if col == column {
                return Some(c);
            }
            col += if c == '\t' { TAB_SIZE } else { 1 };
            if col > column {
                // A tab jumped over the requested column.
                return Some('\t');
            }
        }
        None
    }

    /// Advances the cursor to the next character, updating line/column.
    pub fn advance(&mut self) {
        let Some(c) = self.current() else {
            return;
        };
        self.pos += c.len_utf8();
        match c {
            '\n' => {
                self.line += 1;
                self.column = 0;
            }
            '\t' => self.column += TAB_SIZE,
            _ => self.column += 1,
        }
    }

    /// Rewinds the cursor to the start of `line`.
    ///
    /// Lines past the end of the source rewind to end of input.
    pub fn rewind_to_line(&mut self, line: usize) {
        if line >= self.line_offsets.len() {
            self.pos = self.source.len();
            self.line = self.line_offsets.len().saturating_sub(1);
            self.column = 0;
            return;
        }
        self.pos = self.line_offsets[line];
        self.line = line;
        self.column = 0;
    }

    /// Consumes the rest of the current physical line including its
    /// newline, returning the line content without the newline.
    pub fn take_rest_of_line(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.current() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        let mut end = self.pos;
        if end > start && self.source.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        if self.current() == Some('\n') {
            self.advance();
        }
        &self.source[start..end]
    }
}
