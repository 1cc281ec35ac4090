//! Token definitions.
//!
//! Tokens carry their byte span into the source alongside the line/column
//! range, so the original text of any token (hidden ones included) can be
//! recovered with a slice. Concatenating the text of every token of a file
//! reproduces the file byte for byte.

use hlac_util::span::Range;

/// Token channel.
///
/// Hidden tokens carry continuation, comment, and skipped-column content;
/// the statement parser only looks at the default channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Default,
    Hidden,
}

/// Token kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of blanks inside the statement body.
    Space,
    /// Word that does not qualify as an ordinary symbol.
    Identifier,
    /// Alphanumeric word, alphabetic first, at most 63 characters.
    OrdSymbol,

    // Logical operator keywords (words of length <= 3).
    KwOr,
    KwAnd,
    KwEq,
    KwLe,
    KwLt,
    KwGt,
    KwGe,

    // Single-character tokens.
    Asterisk,
    Minus,
    Plus,
    Lt,
    Gt,
    Equals,
    Comma,
    LPar,
    RPar,
    Apostrophe,
    Slash,
    Ampersand,
    Vertical,
    Dot,

    /// The `*PROCESS` marker at the start of a process statement.
    Process,
    /// Line or macro comment (hidden).
    Comment,
    /// Skipped columns: left ignore, right ignore (hidden).
    Ignored,
    /// Continuation column content and continued-line prefix (hidden).
    Continuation,
    /// End of a logical line. May be zero length at end of input.
    EolLn,
    /// End of input. Always zero length.
    Eof,
}

impl TokenKind {
    /// Returns true for the keyword tokens recognized during word lexing.
    pub fn is_logic_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::KwOr
                | TokenKind::KwAnd
                | TokenKind::KwEq
                | TokenKind::KwLe
                | TokenKind::KwLt
                | TokenKind::KwGt
                | TokenKind::KwGe
        )
    }
}

/// A lexed token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub channel: Channel,
    /// Byte span into the lexed source.
    pub span: (usize, usize),
    /// Line/column range of the token.
    pub range: Range,
    /// True for the first default-channel token after a continuation;
    /// the statement parser uses this to recognize split operands.
    pub after_continuation: bool,
}

impl Token {
    /// The token's text, sliced from the source it was lexed from.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.0..self.span.1]
    }

    /// Returns true if the token is on the hidden channel.
    pub fn is_hidden(&self) -> bool {
        self.channel == Channel::Hidden
    }
}
