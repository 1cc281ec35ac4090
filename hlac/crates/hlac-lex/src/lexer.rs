//! Column-sensitive lexer and continuation engine.
//!
//! Assembler source is a fixed-column card language. Every physical line
//! goes through the same phases, in order:
//!
//! 1. left ignore zone (columns before BEGIN): one hidden `Ignored` token
//! 2. statement body (BEGIN up to but excluding END): normal tokenization
//! 3. continuation column (END): when non-blank and continuation is
//!    enabled, the logical line continues on the next physical line at
//!    column CONTINUE
//! 4. right ignore zone (END onward when continuation did not fire):
//!    hidden `Ignored`
//!
//! Column boundaries are 1-based card columns, adjustable through the ICTL
//! directive within the documented ranges. Setting END to 80 disables
//! continuation entirely.
//!
//! A continuation emits two hidden `Continuation` tokens: one covering the
//! continuation column (and, in double-byte mode, the shift bytes around
//! it), one covering the continued line's prefix before CONTINUE. The
//! first default-channel token that follows is flagged `after_continuation`
//! for the statement parser.
//!
//! Hidden or not, every consumed character lands in exactly one token, so
//! concatenating all token texts reproduces the source byte for byte.

use std::collections::VecDeque;

use hlac_util::diagnostic::codes;
use hlac_util::span::{Position, Range};
use hlac_util::{Diagnostic, Id};

use crate::cursor::Cursor;
use crate::token::{Channel, Token, TokenKind};

/// Default BEGIN column (1-based).
pub const DEFAULT_BEGIN: usize = 1;
/// Default END column (1-based); this is the continuation column.
pub const DEFAULT_END: usize = 72;
/// Default CONTINUE column (1-based).
pub const DEFAULT_CONTINUE: usize = 16;

/// Record length used when padding AREAD records.
pub const RECORD_LEN: usize = 80;

#[inline]
fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

#[inline]
fn is_divider(c: char) -> bool {
    matches!(
        c,
        '*' | '.' | '-' | '+' | '=' | '<' | '>' | ',' | '(' | ')' | '\'' | '/' | '&' | '|'
    )
}

/// The column-sensitive lexer for one source file.
///
/// Tokens are produced lazily through [`Lexer::next_token`]; the pipeline
/// pulls one logical line at a time and may rewind to a previously seen
/// line (sequence-symbol branches) with [`Lexer::rewind_to_line`].
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    file: Id,

    begin: usize,
    end_default: usize,
    /// Effective END for the current line; differs from `end_default`
    /// only while a double-byte retreat is in effect.
    end: usize,
    cont: usize,
    continuation_enabled: bool,
    dbcs: bool,
    /// Line for which the double-byte END retreat was last computed.
    dbcs_checked_line: usize,

    ictl_seen: bool,
    apostrophes: usize,

    token_start_pos: usize,
    token_start_line: usize,
    token_start_col: usize,
    continuation_pending: bool,

    queue: VecDeque<Token>,
    diags: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `source` with default column boundaries.
    pub fn new(source: &'a str, file: Id) -> Self {
        Self {
            cursor: Cursor::new(source),
            file,
            begin: DEFAULT_BEGIN,
            end_default: DEFAULT_END,
            end: DEFAULT_END,
            cont: DEFAULT_CONTINUE,
            continuation_enabled: true,
            dbcs: false,
            dbcs_checked_line: usize::MAX,
            ictl_seen: false,
            apostrophes: 0,
            token_start_pos: 0,
            token_start_line: 0,
            token_start_col: 0,
            continuation_pending: false,
            queue: VecDeque::new(),
            diags: Vec::new(),
        }
    }

    /// The source this lexer reads.
    pub fn source(&self) -> &'a str {
        self.cursor.source()
    }

    /// The file identifier tokens and diagnostics are attributed to.
    pub fn file(&self) -> Id {
        self.file
    }

    /// Current physical line (0-based).
    pub fn line(&self) -> usize {
        self.cursor.line()
    }

    /// Current byte offset.
    pub fn pos(&self) -> usize {
        self.cursor.pos()
    }

    /// Returns true once the whole input has been tokenized.
    pub fn finished(&self) -> bool {
        self.cursor.is_at_end() && self.queue.is_empty()
    }

    /// Diagnostics produced so far; the caller takes ownership.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diags)
    }

    // -- column boundary management (ICTL) ---------------------------------

    /// Set the BEGIN column. Returns false when out of range.
    pub fn set_begin(&mut self, begin: usize) -> bool {
        if (1..=40).contains(&begin) {
            self.begin = begin;
            true
        } else {
            false
        }
    }

    /// Set the END column. END of 80 disables continuation.
    /// Returns false when out of range.
    pub fn set_end(&mut self, end: usize) -> bool {
        if end == 80 {
            self.continuation_enabled = false;
        }
        if (41..=80).contains(&end) {
            self.end_default = end;
            self.end = end;
            true
        } else {
            false
        }
    }

    /// Set the CONTINUE column. Returns false when out of range or not
    /// past BEGIN.
    pub fn set_continue(&mut self, cont: usize) -> bool {
        if (2..=40).contains(&cont) && self.begin < cont {
            self.cont = cont;
            true
        } else {
            false
        }
    }

    /// Record that an ICTL statement was seen; this extends the window in
    /// which `*PROCESS` statements are recognized by one line.
    pub fn mark_ictl(&mut self) {
        self.ictl_seen = true;
    }

    /// Enable or disable double-byte continuation handling.
    pub fn set_dbcs(&mut self, enabled: bool) {
        self.dbcs = enabled;
        self.dbcs_checked_line = usize::MAX;
    }

    /// Enable or disable continuation explicitly.
    pub fn set_continuation_enabled(&mut self, enabled: bool) {
        self.continuation_enabled = enabled;
    }

    // -- driving -----------------------------------------------------------

    /// Rewind to the start of `line`, dropping any queued tokens.
    pub fn rewind_to_line(&mut self, line: usize) {
        self.cursor.rewind_to_line(line);
        self.queue.clear();
        self.continuation_pending = false;
        self.end = self.end_default;
        self.dbcs_checked_line = usize::MAX;
    }

    /// Consume the next physical record for AREAD: the raw line text
    /// padded with blanks to the record length. `None` at end of input.
    pub fn aread_line(&mut self) -> Option<String> {
        if self.cursor.is_at_end() {
            return None;
        }
        self.queue.clear();
        let mut record = self.cursor.take_rest_of_line().to_owned();
        while record.len() < RECORD_LEN {
            record.push(' ');
        }
        Some(record)
    }

    /// Produce the next token. At end of input this yields a final
    /// `EolLn`/`Eof` pair and then `Eof` forever.
    pub fn next_token(&mut self) -> Token {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return token;
            }

            self.start_token();

            if self.cursor.is_at_end() {
                self.create_token(TokenKind::EolLn, Channel::Default);
                self.create_token(TokenKind::Eof, Channel::Default);
                continue;
            }

            if self.dbcs && self.dbcs_checked_line != self.cursor.line() {
                self.adjust_end_for_dbcs();
            }

            let col = self.cursor.column();
            let Some(c) = self.cursor.current() else {
                continue;
            };

            if col == self.end - 1 && !is_blank(c) && c != '\n' && c != '\r' {
                if self.continuation_enabled {
                    self.lex_continuation();
                } else {
                    self.diags.push(
                        codes::w010(Range::in_line(self.cursor.line(), col, col + 1))
                            .in_file(self.file),
                    );
                    self.lex_end(true);
                }
            } else if col >= self.end - 1 {
                self.lex_end(true);
            } else if col < self.begin - 1 {
                self.lex_begin();
            } else {
                self.lex_body_token();
            }
        }
    }

    // -- token assembly ----------------------------------------------------

    fn start_token(&mut self) {
        self.token_start_pos = self.cursor.pos();
        self.token_start_line = self.cursor.line();
        self.token_start_col = self.cursor.column();
    }

    fn create_token(&mut self, kind: TokenKind, channel: Channel) {
        let start = self.token_start_pos;
        let end = self.cursor.pos();
        // Zero-length tokens are suppressed, except the synthetic
        // end-of-logical-line and end-of-file markers.
        if start == end && kind != TokenKind::EolLn && kind != TokenKind::Eof {
            return;
        }

        let mut after_continuation = false;
        if channel == Channel::Default && self.continuation_pending {
            after_continuation = true;
            self.continuation_pending = false;
        }

        self.queue.push_back(Token {
            kind,
            channel,
            span: (start, end),
            range: Range::new(
                Position::new(self.token_start_line, self.token_start_col),
                Position::new(self.cursor.line(), self.cursor.column()),
            ),
            after_continuation,
        });
    }

    // -- line phases -------------------------------------------------------

    fn lex_begin(&mut self) {
        while let Some(c) = self.cursor.current() {
            if c == '\n' || self.cursor.column() >= self.begin - 1 {
                break;
            }
            self.cursor.advance();
        }
        self.create_token(TokenKind::Ignored, Channel::Hidden);
    }

    fn lex_end(&mut self, emit_eolln: bool) {
        while let Some(c) = self.cursor.current() {
            if c == '\n' {
                break;
            }
            self.cursor.advance();
        }
        self.create_token(TokenKind::Ignored, Channel::Hidden);

        self.start_token();
        if self.cursor.current() == Some('\n') {
            self.cursor.advance();
        }
        if emit_eolln {
            self.create_token(TokenKind::EolLn, Channel::Default);
        } else {
            self.create_token(TokenKind::Ignored, Channel::Hidden);
        }
    }

    fn lex_continuation(&mut self) {
        // Continuation column content, through the default END column so
        // that double-byte shift bytes stay inside the hidden token.
        self.start_token();
        while let Some(c) = self.cursor.current() {
            if c == '\n' || self.cursor.column() > self.end_default - 1 {
                break;
            }
            self.cursor.advance();
        }
        self.end = self.end_default;
        self.create_token(TokenKind::Continuation, Channel::Hidden);

        self.lex_end(false);
        self.lex_begin();

        // Continued line's prefix before the CONTINUE column.
        self.start_token();
        let mut nonblank = None;
        while let Some(c) = self.cursor.current() {
            if c == '\n' || self.cursor.column() >= self.cont - 1 {
                break;
            }
            if !is_blank(c) && nonblank.is_none() {
                nonblank = Some((self.cursor.line(), self.cursor.column()));
            }
            self.cursor.advance();
        }
        if let Some((line, col)) = nonblank {
            self.diags
                .push(codes::w011(Range::in_line(line, col, self.cont - 1)).in_file(self.file));
        }
        self.create_token(TokenKind::Continuation, Channel::Hidden);
        self.continuation_pending = true;
    }

    /// Double-byte mode: the byte one past the END column is taken as a
    /// shift sentinel; END retreats left while the byte at the new END
    /// equals the sentinel, never past BEGIN+1.
    fn adjust_end_for_dbcs(&mut self) {
        self.dbcs_checked_line = self.cursor.line();
        self.end = self.end_default;
        // Column END+1, 0-based index end_default.
        let Some(sentinel) = self.cursor.char_in_line_at_column(self.end_default) else {
            return;
        };
        if is_blank(sentinel) {
            return;
        }
        while self.end > self.begin + 1 {
            // Column END, 0-based index end - 1.
            match self.cursor.char_in_line_at_column(self.end - 1) {
                Some(c) if c == sentinel => self.end -= 1,
                _ => break,
            }
        }
    }

    // -- body tokenization -------------------------------------------------

    fn lex_body_token(&mut self) {
        let col = self.cursor.column();
        let Some(c) = self.cursor.current() else {
            return;
        };
        match c {
            '*' if col == self.begin - 1 => {
                if self.is_process() {
                    self.lex_process();
                } else {
                    self.lex_comment();
                }
            }
            '.' if col == self.begin - 1 && self.cursor.peek(1) == Some('*') => {
                self.lex_comment();
            }
            ' ' | '\t' => self.lex_space(),
            '\r' => {
                self.cursor.advance();
                if self.cursor.current() == Some('\n') {
                    self.cursor.advance();
                }
                self.create_token(TokenKind::EolLn, Channel::Default);
            }
            '\n' => {
                self.cursor.advance();
                self.create_token(TokenKind::EolLn, Channel::Default);
            }
            '\'' => {
                self.apostrophes += 1;
                self.cursor.advance();
                self.create_token(TokenKind::Apostrophe, Channel::Default);
            }
            '*' => self.single(TokenKind::Asterisk),
            '.' => self.single(TokenKind::Dot),
            '-' => self.single(TokenKind::Minus),
            '+' => self.single(TokenKind::Plus),
            '=' => self.single(TokenKind::Equals),
            '<' => self.single(TokenKind::Lt),
            '>' => self.single(TokenKind::Gt),
            ',' => self.single(TokenKind::Comma),
            '(' => self.single(TokenKind::LPar),
            ')' => self.single(TokenKind::RPar),
            '/' => self.single(TokenKind::Slash),
            '&' => self.single(TokenKind::Ampersand),
            '|' => self.single(TokenKind::Vertical),
            _ => self.lex_word(),
        }
    }

    fn single(&mut self, kind: TokenKind) {
        self.cursor.advance();
        self.create_token(kind, Channel::Default);
    }

    fn lex_space(&mut self) {
        while let Some(c) = self.cursor.current() {
            if !is_blank(c) || self.cursor.column() >= self.end - 1 {
                break;
            }
            self.cursor.advance();
        }
        self.create_token(TokenKind::Space, Channel::Default);
    }

    fn lex_word(&mut self) {
        let mut upper = String::new();
        let mut ord = self
            .cursor
            .current()
            .is_some_and(|c| c.is_ascii_alphabetic());

        while let Some(c) = self.cursor.current() {
            if is_blank(c)
                || c == '\n'
                || c == '\r'
                || is_divider(c)
                || self.cursor.column() >= self.end - 1
            {
                break;
            }
            upper.push(c.to_ascii_uppercase());
            ord &= c.is_ascii_alphanumeric();
            self.cursor.advance();
        }

        if upper.len() <= 3 {
            let keyword = match upper.as_str() {
                "OR" => Some(TokenKind::KwOr),
                "AND" => Some(TokenKind::KwAnd),
                "EQ" => Some(TokenKind::KwEq),
                "LE" => Some(TokenKind::KwLe),
                "LT" => Some(TokenKind::KwLt),
                "GT" => Some(TokenKind::KwGt),
                "GE" => Some(TokenKind::KwGe),
                _ => None,
            };
            if let Some(kind) = keyword {
                self.create_token(kind, Channel::Default);
                return;
            }
        }

        if ord && upper.len() <= 63 {
            self.create_token(TokenKind::OrdSymbol, Channel::Default);
        } else {
            self.create_token(TokenKind::Identifier, Channel::Default);
        }
    }

    // -- comments and *PROCESS --------------------------------------------

    fn lex_comment(&mut self) {
        loop {
            self.start_token();
            while let Some(c) = self.cursor.current() {
                if c == '\n' || self.cursor.column() >= self.end - 1 {
                    break;
                }
                self.cursor.advance();
            }

            let at_continuation = self
                .cursor
                .current()
                .is_some_and(|c| c != '\n' && !is_blank(c));
            if at_continuation && self.continuation_enabled {
                self.create_token(TokenKind::Comment, Channel::Hidden);
                self.lex_comment_continuation();
            } else {
                // Rest of the line, newline included, belongs to the
                // comment; no logical line is produced.
                while let Some(c) = self.cursor.current() {
                    if c == '\n' {
                        break;
                    }
                    self.cursor.advance();
                }
                if self.cursor.current() == Some('\n') {
                    self.cursor.advance();
                }
                self.create_token(TokenKind::Comment, Channel::Hidden);
                break;
            }
        }
    }

    /// Continuation inside a comment: same shape as a statement
    /// continuation, but the continued content remains comment text.
    fn lex_comment_continuation(&mut self) {
        self.start_token();
        while let Some(c) = self.cursor.current() {
            if c == '\n' || self.cursor.column() > self.end_default - 1 {
                break;
            }
            self.cursor.advance();
        }
        self.end = self.end_default;
        self.create_token(TokenKind::Continuation, Channel::Hidden);

        self.lex_end(false);
        self.lex_begin();

        self.start_token();
        while let Some(c) = self.cursor.current() {
            if c == '\n' || self.cursor.column() >= self.cont - 1 {
                break;
            }
            self.cursor.advance();
        }
        self.create_token(TokenKind::Continuation, Channel::Hidden);
    }

    /// `*PROCESS` is only recognized at column BEGIN within the first 10
    /// lines of the file (11 once ICTL was seen).
    fn is_process(&self) -> bool {
        let line_limit = if self.ictl_seen { 11 } else { 10 };
        if self.cursor.line() >= line_limit {
            return false;
        }
        "PROCESS"
            .chars()
            .enumerate()
            .all(|(i, expected)| {
                self.cursor
                    .peek(i + 1)
                    .is_some_and(|c| c.to_ascii_uppercase() == expected)
            })
    }

    fn lex_process(&mut self) {
        self.start_token();
        for _ in 0.."*PROCESS".len() {
            self.cursor.advance();
        }
        self.create_token(TokenKind::Process, Channel::Default);

        self.start_token();
        self.lex_space();

        // The option field runs through the END column inclusive; blanks
        // inside strings do not end it.
        self.apostrophes = 0;
        loop {
            let Some(c) = self.cursor.current() else { break };
            if c == '\n' || c == '\r' || self.cursor.column() > self.end - 1 {
                break;
            }
            if self.apostrophes % 2 == 0 && is_blank(c) {
                break;
            }
            self.start_token();
            self.lex_body_token();
        }
        self.lex_end(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut lexer = Lexer::new(source, Id::intern("test.hlasm"));
        let mut tokens = Vec::new();
        loop {
            let t = lexer.next_token();
            let eof = t.kind == TokenKind::Eof;
            tokens.push(t);
            if eof {
                break;
            }
        }
        (tokens, lexer.take_diagnostics())
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens
            .iter()
            .filter(|t| !t.is_hidden())
            .map(|t| t.kind)
            .collect()
    }

    fn reconstruct(source: &str, tokens: &[Token]) -> String {
        tokens.iter().map(|t| t.text(source)).collect()
    }

    #[test]
    fn test_simple_statement() {
        let src = "LABEL    LR    1,2\n";
        let (tokens, diags) = lex_all(src);
        assert!(diags.is_empty());
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::OrdSymbol,
                TokenKind::Space,
                TokenKind::OrdSymbol,
                TokenKind::Space,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Identifier,
                TokenKind::EolLn,
                TokenKind::EolLn,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_round_trip() {
        let src = "LBL   LR  1,2    remark here\n   MORE  'str ''x' stuff\n";
        let (tokens, _) = lex_all(src);
        assert_eq!(reconstruct(src, &tokens), src);
    }

    #[test]
    fn test_comment_line_is_hidden() {
        let src = "* a comment line\n.* a macro comment\n";
        let (tokens, _) = lex_all(src);
        let default: Vec<_> = kinds(&tokens);
        // Comment lines produce no logical line, only the final EolLn/Eof.
        assert_eq!(default, vec![TokenKind::EolLn, TokenKind::Eof]);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Comment));
        assert_eq!(reconstruct(src, &tokens), src);
    }

    #[test]
    fn test_keywords_and_words() {
        let (tokens, _) = lex_all(" EQ LE GT ORX A123456 9ABC\n");
        let k = kinds(&tokens);
        assert_eq!(k[1], TokenKind::KwEq);
        assert_eq!(k[3], TokenKind::KwLe);
        assert_eq!(k[5], TokenKind::KwGt);
        assert_eq!(k[7], TokenKind::OrdSymbol); // ORX
        assert_eq!(k[9], TokenKind::OrdSymbol); // A123456
        assert_eq!(k[11], TokenKind::Identifier); // 9ABC: digit first
    }

    #[test]
    fn test_long_word_is_identifier() {
        let long = "A".repeat(64);
        let (tokens, _) = lex_all(&format!(" {long}\n"));
        assert_eq!(kinds(&tokens)[1], TokenKind::Identifier);

        let ok = "A".repeat(63);
        let (tokens, _) = lex_all(&format!(" {ok}\n"));
        assert_eq!(kinds(&tokens)[1], TokenKind::OrdSymbol);
    }

    fn continuation_source() -> String {
        // 71 columns of content, 'X' in the continuation column 72, then a
        // continued line starting at column 16.
        let mut first = String::from("LBL      LR    1,");
        while first.len() < 71 {
            first.push(' ');
        }
        first.push('X');
        let second = format!("{}2", " ".repeat(15));
        format!("{first}\n{second}\n")
    }

    #[test]
    fn test_continuation_joins_logical_line() {
        let src = continuation_source();
        let (tokens, diags) = lex_all(&src);
        assert!(diags.is_empty(), "{diags:?}");

        let continuations: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Continuation)
            .collect();
        assert_eq!(continuations.len(), 2);

        // Only one logical line: a single EolLn before the EOF pair.
        let eollns = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::EolLn)
            .count();
        assert_eq!(eollns, 2); // statement end + end-of-input marker

        // The "2" on the continued line is flagged after-continuation.
        let two = tokens
            .iter()
            .find(|t| !t.is_hidden() && t.text(&src) == "2")
            .unwrap();
        assert!(two.after_continuation);

        assert_eq!(reconstruct(&src, &tokens), src);
    }

    #[test]
    fn test_continuation_prefix_must_be_blank() {
        let mut src = continuation_source();
        // Poke a non-blank character into column 3 of the continued line.
        let second_line_start = src.find('\n').unwrap() + 1;
        src.replace_range(second_line_start + 2..second_line_start + 3, "Q");
        let (_, diags) = lex_all(&src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "W011");
    }

    #[test]
    fn test_end_80_disables_continuation() {
        let mut src = String::from("         LR    1,2");
        while src.len() < 79 {
            src.push(' ');
        }
        src.push_str("X\n");

        let mut lexer = Lexer::new(&src, Id::intern("t"));
        assert!(lexer.set_end(80));
        let mut tokens = Vec::new();
        loop {
            let t = lexer.next_token();
            let eof = t.kind == TokenKind::Eof;
            tokens.push(t);
            if eof {
                break;
            }
        }
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::Continuation));
        let diags = lexer.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "W010");
    }

    #[test]
    fn test_ictl_setter_ranges() {
        let mut lexer = Lexer::new("", Id::intern("t"));
        assert!(lexer.set_begin(1));
        assert!(lexer.set_begin(40));
        assert!(!lexer.set_begin(0));
        assert!(!lexer.set_begin(41));
        assert!(lexer.set_end(41));
        assert!(!lexer.set_end(40));
        assert!(lexer.set_continue(2));
        assert!(!lexer.set_continue(41));
        lexer.set_begin(30);
        assert!(!lexer.set_continue(30));
        assert!(lexer.set_continue(31));
    }

    #[test]
    fn test_process_recognized_in_first_ten_lines() {
        let src = "*PROCESS RENT\n";
        let (tokens, _) = lex_all(src);
        assert_eq!(kinds(&tokens)[0], TokenKind::Process);
    }

    #[test]
    fn test_process_not_recognized_on_line_eleven() {
        let mut src = String::new();
        for _ in 0..10 {
            src.push_str("* filler\n");
        }
        src.push_str("*PROCESS RENT\n");
        let (tokens, _) = lex_all(&src);
        // Line 11: lexed as a plain comment, not a process statement.
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::Process));
    }

    #[test]
    fn test_process_on_line_eleven_with_ictl() {
        let mut src = String::new();
        for _ in 0..10 {
            src.push_str("* filler\n");
        }
        src.push_str("*PROCESS RENT\n");
        let mut lexer = Lexer::new(&src, Id::intern("t"));
        lexer.mark_ictl();
        let mut found = false;
        loop {
            let t = lexer.next_token();
            if t.kind == TokenKind::Process {
                found = true;
            }
            if t.kind == TokenKind::Eof {
                break;
            }
        }
        assert!(found);
    }

    #[test]
    fn test_dbcs_retreat_stops_at_begin_plus_one() {
        // Sentinel in column 73 with the whole line matching it: END must
        // stop at BEGIN+1 even though the run reaches column 1.
        let src = format!("{}\n", "X".repeat(73));
        let mut lexer = Lexer::new(&src, Id::intern("t"));
        lexer.set_dbcs(true);
        // Drive a token so the per-line adjustment runs.
        let _ = lexer.next_token();
        assert_eq!(lexer.end, lexer.begin + 1);
    }

    #[test]
    fn test_dbcs_sentinel_is_read_past_the_end_column() {
        // Sentinel in column 73, matched by columns 72 and 71 but not 70:
        // END retreats exactly two columns.
        let mut src = " ".repeat(69);
        src.push('A'); // column 70
        src.push_str("\u{0E}\u{0E}\u{0E}"); // columns 71, 72, 73
        src.push('\n');

        let mut lexer = Lexer::new(&src, Id::intern("t"));
        lexer.set_dbcs(true);
        let _ = lexer.next_token();
        assert_eq!(lexer.end, 70);
    }

    #[test]
    fn test_dbcs_no_retreat_without_sentinel_run() {
        // Shift byte in the continuation column itself, nothing in column
        // 73: no sentinel, no retreat; continuation still fires at END.
        let mut src = String::from("LBL      LR    1,");
        while src.len() < 71 {
            src.push(' ');
        }
        src.push('\u{0E}');
        src.push('\n');
        src.push_str(&format!("{}2\n", " ".repeat(15)));

        let mut lexer = Lexer::new(&src, Id::intern("t"));
        lexer.set_dbcs(true);
        let mut tokens = Vec::new();
        loop {
            let t = lexer.next_token();
            let eof = t.kind == TokenKind::Eof;
            tokens.push(t);
            if eof {
                break;
            }
        }
        // Continuation fired in the default column; single logical line.
        assert_eq!(
            tokens
                .iter()
                .filter(|t| t.kind == TokenKind::Continuation)
                .count(),
            2
        );
        let first_cont = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Continuation)
            .unwrap();
        assert_eq!(first_cont.range.start.line, 0);
    }

    #[test]
    fn test_left_ignore_zone() {
        let mut lexer = Lexer::new("xx LR 1,2\n", Id::intern("t"));
        lexer.set_begin(3);
        lexer.set_continue(16);
        let mut tokens = Vec::new();
        loop {
            let t = lexer.next_token();
            let eof = t.kind == TokenKind::Eof;
            tokens.push(t);
            if eof {
                break;
            }
        }
        assert_eq!(tokens[0].kind, TokenKind::Ignored);
        assert_eq!(tokens[0].text(lexer.source()), "xx");
        assert_eq!(reconstruct(lexer.source(), &tokens), lexer.source());
    }

    #[test]
    fn test_aread_line_pads_to_record_length() {
        let mut lexer = Lexer::new("SHORT LINE\nNEXT\n", Id::intern("t"));
        let record = lexer.aread_line().unwrap();
        assert_eq!(record.len(), RECORD_LEN);
        assert!(record.starts_with("SHORT LINE"));
        assert_eq!(lexer.line(), 1);
    }

    #[test]
    fn test_rewind_to_line() {
        let src = " ONE\n TWO\n THREE\n";
        let mut lexer = Lexer::new(src, Id::intern("t"));
        // Consume the first logical line.
        loop {
            if lexer.next_token().kind == TokenKind::EolLn {
                break;
            }
        }
        lexer.rewind_to_line(0);
        let t = loop {
            let t = lexer.next_token();
            if !t.is_hidden() && t.kind != TokenKind::Space {
                break t;
            }
        };
        assert_eq!(t.text(src), "ONE");
    }
}
