//! hlac-lex - Column-Sensitive Lexical Analyzer
//!
//! Assembler source is not free-form text: every physical line is a card
//! image with a fixed begin column, a fixed end column, and a continuation
//! convention that glues physical lines into logical lines. The lexer in
//! this crate owns all of that column arithmetic, so later phases only see
//! a flat token stream per logical line.
//!
//! The output preserves the input exactly: skipped columns, comments, and
//! continuation machinery are emitted as hidden-channel tokens, and the
//! concatenation of all token texts reproduces the source byte for byte.

pub mod cursor;
pub mod lexer;
pub mod token;

mod edge_cases;

pub use cursor::Cursor;
pub use lexer::{Lexer, DEFAULT_BEGIN, DEFAULT_CONTINUE, DEFAULT_END, RECORD_LEN};
pub use token::{Channel, Token, TokenKind};
