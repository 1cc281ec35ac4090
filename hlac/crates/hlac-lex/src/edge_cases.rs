//! Edge case tests for hlac-lex

#[cfg(test)]
mod tests {
    use crate::lexer::Lexer;
    use crate::token::{Token, TokenKind};
    use hlac_util::Id;
    use proptest::prelude::*;

    fn lex_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source, Id::intern("edge.hlasm"));
        let mut tokens = Vec::new();
        loop {
            let t = lexer.next_token();
            let eof = t.kind == TokenKind::Eof;
            tokens.push(t);
            if eof {
                break;
            }
        }
        tokens
    }

    fn reconstruct(source: &str, tokens: &[Token]) -> String {
        tokens.iter().map(|t| t.text(source)).collect()
    }

    /// EDGE CASE: Empty source
    #[test]
    fn test_edge_empty_source() {
        let tokens = lex_all("");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::EolLn, TokenKind::Eof]);
        assert_eq!(reconstruct("", &tokens), "");
    }

    /// EDGE CASE: Single newline
    #[test]
    fn test_edge_single_newline() {
        let tokens = lex_all("\n");
        assert_eq!(reconstruct("\n", &tokens), "\n");
    }

    /// EDGE CASE: Line with only blanks
    #[test]
    fn test_edge_blank_line() {
        let src = "        \n";
        let tokens = lex_all(src);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Space));
        assert_eq!(reconstruct(src, &tokens), src);
    }

    /// EDGE CASE: No trailing newline on the last line
    #[test]
    fn test_edge_no_trailing_newline() {
        let src = "  LR 1,2";
        let tokens = lex_all(src);
        assert_eq!(reconstruct(src, &tokens), src);
    }

    /// EDGE CASE: Statement continued twice
    #[test]
    fn test_edge_double_continuation() {
        let mut line1 = String::from("L1       LR    1,");
        while line1.len() < 71 {
            line1.push(' ');
        }
        line1.push('X');
        let mut line2 = format!("{}2,", " ".repeat(15));
        while line2.len() < 71 {
            line2.push(' ');
        }
        line2.push('X');
        let line3 = format!("{}3", " ".repeat(15));
        let src = format!("{line1}\n{line2}\n{line3}\n");

        let tokens = lex_all(&src);
        let continuations = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Continuation)
            .count();
        assert_eq!(continuations, 4);
        let eollns = tokens.iter().filter(|t| t.kind == TokenKind::EolLn).count();
        assert_eq!(eollns, 2); // one logical line + end-of-input marker
        assert_eq!(reconstruct(&src, &tokens), src);
    }

    /// EDGE CASE: Comment line continued onto a second line
    #[test]
    fn test_edge_comment_continuation() {
        let mut line1 = String::from("* this comment goes on");
        while line1.len() < 71 {
            line1.push('.');
        }
        line1.push('X');
        let src = format!("{line1}\n{}and on\n", " ".repeat(15));

        let tokens = lex_all(&src);
        // Still no logical line from the comment.
        let defaults: Vec<_> = tokens
            .iter()
            .filter(|t| !t.is_hidden())
            .map(|t| t.kind)
            .collect();
        assert_eq!(defaults, vec![TokenKind::EolLn, TokenKind::Eof]);
        assert_eq!(reconstruct(&src, &tokens), src);
    }

    /// EDGE CASE: Apostrophe parity survives statement boundaries
    #[test]
    fn test_edge_apostrophes_span_statements() {
        // Two statements, each with one apostrophe; the counter is only
        // reset when a *PROCESS statement is entered.
        let src = " MNOTE 'A\n MNOTE B'\n";
        let tokens = lex_all(src);
        let apostrophes = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Apostrophe)
            .count();
        assert_eq!(apostrophes, 2);
        assert_eq!(reconstruct(src, &tokens), src);
    }

    proptest! {
        /// Tokenization followed by re-concatenation of token texts
        /// (hidden channel included) reproduces the source exactly.
        #[test]
        fn prop_round_trip(lines in proptest::collection::vec("[ -~]{0,90}", 0..12)) {
            let src = lines.join("\n");
            let tokens = lex_all(&src);
            prop_assert_eq!(reconstruct(&src, &tokens), src);
        }

        /// Same property with tabs sprinkled in.
        #[test]
        fn prop_round_trip_with_tabs(lines in proptest::collection::vec("[ -~\t]{0,80}", 0..8)) {
            let src = lines.join("\n");
            let tokens = lex_all(&src);
            prop_assert_eq!(reconstruct(&src, &tokens), src);
        }

        /// The lexer makes progress and terminates on arbitrary input.
        #[test]
        fn prop_terminates(src in "[ -~\t\n]{0,400}") {
            let tokens = lex_all(&src);
            prop_assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        }
    }
}
