//! The open-code provider.
//!
//! Drives the lexer and initial-mode parser over the top-level source.
//! Supports rewinding to a prior position (lookahead completion, backward
//! AGO into open code), AINSERT record injection ahead of the file input,
//! and AREAD raw-record consumption.
//!
//! ICTL is applied here, before any statement is produced, and `*PROCESS`
//! statements are validated and consumed here; neither reaches the
//! processors.

use std::collections::VecDeque;
use std::sync::Arc;

use hlac_conf::validate_process_option;
use hlac_ctx::source_ctx::SourcePosition;
use hlac_ctx::HlasmContext;
use hlac_lex::{Lexer, Token, TokenKind};
use hlac_par::statement::Statement;
use hlac_par::{parse_logical_line, ParsedLine};
use hlac_util::diagnostic::codes;
use hlac_util::span::Location;
use hlac_util::Id;

use crate::processor::Processor;

use super::{resolve_via_cache, CacheSlot};

/// One queued AINSERT record with its generation tag.
#[derive(Debug)]
struct AinsertRecord {
    text: String,
    generation: usize,
}

pub struct OpencodeProvider<'t> {
    lexer: Lexer<'t>,
    file: Id,
    ainsert_front: VecDeque<AinsertRecord>,
    ainsert_back: VecDeque<AinsertRecord>,
    /// ICTL is only honored before the first produced statement.
    produced_any: bool,
}

impl<'t> OpencodeProvider<'t> {
    pub fn new(text: &'t str, file: Id) -> Self {
        Self {
            lexer: Lexer::new(text, file),
            file,
            ainsert_front: VecDeque::new(),
            ainsert_back: VecDeque::new(),
            produced_any: false,
        }
    }

    pub fn set_dbcs(&mut self, enabled: bool) {
        self.lexer.set_dbcs(enabled);
    }

    pub fn finished(&self) -> bool {
        self.lexer.finished() && self.ainsert_front.is_empty() && self.ainsert_back.is_empty()
    }

    /// Rewind the file input to a prior statement position.
    pub fn rewind_input(&mut self, position: SourcePosition) {
        self.lexer.rewind_to_line(position.file_line);
    }

    /// Queue a record ahead of the file input.
    pub fn ainsert(&mut self, record: String, back: bool, generation: usize) {
        let entry = AinsertRecord {
            text: record,
            generation,
        };
        if back {
            self.ainsert_back.push_back(entry);
        } else {
            self.ainsert_front.push_back(entry);
        }
    }

    /// Consume the next raw input record (AINSERT buffers first, then the
    /// file), blank-padded to the record length.
    pub fn aread(&mut self) -> String {
        if let Some(entry) = self
            .ainsert_front
            .pop_front()
            .or_else(|| self.ainsert_back.pop_front())
        {
            let mut text = entry.text;
            while text.len() < hlac_lex::RECORD_LEN {
                text.push(' ');
            }
            return text;
        }
        self.lexer.aread_line().unwrap_or_default()
    }

    pub fn get_next(
        &mut self,
        ctx: &mut HlasmContext,
        processor: &Processor,
    ) -> Option<Statement> {
        loop {
            if let Some(entry) = self
                .ainsert_front
                .pop_front()
                .or_else(|| self.ainsert_back.pop_front())
            {
                if let Some(stmt) = self.lex_inserted_record(ctx, processor, entry) {
                    return Some(stmt);
                }
                continue;
            }

            if self.lexer.finished() {
                return None;
            }

            let begin_line = self.lexer.line();
            let begin_index = self.lexer.pos();
            let tokens = self.read_logical_line();
            for d in self.lexer.take_diagnostics() {
                ctx.add_diagnostic(d);
            }

            match parse_logical_line(self.lexer.source(), &tokens) {
                ParsedLine::Empty => continue,
                ParsedLine::Process { options, .. } => {
                    for (option, range) in options {
                        if !validate_process_option(&option) {
                            ctx.add_diagnostic(codes::a109(&option, range).in_file(self.file));
                        }
                    }
                    continue;
                }
                ParsedLine::Statement(stmt) => {
                    if !self.produced_any && instruction_is_ictl(&stmt) {
                        self.apply_ictl(ctx, &stmt);
                        continue;
                    }
                    self.produced_any = true;

                    ctx.source.begin_line = begin_line;
                    ctx.source.begin_index = begin_index;
                    ctx.source.end_line = self.lexer.line();
                    ctx.source.end_index = self.lexer.pos();
                    ctx.source.current_instruction =
                        Location::new(self.file, stmt.instruction.range().start);

                    return Some(resolve_via_cache(
                        ctx,
                        processor,
                        Arc::new(stmt),
                        CacheSlot::None,
                    ));
                }
            }
        }
    }

    fn read_logical_line(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.lexer.next_token();
            let stop = matches!(token.kind, TokenKind::EolLn | TokenKind::Eof);
            tokens.push(token);
            if stop {
                return tokens;
            }
        }
    }

    fn lex_inserted_record(
        &mut self,
        ctx: &mut HlasmContext,
        processor: &Processor,
        entry: AinsertRecord,
    ) -> Option<Statement> {
        // Records get a synthetic file so diagnostics trace back to the
        // inserting statement's generation.
        let file = Id::intern(&format!("AINSERT:{}", entry.generation));
        let mut lexer = Lexer::new(&entry.text, file);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let stop = matches!(token.kind, TokenKind::EolLn | TokenKind::Eof);
            tokens.push(token);
            if stop {
                break;
            }
        }
        for d in lexer.take_diagnostics() {
            ctx.add_diagnostic(d);
        }
        match parse_logical_line(&entry.text, &tokens) {
            ParsedLine::Statement(stmt) => Some(resolve_via_cache(
                ctx,
                processor,
                Arc::new(stmt),
                CacheSlot::None,
            )),
            _ => None,
        }
    }

    fn apply_ictl(&mut self, ctx: &mut HlasmContext, stmt: &hlac_par::DeferredStatement) {
        let range = stmt.deferred_range;
        let field = stmt
            .deferred_text
            .split_whitespace()
            .next()
            .unwrap_or_default();
        let mut values = field.split(',').map(|p| p.trim().parse::<usize>());

        let begin = values.next();
        let end = values.next();
        let cont = values.next();

        let mut ok = true;
        match begin {
            Some(Ok(b)) => ok &= self.lexer.set_begin(b),
            _ => ok = false,
        }
        if let Some(e) = end {
            match e {
                Ok(e) => ok &= self.lexer.set_end(e),
                Err(_) => ok = false,
            }
        }
        if let Some(c) = cont {
            match c {
                Ok(c) => ok &= self.lexer.set_continue(c),
                Err(_) => ok = false,
            }
        }
        if !ok {
            ctx.add_diagnostic(codes::a021(range).in_file(self.file));
        }
        self.lexer.mark_ictl();
    }
}

fn instruction_is_ictl(stmt: &hlac_par::DeferredStatement) -> bool {
    stmt.instruction
        .name()
        .is_some_and(|n| n.as_str() == "ICTL")
}
