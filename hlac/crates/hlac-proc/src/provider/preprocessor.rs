//! The preprocessor provider.
//!
//! A plugin-side preprocessor runs over the document (asynchronously; this is
//! one of the pipeline's suspension points) and synthesizes statements
//! that surface here before the assembler proper sees any input.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use hlac_par::statement::{PreprocStatement, Statement};

/// A plugin-side preprocessor. The pipeline only knows this callback
/// contract; DB2/CICS/Endevor semantics live on the plugin side.
#[async_trait(?Send)]
pub trait Preprocessor {
    fn name(&self) -> &'static str;

    /// Scan the document and synthesize statements.
    async fn generate(&mut self, document: &str) -> Vec<PreprocStatement>;
}

/// Surfaces synthesized statements ahead of the assembler.
#[derive(Debug, Default)]
pub struct PreprocessorProvider {
    queue: VecDeque<Arc<PreprocStatement>>,
}

impl PreprocessorProvider {
    pub fn new(statements: Vec<PreprocStatement>) -> Self {
        Self {
            queue: statements.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn finished(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn get_next(&mut self) -> Option<Statement> {
        self.queue.pop_front().map(Statement::Preproc)
    }
}
