//! Statement cache.
//!
//! Macro and copy member bodies are stored as deferred statements; each
//! carries a cache memoizing its reparses keyed by (form, occurrence).
//! The cache is never invalidated: (deferred text, format) to operands is
//! a pure function. Statements whose operand text contains variable
//! references bypass the cache, since their substituted text differs per
//! expansion.

use std::sync::Arc;

use hlac_par::form::{OperandOccurrence, ProcessingForm};
use hlac_par::statement::{DeferredStatement, ResolvedStatement};

type CacheKey = (ProcessingForm, OperandOccurrence);

/// A deferred statement plus its memoized reparses.
#[derive(Clone, Debug)]
pub struct CachedStatement {
    base: Arc<DeferredStatement>,
    cache: Vec<(CacheKey, Arc<ResolvedStatement>)>,
}

impl CachedStatement {
    pub fn new(base: Arc<DeferredStatement>) -> Self {
        Self {
            base,
            cache: Vec::new(),
        }
    }

    pub fn base(&self) -> &Arc<DeferredStatement> {
        &self.base
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        self.cache.iter().any(|(k, _)| *k == key)
    }

    pub fn get(&self, key: CacheKey) -> Option<&Arc<ResolvedStatement>> {
        self.cache.iter().find(|(k, _)| *k == key).map(|(_, s)| s)
    }

    pub fn insert(&mut self, key: CacheKey, statement: Arc<ResolvedStatement>) {
        if !self.contains(key) {
            self.cache.push((key, statement));
        }
    }

    /// Number of distinct formats cached so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// A block of cached statements: a macro or copy member body.
pub type CachedBlock = Vec<CachedStatement>;

#[cfg(test)]
mod tests {
    use super::*;
    use hlac_par::form::{ProcessingFormat, ProcessingKind};
    use hlac_par::operand::Operands;
    use hlac_par::statement::{InstructionField, Label};
    use hlac_util::span::Range;

    fn deferred(text: &str) -> Arc<DeferredStatement> {
        Arc::new(DeferredStatement {
            label: Label::Empty,
            instruction: InstructionField::Empty(Range::default()),
            deferred_text: text.to_owned(),
            deferred_range: Range::default(),
            stmt_range: Range::default(),
        })
    }

    fn resolved(format: ProcessingFormat) -> Arc<ResolvedStatement> {
        Arc::new(ResolvedStatement {
            label: Label::Empty,
            instruction: InstructionField::Empty(Range::default()),
            operands: Operands::default(),
            remarks: Vec::new(),
            stmt_range: Range::default(),
            format,
            parse_diags: Vec::new(),
        })
    }

    #[test]
    fn test_insert_and_get() {
        let mut cached = CachedStatement::new(deferred("1,2"));
        let fmt = ProcessingFormat::new(ProcessingKind::Ordinary, ProcessingForm::Mach);
        let key = fmt.reparse_key();
        assert!(!cached.contains(key));

        cached.insert(key, resolved(fmt));
        assert!(cached.contains(key));
        assert!(cached.get(key).is_some());
    }

    #[test]
    fn test_multiple_formats_coexist() {
        let mut cached = CachedStatement::new(deferred("A,B"));
        for form in [ProcessingForm::Mach, ProcessingForm::AsmGeneric, ProcessingForm::Ca] {
            let fmt = ProcessingFormat::new(ProcessingKind::Ordinary, form);
            cached.insert(fmt.reparse_key(), resolved(fmt));
        }
        assert_eq!(cached.len(), 3);
        for form in [ProcessingForm::Mach, ProcessingForm::AsmGeneric, ProcessingForm::Ca] {
            let fmt = ProcessingFormat::new(ProcessingKind::Ordinary, form);
            assert!(cached.get(fmt.reparse_key()).is_some());
        }
    }

    #[test]
    fn test_insert_does_not_replace() {
        let mut cached = CachedStatement::new(deferred("X"));
        let fmt = ProcessingFormat::new(ProcessingKind::Ordinary, ProcessingForm::Mach);
        let first = resolved(fmt);
        cached.insert(fmt.reparse_key(), Arc::clone(&first));
        cached.insert(fmt.reparse_key(), resolved(fmt));
        assert_eq!(cached.len(), 1);
        assert!(Arc::ptr_eq(cached.get(fmt.reparse_key()).unwrap(), &first));
    }
}
