//! Tracks the chain of fields currently being evaluated on one context.

use crate::error::FieldError;
use crate::key::FieldKey;

/// The keys whose evaluation is in progress, outermost first.
///
/// Every context owns one. The evaluation pipeline enters a key before
/// running its compute routine and exits afterwards, so a key that is
/// requested while already on the stack is a dependency cycle.
#[derive(Clone, Debug, Default)]
pub struct EvaluationStack {
    keys: Vec<FieldKey>,
}

impl EvaluationStack {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `key`, failing with [`FieldError::CyclicDependency`] if it is
    /// already being evaluated.
    pub fn enter(&mut self, key: &FieldKey) -> Result<(), FieldError> {
        if let Some(pos) = self.keys.iter().position(|k| k == key) {
            let mut chain = self.keys[pos..].to_vec();
            chain.push(key.clone());
            return Err(FieldError::CyclicDependency { chain });
        }
        self.keys.push(key.clone());
        Ok(())
    }

    /// Pop `key`. Keys above it (left behind by an early return) go too.
    pub fn exit(&mut self, key: &FieldKey) {
        if let Some(pos) = self.keys.iter().rposition(|k| k == key) {
            self.keys.truncate(pos);
        }
    }

    /// Whether `key` is being evaluated.
    pub fn contains(&self, key: &FieldKey) -> bool {
        self.keys.contains(key)
    }

    /// Nesting depth.
    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing is being evaluated.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in evaluation order, outermost first.
    pub fn chain(&self) -> &[FieldKey] {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_exit_nesting() {
        let a = FieldKey::new("gas", "a");
        let b = FieldKey::new("gas", "b");
        let mut stack = EvaluationStack::new();
        stack.enter(&a).unwrap();
        stack.enter(&b).unwrap();
        assert_eq!(stack.depth(), 2);
        assert!(stack.contains(&a));
        stack.exit(&b);
        stack.exit(&a);
        assert!(stack.is_empty());
    }

    #[test]
    fn reentry_reports_the_cycle() {
        let a = FieldKey::new("gas", "a");
        let b = FieldKey::new("gas", "b");
        let c = FieldKey::new("gas", "c");
        let mut stack = EvaluationStack::new();
        stack.enter(&a).unwrap();
        stack.enter(&b).unwrap();
        stack.enter(&c).unwrap();
        match stack.enter(&b) {
            Err(FieldError::CyclicDependency { chain }) => {
                assert_eq!(chain, vec![b.clone(), c.clone(), b.clone()]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(stack.depth(), 3);
    }

    #[test]
    fn exit_unwinds_abandoned_entries() {
        let a = FieldKey::new("gas", "a");
        let b = FieldKey::new("gas", "b");
        let mut stack = EvaluationStack::new();
        stack.enter(&a).unwrap();
        stack.enter(&b).unwrap();
        stack.exit(&a);
        assert!(stack.is_empty());
    }
}
