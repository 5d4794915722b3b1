//! Registry of open browser contexts keyed by job id.
//!
//! Each job registers its context when it opens one and takes it back out
//! when priming ends. Whatever is still registered at shutdown (a cancelled
//! run) is drained and disposed by the primer.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug)]
pub struct ContextArena<C> {
    contexts: Mutex<HashMap<String, C>>,
}

impl<C> Default for ContextArena<C> {
    fn default() -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
        }
    }
}

impl<C> ContextArena<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `context` as owned by `job_id`. Returns a context the job
    /// already held, which the caller must dispose (contexts are never reused).
    pub fn register(&self, job_id: &str, context: C) -> Option<C> {
        self.contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job_id.to_string(), context)
    }

    /// Removes and returns the context owned by `job_id`.
    pub fn release(&self, job_id: &str) -> Option<C> {
        self.contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(job_id)
    }

    /// Removes and returns every registered context.
    pub fn drain(&self) -> Vec<(String, C)> {
        self.contexts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_release() {
        let arena: ContextArena<u32> = ContextArena::new();
        assert!(arena.register("1", 10).is_none());
        assert!(arena.register("2", 20).is_none());
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.release("1"), Some(10));
        assert_eq!(arena.release("1"), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn re_register_hands_back_old_context() {
        let arena: ContextArena<u32> = ContextArena::new();
        arena.register("1", 10);
        assert_eq!(arena.register("1", 11), Some(10));
        assert_eq!(arena.release("1"), Some(11));
    }

    #[test]
    fn drain_empties_arena() {
        let arena: ContextArena<&str> = ContextArena::new();
        arena.register("a", "ctx-a");
        arena.register("b", "ctx-b");
        let mut drained = arena.drain();
        drained.sort();
        assert_eq!(
            drained,
            vec![("a".to_string(), "ctx-a"), ("b".to_string(), "ctx-b")]
        );
        assert!(arena.is_empty());
    }
}
