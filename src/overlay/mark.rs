use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::{Arc, Weak};

/// Mutation-tracking state shared by every mutable collection.
///
/// The flag is monotonic: once a collection has diverged from its encoded
/// source it stays dirty until the collection is rebuilt from scratch. The
/// parent link is a [`Weak`] used only for the one-way dirtiness
/// notification; it never participates in ownership, so parent/child cycles
/// are impossible by construction.
#[derive(Debug)]
pub(crate) struct Mark {
    mutated: AtomicBool,
    parent: Weak<Mark>,
}

impl Mark {
    /// A mark for a root collection with no enclosing parent.
    pub fn root() -> Arc<Mark> {
        Arc::new(Mark {
            mutated: AtomicBool::new(false),
            parent: Weak::new(),
        })
    }

    /// A mark bound to its enclosing collection. Binding happens exactly
    /// once, at construction.
    pub fn child(parent: &Arc<Mark>) -> Arc<Mark> {
        Arc::new(Mark {
            mutated: AtomicBool::new(false),
            parent: Arc::downgrade(parent),
        })
    }

    /// Flags this collection as diverged. Only the false-to-true transition
    /// notifies the parent, so re-dirtying an already-dirty chain is O(1).
    pub fn mutate(&self) {
        if !self.mutated.swap(true, Relaxed) {
            if let Some(parent) = self.parent.upgrade() {
                parent.mutate();
            }
        }
    }

    pub fn is_mutated(&self) -> bool {
        self.mutated.load(Relaxed)
    }
}
