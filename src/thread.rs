//! Thread descriptors and their lifecycle states.

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::scheduler::Yielder;
use crate::stack::Stack;
use std::fmt;

/// Body of a uthread. Captures its own argument.
pub(crate) type EntryFn = Box<dyn FnOnce(&Yielder)>;

/// Index of a slot in the thread table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(usize);

impl ThreadId {
    /// Any index is representable; the scheduler validates it on use.
    pub const fn new(index: usize) -> Self {
        ThreadId(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a slot.
///
/// `Free -> Runnable -> Running <-> Suspended`, and `Running -> Free` when
/// the entry returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Free,
    Runnable,
    Running,
    Suspended,
}

/// One slot of the thread table.
///
/// Only the scheduler touches these fields.
pub(crate) struct Descriptor {
    pub(crate) state: ThreadState,
    pub(crate) context: ExecutionContext,
    pub(crate) entry: Option<EntryFn>,
    /// Mapped on first use and kept for later occupants.
    pub(crate) stack: Option<Stack>,
}

impl Descriptor {
    pub(crate) fn new() -> Self {
        Descriptor {
            state: ThreadState::Free,
            context: ExecutionContext::default(),
            entry: None,
            stack: None,
        }
    }

    pub(crate) fn is_free(&self) -> bool {
        self.state == ThreadState::Free
    }

    /// `Free -> Runnable`: bind a new occupant.
    pub(crate) fn bind(&mut self, entry: EntryFn) {
        debug_assert!(self.is_free());
        self.entry = Some(entry);
        self.state = ThreadState::Runnable;
    }

    /// This slot's stack, mapping it if the slot has never been used.
    pub(crate) fn stack_or_map(&mut self, size: usize) -> Result<&Stack> {
        let stack = match self.stack.take() {
            Some(stack) => stack,
            None => Stack::new(size)?,
        };
        Ok(&*self.stack.insert(stack))
    }

    /// `Running -> Free`: the occupant's entry has returned.
    pub(crate) fn release(&mut self) {
        debug_assert_eq!(self.state, ThreadState::Running);
        self.entry = None;
        self.state = ThreadState::Free;
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("state", &self.state)
            .field("bound", &self.entry.is_some())
            .field("stack", &self.stack.as_ref().map(Stack::size))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_release_cycle() {
        let mut d = Descriptor::new();
        assert!(d.is_free());

        d.bind(Box::new(|_| {}));
        assert_eq!(d.state, ThreadState::Runnable);
        assert!(d.entry.is_some());

        d.state = ThreadState::Running;
        d.release();
        assert!(d.is_free());
        assert!(d.entry.is_none());
    }

    #[test]
    fn failed_stack_mapping_leaves_slot_untouched() {
        let mut d = Descriptor::new();
        let err = d.stack_or_map(usize::MAX).unwrap_err();
        assert!(matches!(err, crate::error::Error::StackAllocation(_)));
        assert!(d.is_free());
        assert!(d.stack.is_none());
    }

    #[test]
    fn thread_id_display() {
        assert_eq!(ThreadId::new(7).to_string(), "#7");
        assert_eq!(ThreadId::new(7).index(), 7);
    }
}
