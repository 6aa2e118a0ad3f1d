//! Execution contexts: the save/restore primitive uthreads are built on.
//!
//! An `ExecutionContext` is an opaque saved CPU state. It is either empty
//! (filled in by the first switch away from the current flow of control) or
//! initialized over a private stack so that switching into it starts a new
//! flow at a fixed entry routine.

use crate::arch::{Context, context_switch};
use crate::stack::Stack;

/// Entry routine of a freshly initialized context. Receives the argument
/// given to [`ExecutionContext::init_over_stack`] and must never return.
pub type Entry = unsafe extern "C" fn(usize) -> !;

#[derive(Debug, Default)]
pub struct ExecutionContext {
    regs: Context,
}

impl ExecutionContext {
    /// A slot for the state of the currently running flow.
    ///
    /// Holds nothing meaningful until it is the `from` side of a switch.
    pub fn current() -> Self {
        ExecutionContext::default()
    }

    /// A context that begins in `entry(arg)` with its stack pointer at the
    /// top of `stack`.
    pub fn init_over_stack(stack: &Stack, entry: Entry, arg: usize) -> Self {
        // Stack::top is aligned and sits below the end of the mapping
        let regs = unsafe { Context::new(stack.top(), entry, arg) };
        ExecutionContext { regs }
    }

    /// Save the running state into `from` and continue at `to`.
    ///
    /// Returns only once some other flow switches back into `from`.
    ///
    /// # Safety
    /// Both pointers must be valid for the duration of the switch. `to` must
    /// have been filled by an earlier switch or by `init_over_stack`, and its
    /// stack must still be mapped. No references into either context may be
    /// held across the call.
    pub unsafe fn switch(from: *mut ExecutionContext, to: *const ExecutionContext) {
        unsafe {
            context_switch(&raw mut (*from).regs, &raw const (*to).regs);
        }
    }
}
