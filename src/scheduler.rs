//! Cooperative scheduler over a fixed table of uthreads.
//!
//! Exactly one flow of control is live at a time: either the driver (the
//! code calling [`Scheduler::resume`]) or a single uthread. `resume` switches
//! from the driver into a uthread and does not return until that uthread
//! yields or its entry returns.

use crate::config::Config;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::thread::{Descriptor, EntryFn, ThreadId, ThreadState};
use std::any::Any;
use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Fixed-capacity cooperative scheduler.
///
/// All state lives behind a box, so moving the `Scheduler` value while
/// uthreads are suspended is fine: their contexts point at the boxed core.
pub struct Scheduler {
    core: Box<Core>,
}

/// Scheduler state shared between the driver and the trampoline.
///
/// Every field uses interior mutability. No borrow of a descriptor is ever
/// held across a context switch.
struct Core {
    table: Box<[UnsafeCell<Descriptor>]>,
    /// Saved state of whoever called `resume`.
    driver: UnsafeCell<ExecutionContext>,
    /// Index of the Running descriptor, `None` while the driver runs.
    running: Cell<Option<usize>>,
    /// Payload of a uthread panic, re-raised by the `resume` that drove it.
    panic: Cell<Option<Box<dyn Any + Send>>>,
    stack_size: usize,
}

/// Handle given to every uthread entry.
///
/// Only exists on the stack of the uthread it was created for.
pub struct Yielder {
    core: *const Core,
    id: ThreadId,
}

impl Scheduler {
    /// Scheduler with the default [`Config`].
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let table = (0..config.capacity)
            .map(|_| UnsafeCell::new(Descriptor::new()))
            .collect();

        log::debug!(
            "scheduler with {} slots, {} byte stacks",
            config.capacity,
            config.stack_size
        );

        Ok(Scheduler {
            core: Box::new(Core {
                table,
                driver: UnsafeCell::new(ExecutionContext::current()),
                running: Cell::new(None),
                panic: Cell::new(None),
                stack_size: config.stack_size,
            }),
        })
    }

    /// Bind `f` to the first free slot and mark it Runnable.
    ///
    /// Fails with [`Error::CapacityExceeded`] when every slot is taken; no
    /// existing descriptor is touched in that case.
    pub fn create<F>(&self, f: F) -> Result<ThreadId>
    where
        F: FnOnce(&Yielder) + 'static,
    {
        self.core.create(Box::new(f))
    }

    /// Run uthread `id` until it yields or finishes.
    ///
    /// Out-of-range and Free ids are ignored. Resuming from inside a uthread
    /// is rejected, since it would overwrite the driver's saved context.
    ///
    /// If the uthread panics, its slot is freed and the panic continues
    /// from this call.
    pub fn resume(&self, id: ThreadId) -> Result<()> {
        self.core.resume(id)
    }

    /// Suspend the running uthread. A no-op from the driver.
    pub fn yield_now(&self) {
        self.core.yield_now();
    }

    /// True iff every slot is Free.
    pub fn finished(&self) -> bool {
        self.core.finished()
    }

    /// Resume every live uthread in slot order, round after round, until
    /// all of them have finished.
    pub fn run(&self) -> Result<()> {
        while !self.finished() {
            for index in 0..self.capacity() {
                self.resume(ThreadId::new(index))?;
            }
        }
        Ok(())
    }

    /// State of slot `id`, or `None` if it is out of range.
    pub fn state(&self, id: ThreadId) -> Option<ThreadState> {
        self.core.state(id.index())
    }

    pub fn running(&self) -> Option<ThreadId> {
        self.core.running.get().map(ThreadId::new)
    }

    pub fn capacity(&self) -> usize {
        self.core.table.len()
    }

    /// Number of non-Free slots.
    pub fn live(&self) -> usize {
        (0..self.capacity())
            .filter(|&i| self.core.state(i) != Some(ThreadState::Free))
            .count()
    }

    pub fn stack_size(&self) -> usize {
        self.core.stack_size
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(index) = self.core.running.get() {
            // Unmapping the stack we are standing on cannot end well
            log::error!("scheduler dropped from inside running uthread #{index}");
            std::process::abort();
        }

        let suspended = (0..self.capacity())
            .filter(|&i| self.core.state(i) == Some(ThreadState::Suspended))
            .count();
        if suspended > 0 {
            log::warn!("abandoning {suspended} suspended uthreads");
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states: Vec<_> = (0..self.capacity())
            .filter_map(|i| self.core.state(i))
            .collect();
        f.debug_struct("Scheduler")
            .field("running", &self.running())
            .field("states", &states)
            .field("stack_size", &self.core.stack_size)
            .finish()
    }
}

impl Core {
    fn create(&self, entry: EntryFn) -> Result<ThreadId> {
        let index = self
            .table
            .iter()
            .position(|slot| unsafe { (*slot.get()).is_free() })
            .ok_or(Error::CapacityExceeded {
                capacity: self.table.len(),
            })?;

        let desc = unsafe { &mut *self.table[index].get() };
        desc.stack_or_map(self.stack_size)?;
        desc.bind(entry);

        let id = ThreadId::new(index);
        log::debug!("created uthread {id}");
        Ok(id)
    }

    fn resume(&self, id: ThreadId) -> Result<()> {
        let Some(slot) = self.table.get(id.index()) else {
            log::trace!("resume of out-of-range uthread {id} ignored");
            return Ok(());
        };

        if let Some(running) = self.running.get().map(ThreadId::new) {
            if unsafe { (*slot.get()).is_free() } {
                return Ok(());
            }
            log::warn!("resume of uthread {id} rejected: {running} is running");
            return Err(if running == id {
                Error::ReentrantResume(id)
            } else {
                Error::NestedResume { running }
            });
        }

        {
            let desc = unsafe { &mut *slot.get() };
            match desc.state {
                ThreadState::Free => {
                    log::trace!("resume of free uthread {id} ignored");
                    return Ok(());
                }
                ThreadState::Runnable => {
                    // Fresh frame on every activation; nothing survives from
                    // the slot's previous occupant.
                    let stack = desc.stack_or_map(self.stack_size)?;
                    let context = ExecutionContext::init_over_stack(
                        stack,
                        trampoline,
                        self as *const Core as usize,
                    );
                    desc.context = context;
                }
                ThreadState::Suspended => {}
                ThreadState::Running => return Err(Error::ReentrantResume(id)),
            }
            desc.state = ThreadState::Running;
        }
        self.running.set(Some(id.index()));

        log::trace!("switching to uthread {id}");
        unsafe {
            ExecutionContext::switch(self.driver.get(), &raw const (*slot.get()).context);
        }
        log::trace!("back from uthread {id}");

        if let Some(payload) = self.panic.take() {
            panic::resume_unwind(payload);
        }
        Ok(())
    }

    fn yield_now(&self) {
        let Some(index) = self.running.get() else {
            return;
        };
        let slot = &self.table[index];

        unsafe {
            (*slot.get()).state = ThreadState::Suspended;
        }
        self.running.set(None);

        log::trace!("uthread #{index} yielding");
        unsafe {
            ExecutionContext::switch(&raw mut (*slot.get()).context, self.driver.get());
        }
    }

    fn finished(&self) -> bool {
        self.table
            .iter()
            .all(|slot| unsafe { (*slot.get()).is_free() })
    }

    fn state(&self, index: usize) -> Option<ThreadState> {
        self.table
            .get(index)
            .map(|slot| unsafe { (*slot.get()).state })
    }

    /// Call the running descriptor's entry. Returns its index once the
    /// entry has returned or panicked.
    fn run_current(&self) -> usize {
        let Some(index) = self.running.get() else {
            log::error!("trampoline entered with no running uthread");
            std::process::abort();
        };

        let entry = unsafe { (*self.table[index].get()).entry.take() };
        let yielder = Yielder {
            core: self,
            id: ThreadId::new(index),
        };

        if let Some(entry) = entry
            && let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| entry(&yielder)))
        {
            log::debug!("uthread #{index} panicked");
            self.panic.set(Some(payload));
        }
        index
    }

    /// Free the slot and hand control back to the driver for good.
    fn exit(&self, index: usize) -> ! {
        let slot = &self.table[index];
        unsafe {
            (*slot.get()).release();
        }
        self.running.set(None);

        log::debug!("uthread #{index} finished");
        unsafe {
            ExecutionContext::switch(&raw mut (*slot.get()).context, self.driver.get());
        }
        unreachable!("finished uthread #{index} was resumed");
    }
}

/// Entry routine of every uthread context.
///
/// `core` is the address of the scheduler core, passed by the start shim.
/// Everything the entry owned is dropped inside `run_current`, before the
/// final switch.
unsafe extern "C" fn trampoline(core: usize) -> ! {
    let core = unsafe { &*(core as *const Core) };
    let index = core.run_current();
    core.exit(index)
}

impl Yielder {
    /// Id of the uthread this handle belongs to.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Suspend this uthread and return to the driver. Returns when the
    /// driver resumes it again.
    pub fn yield_now(&self) {
        unsafe { (*self.core).yield_now() }
    }

    /// Create another uthread from inside this one.
    pub fn create<F>(&self, f: F) -> Result<ThreadId>
    where
        F: FnOnce(&Yielder) + 'static,
    {
        unsafe { (*self.core).create(Box::new(f)) }
    }
}

impl fmt::Debug for Yielder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Yielder").field("id", &self.id).finish()
    }
}
