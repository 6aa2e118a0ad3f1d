//! Cooperative uthreads on a single OS thread.
//!
//! A [`Scheduler`] owns a fixed table of lightweight threads, each with its
//! own private stack. The driver creates uthreads, then calls
//! [`Scheduler::resume`] on their ids until [`Scheduler::finished`]. A
//! uthread runs until it calls [`Yielder::yield_now`] or its entry returns.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use uthread::Scheduler;
//!
//! let sched = Scheduler::new().unwrap();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let out = log.clone();
//! let a = sched
//!     .create(move |y| {
//!         out.borrow_mut().push("A1");
//!         y.yield_now();
//!         out.borrow_mut().push("A2");
//!     })
//!     .unwrap();
//!
//! let out = log.clone();
//! let b = sched
//!     .create(move |y| {
//!         out.borrow_mut().push("B1");
//!         y.yield_now();
//!         out.borrow_mut().push("B2");
//!     })
//!     .unwrap();
//!
//! while !sched.finished() {
//!     sched.resume(a).unwrap();
//!     sched.resume(b).unwrap();
//! }
//! assert_eq!(*log.borrow(), ["A1", "B1", "A2", "B2"]);
//! ```
//!
//! # Limits
//!
//! Stacks are fixed-size (see [`Config::stack_size`]) and never grow. A
//! uthread that recurses past its stack hits a guard page and the process
//! dies with SIGSEGV. Size stacks for the deepest call chain of any entry.

mod arch;
pub mod config;
pub mod context;
pub mod error;
pub mod scheduler;
pub mod stack;
pub mod thread;

pub use config::Config;
pub use error::{Error, Result};
pub use scheduler::{Scheduler, Yielder};
pub use thread::{ThreadId, ThreadState};
