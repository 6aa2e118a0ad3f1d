//! Errors reported by the scheduler.

use crate::thread::ThreadId;
use std::io;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `create` found no free slot. The table is left untouched.
    #[error("thread table is full ({capacity} slots)")]
    CapacityExceeded { capacity: usize },

    /// `resume` targeted the uthread that is currently running.
    #[error("uthread {0} is already running")]
    ReentrantResume(ThreadId),

    /// `resume` was called from inside a running uthread.
    #[error("resume called from inside running uthread {running}")]
    NestedResume { running: ThreadId },

    #[error("failed to map uthread stack")]
    StackAllocation(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
