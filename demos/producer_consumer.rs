//! Bounded-buffer producer and consumer driven by a plain loop.
//!
//! The consumer waits at most `PATIENCE` for each item by polling the clock
//! between yields; there are no timers in the scheduler itself.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use uthread::{Config, Scheduler};

const BUFSIZE: usize = 4;
const ITEMS: u32 = 16;
const PATIENCE: Duration = Duration::from_millis(50);

fn main() -> uthread::Result<()> {
    env_logger::init();

    let sched = Scheduler::with_config(Config::default().with_capacity(2))?;
    let buffer = Rc::new(RefCell::new(VecDeque::with_capacity(BUFSIZE)));

    let produced = buffer.clone();
    let producer = sched.create(move |y| {
        for item in 0..ITEMS {
            while produced.borrow().len() == BUFSIZE {
                y.yield_now();
            }
            produced.borrow_mut().push_back(item);
            log::info!("produced {item}");
        }
    })?;

    let consumed = buffer.clone();
    let consumer = sched.create(move |y| {
        let mut total = 0;
        loop {
            let deadline = Instant::now() + PATIENCE;
            let item = loop {
                if let Some(item) = consumed.borrow_mut().pop_front() {
                    break Some(item);
                }
                if Instant::now() >= deadline {
                    break None;
                }
                y.yield_now();
            };
            match item {
                Some(item) => {
                    total += item;
                    println!("consumed {item}");
                }
                None => {
                    println!("no item within {PATIENCE:?}, total {total}");
                    return;
                }
            }
        }
    })?;

    while !sched.finished() {
        sched.resume(producer)?;
        sched.resume(consumer)?;
    }
    Ok(())
}
