//! Two uthreads, each printing two lines, yielding, then two more.
//!
//! Run with `RUST_LOG=trace` to see every switch.

use uthread::{Config, Scheduler};

fn main() -> uthread::Result<()> {
    env_logger::init();

    let sched = Scheduler::with_config(Config::from_env()?)?;

    let x = sched.create(|y| {
        println!("X1a");
        println!("X1b");
        y.yield_now();
        println!("X2a");
        println!("X2b");
    })?;

    let y_id = sched.create(|y| {
        println!("Y1a");
        println!("Y1b");
        y.yield_now();
        println!("Y2a");
        println!("Y2b");
    })?;

    while !sched.finished() {
        sched.resume(x)?;
        sched.resume(y_id)?;
    }
    println!("main over");
    Ok(())
}
