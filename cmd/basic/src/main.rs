//! Basic corepool example
//!
//! A producer/consumer pair over an `ArrayBlockingQueue`, then a small
//! thread pool running plain tasks and tasks with results.
//!
//! # Environment Variables
//!
//! - `RUST_LOG=debug` - Show worker lifecycle events
//! - `CPOOL_CORE_SIZE`, `CPOOL_MAX_SIZE`, ... - Pool sizing (see `ExecutorConfig::from_env`)

use corepool::prelude::*;
use corepool::TaskError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

// RUST_LOG=debug cargo run -p corepool-basic
fn main() -> Result<(), Box<dyn std::error::Error>> {
    corepool::init_logging();
    println!("=== corepool Basic Example ===\n");

    queue_demo()?;
    pool_demo()?;

    println!("\n=== Example Complete ===");
    Ok(())
}

fn queue_demo() -> Result<(), Box<dyn std::error::Error>> {
    println!("-- bounded queue --");
    let queue = Arc::new(ArrayBlockingQueue::new(2));

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for word in ["A", "B", "C"] {
                // Blocks on "C" until the consumer makes room
                if queue.put(word).is_err() {
                    return;
                }
                println!("put {}", word);
            }
        })
    };

    thread::sleep(Duration::from_millis(50));
    println!("queue full: {} of {}", queue.len(), queue.capacity());
    for _ in 0..3 {
        println!("took {}", queue.take()?);
    }
    producer.join().map_err(|_| "producer panicked")?;
    Ok(())
}

fn pool_demo() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n-- thread pool --");
    let config = ExecutorConfig::from_env().core_size(2).max_size(4).queue_capacity(16);
    config.log();
    let pool = ThreadPoolExecutor::new(config)?;

    let completed = Arc::new(AtomicUsize::new(0));
    let totals = Arc::new(ReentrantMutex::new(std::cell::Cell::new(0u64)));

    for i in 1..=8u64 {
        let completed = Arc::clone(&completed);
        let totals = Arc::clone(&totals);
        pool.execute(move || {
            let total = totals.lock();
            total.set(total.get() + i);
            completed.fetch_add(1, Ordering::SeqCst);
        })?;
    }

    let square = pool.submit_callable(|| 12 * 12)?;
    let tagged = pool.submit_with_result(|| thread::sleep(Duration::from_millis(10)), "tagged")?;
    let failing = pool.submit_callable(|| -> u32 { panic!("deliberate failure") })?;

    println!("square  = {:?}", square.get());
    println!("tagged  = {:?}", tagged.get());
    match failing.get() {
        Err(TaskError::Panicked(msg)) => println!("failing = panicked: {}", msg),
        other => println!("failing = {:?}", other),
    }

    pool.shutdown();
    let finished = pool.await_termination(Duration::from_secs(10))?;
    info!(finished, "pool drained");

    println!("plain tasks completed: {}", completed.load(Ordering::SeqCst));
    println!("sum of 1..=8:          {}", totals.lock().get());
    println!("largest pool size:     {}", pool.largest_pool_size());
    println!("completed task count:  {}", pool.completed_task_count());
    Ok(())
}
