//! Stress test - many short tasks
//!
//! Floods a pool from several submitter threads and checks that every
//! accepted task ran exactly once. Saturation is turned into back-pressure
//! with `BlockPolicy`, so nothing is rejected while the pool runs.
//!
//! Usage: `stress [tasks] [submitters]`

use corepool::prelude::*;
use corepool::BlockPolicy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    corepool::init_logging();
    println!("=== corepool Stress Test ===\n");

    let mut args = std::env::args().skip(1);
    let num_tasks: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(100_000);
    let submitters: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(4).max(1);

    let config = ExecutorConfig::from_env();
    config.log();
    println!(
        "Submitting {} tasks from {} threads (core {}, max {}, queue {})",
        num_tasks, submitters, config.core_size, config.max_size, config.queue_capacity
    );

    let pool = ThreadPoolExecutor::builder(config)
        .rejection_policy(BlockPolicy)
        .build()?;
    let completed = Arc::new(AtomicU64::new(0));
    let checksum = Arc::new(AtomicU64::new(0));

    let start = Instant::now();
    let handles: Vec<_> = (0..submitters)
        .map(|s| {
            let pool = pool.clone();
            let completed = Arc::clone(&completed);
            let checksum = Arc::clone(&checksum);
            let share = num_tasks / submitters + u64::from(s < num_tasks % submitters);
            thread::spawn(move || {
                let mut accepted = 0u64;
                for n in 0..share {
                    let completed = Arc::clone(&completed);
                    let checksum = Arc::clone(&checksum);
                    let r = pool.execute(move || {
                        checksum.fetch_add(n, Ordering::Relaxed);
                        completed.fetch_add(1, Ordering::Relaxed);
                    });
                    match r {
                        Ok(()) => accepted += 1,
                        Err(e) => {
                            warn!(error = %e, "submission failed");
                            break;
                        }
                    }
                }
                (accepted, (0..accepted).sum::<u64>())
            })
        })
        .collect();

    let mut accepted = 0u64;
    let mut expected_sum = 0u64;
    for h in handles {
        let (a, sum) = h.join().map_err(|_| "submitter panicked")?;
        accepted += a;
        expected_sum += sum;
    }
    let submit_time = start.elapsed();
    println!("Submit time: {:?}", submit_time);
    println!(
        "Submit rate: {:.0} tasks/sec",
        accepted as f64 / submit_time.as_secs_f64()
    );

    pool.shutdown();
    let terminated = pool.await_termination(Duration::from_secs(60))?;
    let total_time = start.elapsed();

    let done = completed.load(Ordering::Relaxed);
    println!("\n=== Results ===");
    println!("Accepted:        {}", accepted);
    println!("Completed:       {}", done);
    println!("Checksum ok:     {}", checksum.load(Ordering::Relaxed) == expected_sum);
    println!("Terminated:      {}", terminated);
    println!("Largest pool:    {}", pool.largest_pool_size());
    println!("Total time:      {:?}", total_time);
    println!(
        "Throughput:      {:.0} tasks/sec",
        done as f64 / total_time.as_secs_f64()
    );

    if done != accepted {
        return Err(format!("lost {} tasks", accepted - done).into());
    }
    Ok(())
}
