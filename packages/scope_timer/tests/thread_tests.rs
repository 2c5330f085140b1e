//! A stopwatch can be moved to another thread and measures there like anywhere else.

use std::thread;
use std::time::Duration;

use scope_timer::{ManualClock, RoundPhase, Stopwatch};

#[test]
fn stopwatch_moved_to_worker_thread() {
    let clock = ManualClock::new();
    let stopwatch = Stopwatch::builder()
        .clock(clock.clone())
        .export_aggregated(|_| Ok(()))
        .build();

    let stopwatch = thread::spawn(move || {
        {
            let _root = stopwatch.timer("worker_round");
            clock.advance(Duration::from_millis(12));
        }

        stopwatch
    })
    .join()
    .unwrap();

    assert_eq!(stopwatch.phase(), RoundPhase::Idle);
    assert_eq!(
        stopwatch.last_aggregated_report().unwrap().root_duration(),
        Duration::from_millis(12)
    );
}

#[test]
fn one_stopwatch_per_thread() {
    let handles: Vec<_> = (1..=4_u64)
        .map(|worker| {
            thread::spawn(move || {
                let clock = ManualClock::new();
                let stopwatch = Stopwatch::builder()
                    .clock(clock.clone())
                    .export_aggregated(|_| Ok(()))
                    .build();

                {
                    let _root = stopwatch.timer("round");
                    for _ in 0..worker {
                        let _step = stopwatch.timer("step");
                        clock.advance(Duration::from_millis(1));
                    }
                }

                stopwatch
                    .last_aggregated_report()
                    .unwrap()
                    .summary("step")
                    .unwrap()
                    .count()
            })
        })
        .collect();

    let counts: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(counts, [1, 2, 3, 4]);
}
