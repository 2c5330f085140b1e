//! Measures a simulated request handler over a few rounds and prints both reports.
//!
//! Run with: `cargo run --example scope_timer_basic`.

use std::thread;
use std::time::Duration;

use scope_timer::Stopwatch;

fn main() {
    let stopwatch = Stopwatch::builder()
        .export_aggregated(|report| {
            println!("{report}");
            Ok(())
        })
        .export_tracing(|report| {
            println!("{report}");
            Ok(())
        })
        .max_traces_per_name(5)
        .build();

    for request in 0..3_i64 {
        handle_request(&stopwatch, request);
    }
}

fn handle_request(stopwatch: &Stopwatch, request: i64) {
    let _root = stopwatch.timer("handle_request");
    stopwatch.add_tag("request", request);

    {
        let parse = stopwatch.timer("parse");
        parse.annotate("bytes", 512_i64);
        thread::sleep(Duration::from_millis(2));
    }

    for _ in 0..10 {
        let _query = stopwatch.span("query").bucket("database").enter();
        stopwatch.add_slow_tag("query_slow", Duration::from_millis(5));
        thread::sleep(Duration::from_millis(1));
    }

    let _render = stopwatch.timer("render");
    thread::sleep(Duration::from_millis(3));
}
