#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Scoped, nested timing of code regions, aggregated per round of work.
//!
//! Mark the regions of code you want to measure as named spans. Spans nest and repeat (e.g.
//! inside loops). The first span entered while nothing is open becomes the root of a round;
//! when it exits, the round is complete and two reports are produced:
//!
//! * An [`AggregatedReport`] with one entry per distinct span name: how many times spans with
//!   that name exited, their total duration and that total as a percentage of the root span.
//! * A [`TraceReport`] with one record per span occurrence, with its start offset within the
//!   round, its duration and its nesting depth.
//!
//! The stopwatch then resets, so the next span entered starts a fresh round.
//!
//! # Measuring spans
//!
//! ```
//! use scope_timer::Stopwatch;
//!
//! let stopwatch = Stopwatch::builder()
//!     .export_aggregated(|report| {
//!         println!("{report}");
//!         Ok(())
//!     })
//!     .build();
//!
//! fn handle_request(stopwatch: &Stopwatch) {
//!     let _root = stopwatch.timer("handle_request");
//!
//!     for _ in 0..50 {
//!         let _inner = stopwatch.timer("inner_task");
//!         // ...
//!     }
//!
//!     let _outer = stopwatch.timer("outer_task");
//!     // ...
//! }
//!
//! handle_request(&stopwatch);
//!
//! let report = stopwatch.last_aggregated_report().unwrap();
//! assert_eq!(report.summary("inner_task").unwrap().count(), 50);
//! ```
//!
//! [`Stopwatch::timer()`] returns a guard that exits the span when dropped, so a span cannot be
//! left open by an early return or a `?`. For code that cannot hold a guard across the
//! measured region, [`Stopwatch::enter()`] and [`Stopwatch::exit()`] are also available.
//! Calling `exit()` without an open span returns [`Error::StackImbalance`].
//!
//! # Tags
//!
//! A round can carry tags: key/value pairs that are delivered with both reports. Tags added
//! while no round is in progress are ignored.
//!
//! ```
//! use std::time::Duration;
//!
//! use scope_timer::Stopwatch;
//!
//! let stopwatch = Stopwatch::builder()
//!     .export_aggregated(|_report| Ok(()))
//!     .build();
//!
//! {
//!     let _root = stopwatch.timer("handle_request");
//!     stopwatch.add_tag("endpoint", "/users");
//!
//!     let _query = stopwatch.timer("query");
//!     // Tags the round with `query_slow = true` if the query span is open for 100 ms or more.
//!     stopwatch.add_slow_tag("query_slow", Duration::from_millis(100));
//! }
//!
//! let report = stopwatch.last_aggregated_report().unwrap();
//! assert!(report.tags().contains_key("endpoint"));
//! ```
//!
//! # Exporting reports
//!
//! Export callbacks are set on the [`StopwatchBuilder`]. Without an aggregated export callback,
//! the aggregated report of every round is printed to stdout. A callback that fails or panics
//! is isolated: the failure is logged via `tracing` and returned in
//! [`SpanExit::export_failures()`], and the stopwatch is ready for the next round regardless.
//! Failing to write to stdout (e.g. a closed pipe) is handled the same way.
//!
//! Callbacks may use the stopwatch, for example to measure the export itself. A round completed
//! from inside a callback is exported after that callback returns.
//!
//! # Thread safety
//!
//! A [`Stopwatch`] is [`Send`] but not [`Sync`]. Spans of one stopwatch form a single stack,
//! which is only meaningful for one thread of control. Use one stopwatch per thread.
//!
//! # Panic policy
//!
//! This crate does not panic when spans are entered or exited, tags are added or reports are
//! built. Usage errors are returned as [`Error`] values.
//!
//! # Mathematics policy
//!
//! Duration arithmetic saturates. A clock reading lower than the start of a span yields a
//! zero duration rather than underflowing.

mod aggregator;
mod builder;
mod clock;
mod data_types;
mod error;
mod export;
mod report;
mod span_guard;
mod span_stack;
mod stopwatch;
mod tags;
mod tracer;

pub use builder::StopwatchBuilder;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use data_types::{SpanId, SpanName, TagKey};
pub use error::{Error, ExportKind, Result};
pub use export::{ExportError, ExportResult};
pub use report::{AggregatedReport, SpanSummary, TraceReport};
pub use span_guard::{SpanBuilder, SpanGuard};
pub use stopwatch::{RoundPhase, SpanExit, Stopwatch};
pub use tags::TagValue;
pub use tracer::TraceRecord;
