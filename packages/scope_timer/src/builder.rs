use std::time::Duration;

use crate::export::Exporters;
use crate::tracer::TraceLimits;
use crate::{AggregatedReport, Clock, ExportResult, MonotonicClock, Stopwatch, TraceReport};

/// Creates instances of [`Stopwatch`].
///
/// Required parameters:
///
/// * (none)
///
/// Optional parameters:
///
/// * `export_aggregated`: the callback receiving the aggregated report of each completed round.
///   Without one, the aggregated report is printed to stdout.
/// * `export_tracing`: the callback receiving the trace report of each completed round.
///   Without one, trace reports are only available via
///   [`Stopwatch::last_trace_report()`].
/// * `clock`: the time source. Defaults to [`MonotonicClock`].
/// * `strict`: whether named exits must match the innermost open span. Defaults to `true`.
/// * `min_trace_duration`: shorter spans are left out of trace reports. Defaults to zero.
/// * `max_traces_per_name`: how many spans with the same name are traced per round. Defaults
///   to no limit.
///
/// The root span of a round is always traced, regardless of the trace limits.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use scope_timer::Stopwatch;
///
/// let stopwatch = Stopwatch::builder()
///     .export_aggregated(|report| {
///         // Forward to a metrics backend here.
///         assert!(report.root_duration() >= Duration::ZERO);
///         Ok(())
///     })
///     .min_trace_duration(Duration::from_millis(3))
///     .max_traces_per_name(1000)
///     .build();
///
/// let _root = stopwatch.timer("job");
/// ```
#[derive(Debug)]
#[must_use]
pub struct StopwatchBuilder<C: Clock = MonotonicClock> {
    clock: C,
    strict: bool,
    trace_limits: TraceLimits,
    exporters: Exporters,
}

impl StopwatchBuilder<MonotonicClock> {
    pub(crate) fn new() -> Self {
        Self {
            clock: MonotonicClock::new(),
            strict: true,
            trace_limits: TraceLimits::default(),
            exporters: Exporters::default(),
        }
    }
}

impl<C: Clock> StopwatchBuilder<C> {
    /// Uses a different clock for all span measurements.
    pub fn clock<C2: Clock>(self, clock: C2) -> StopwatchBuilder<C2> {
        StopwatchBuilder {
            clock,
            strict: self.strict,
            trace_limits: self.trace_limits,
            exporters: self.exporters,
        }
    }

    /// Sets the callback that receives the aggregated report of each completed round.
    ///
    /// An error returned by the callback, or a panic inside it, is logged and reported via
    /// [`SpanExit::export_failures()`][crate::SpanExit::export_failures]. It never prevents
    /// the stopwatch from starting the next round.
    pub fn export_aggregated<F>(mut self, export: F) -> Self
    where
        F: FnMut(&AggregatedReport) -> ExportResult + Send + 'static,
    {
        self.exporters.aggregated = Some(Box::new(export));
        self
    }

    /// Sets the callback that receives the trace report of each completed round.
    ///
    /// Failures are handled the same way as for
    /// [`export_aggregated()`][Self::export_aggregated].
    pub fn export_tracing<F>(mut self, export: F) -> Self
    where
        F: FnMut(&TraceReport) -> ExportResult + Send + 'static,
    {
        self.exporters.tracing = Some(Box::new(export));
        self
    }

    /// Sets whether a named exit must match the innermost open span.
    ///
    /// A strict stopwatch rejects a mismatched exit and leaves all spans open. A lenient one
    /// exits the innermost open span with the requested name and discards any spans entered
    /// after it that are still open.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Spans open for less than this are left out of trace reports.
    ///
    /// Aggregated reports are unaffected.
    pub fn min_trace_duration(mut self, min_duration: Duration) -> Self {
        self.trace_limits.min_duration = min_duration;
        self
    }

    /// At most this many spans with the same name are included in each trace report.
    ///
    /// Aggregated reports are unaffected.
    pub fn max_traces_per_name(mut self, max: usize) -> Self {
        self.trace_limits.max_per_name = Some(max);
        self
    }

    /// Creates the stopwatch.
    #[must_use]
    pub fn build(self) -> Stopwatch<C> {
        Stopwatch::from_parts(self.clock, self.strict, self.trace_limits, self.exporters)
    }
}
