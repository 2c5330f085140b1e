//! The round controller that owns all per-round state.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::aggregator::Aggregator;
use crate::export::Exporters;
use crate::span_stack::SpanStack;
use crate::tags::TagSet;
use crate::tracer::{TraceLimits, Tracer};
use crate::{
    AggregatedReport, Clock, Error, MonotonicClock, Result, SpanBuilder, SpanGuard, SpanId,
    SpanName, StopwatchBuilder, TagKey, TagValue, TraceRecord, TraceReport,
};

/// Measures named, nested spans of code and reports on them once per round.
///
/// A round begins when a span is entered while no span is open. That span is the root of the
/// round. The round ends when the root span exits, at which point the stopwatch builds an
/// [`AggregatedReport`] and a [`TraceReport`], resets itself and hands the reports to the
/// configured export callbacks. The next enter starts a fresh round.
///
/// Spans are normally entered via [`timer()`][Self::timer], which returns a guard that exits
/// the span when dropped. The explicit [`enter()`][Self::enter] and [`exit()`][Self::exit]
/// pair is available for code that cannot hold a guard across the measured region.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use scope_timer::{ManualClock, Stopwatch};
///
/// let clock = ManualClock::new();
/// let stopwatch = Stopwatch::builder()
///     .clock(clock.clone())
///     .export_aggregated(|_report| Ok(()))
///     .build();
///
/// {
///     let _root = stopwatch.timer("handle_request");
///
///     {
///         let _parse = stopwatch.timer("parse");
///         clock.advance(Duration::from_millis(5));
///     }
///
///     clock.advance(Duration::from_millis(15));
/// }
///
/// let report = stopwatch.last_aggregated_report().unwrap();
/// assert_eq!(report.root_duration(), Duration::from_millis(20));
/// assert_eq!(report.summary("parse").unwrap().count(), 1);
/// ```
///
/// # Thread safety
///
/// A stopwatch may be moved between threads but not shared. Spans form a single stack, so
/// concurrent use from several threads would interleave unrelated enters and exits. Use one
/// stopwatch per thread of control.
#[derive(Debug)]
pub struct Stopwatch<C: Clock = MonotonicClock> {
    clock: C,
    strict: bool,
    next_span_id: Cell<u64>,
    round: RefCell<Round>,

    // Borrowed separately from the round so callbacks can use the stopwatch.
    exporters: RefCell<Exporters>,

    // Reports of completed rounds not yet handed to the exporters.
    pending_exports: RefCell<VecDeque<(Arc<AggregatedReport>, Arc<TraceReport>)>>,

    last_aggregated_report: RefCell<Option<Arc<AggregatedReport>>>,
    last_trace_report: RefCell<Option<Arc<TraceReport>>>,
}

/// Whether a round is currently being measured.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RoundPhase {
    /// No span is open. The next enter starts a new round.
    Idle,

    /// The root span of a round is open.
    InProgress,
}

/// The outcome of a successful span exit.
#[derive(Debug)]
pub struct SpanExit {
    name: SpanName,
    duration: Duration,
    depth: usize,
    completed_round: bool,
    export_failures: Vec<Error>,
}

impl SpanExit {
    /// The name of the span that exited.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How long the span was open.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The depth of the span that exited (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether this exit closed the root span and thereby completed the round.
    #[must_use]
    pub fn completed_round(&self) -> bool {
        self.completed_round
    }

    /// Failures of export callbacks invoked because this exit completed the round.
    ///
    /// Always empty unless [`completed_round()`][Self::completed_round] is `true`. The round
    /// has been reset regardless of any failures.
    ///
    /// A round completed from inside an export callback is exported once that callback
    /// returns. Its failures are reported by the exit that invoked the callback, so the exit
    /// that completed it reports none.
    #[must_use]
    pub fn export_failures(&self) -> &[Error] {
        &self.export_failures
    }
}

/// All state scoped to one round. Reset as a unit when the root span exits.
#[derive(Debug)]
struct Round {
    stack: SpanStack,
    aggregator: Aggregator,
    tracer: Tracer,
    tags: TagSet,
}

impl Round {
    fn new(trace_limits: TraceLimits) -> Self {
        Self {
            stack: SpanStack::default(),
            aggregator: Aggregator::new(),
            tracer: Tracer::new(trace_limits),
            tags: TagSet::default(),
        }
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.aggregator.reset();
        self.tracer.reset();
        self.tags.reset();
    }

    fn is_empty(&self) -> bool {
        self.stack.is_empty()
            && self.aggregator.is_empty()
            && self.tracer.is_empty()
            && self.tags.is_empty()
    }
}

/// Which open span an exit request refers to.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ExitTarget<'a> {
    /// Whatever span is innermost.
    Innermost,

    /// The innermost span with this name.
    Named(&'a str),

    /// The span with this identifier, which was entered with the given name.
    Span(SpanId, &'a SpanName),
}

impl Stopwatch<MonotonicClock> {
    /// Creates a stopwatch with the default configuration.
    ///
    /// The aggregated report of each round is printed to stdout and trace reports are
    /// discarded. Use [`builder()`][Self::builder] to configure export callbacks or a
    /// different clock.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a stopwatch with a custom configuration.
    #[must_use]
    pub fn builder() -> StopwatchBuilder {
        StopwatchBuilder::new()
    }
}

impl Default for Stopwatch<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Stopwatch<C> {
    pub(crate) fn from_parts(
        clock: C,
        strict: bool,
        trace_limits: TraceLimits,
        exporters: Exporters,
    ) -> Self {
        Self {
            clock,
            strict,
            next_span_id: Cell::new(0),
            round: RefCell::new(Round::new(trace_limits)),
            exporters: RefCell::new(exporters),
            pending_exports: RefCell::new(VecDeque::new()),
            last_aggregated_report: RefCell::new(None),
            last_trace_report: RefCell::new(None),
        }
    }

    /// Enters a span that exits when the returned guard is dropped.
    ///
    /// If no round is in progress, the span becomes the root of a new round.
    ///
    /// # Examples
    ///
    /// ```
    /// use scope_timer::Stopwatch;
    ///
    /// let stopwatch = Stopwatch::builder()
    ///     .export_aggregated(|_report| Ok(()))
    ///     .build();
    ///
    /// {
    ///     let _root = stopwatch.timer("root");
    ///
    ///     for _ in 0..3 {
    ///         let _step = stopwatch.timer("step");
    ///     }
    /// }
    ///
    /// let report = stopwatch.last_aggregated_report().unwrap();
    /// assert_eq!(report.summary("step").unwrap().count(), 3);
    /// ```
    pub fn timer(&self, name: impl Into<SpanName>) -> SpanGuard<'_, C> {
        self.span(name).enter()
    }

    /// Starts building a span with additional options, such as a bucket or an explicit start
    /// time.
    #[must_use]
    pub fn span(&self, name: impl Into<SpanName>) -> SpanBuilder<'_, C> {
        SpanBuilder::new(self, name.into())
    }

    /// Enters a span at the current clock reading. The span stays open until a matching
    /// [`exit()`][Self::exit].
    ///
    /// If no round is in progress, the span becomes the root of a new round. Entering a span
    /// never fails.
    pub fn enter(&self, name: impl Into<SpanName>) -> SpanId {
        self.enter_with(name.into(), None, None)
    }

    /// Enters a span that started at the given clock reading.
    ///
    /// The reading must come from the same time base as the stopwatch clock.
    pub fn enter_at(&self, name: impl Into<SpanName>, at: Duration) -> SpanId {
        self.enter_with(name.into(), None, Some(at))
    }

    pub(crate) fn enter_with(
        &self,
        name: SpanName,
        bucket: Option<SpanName>,
        at: Option<Duration>,
    ) -> SpanId {
        let start = at.unwrap_or_else(|| self.clock.now());
        let id = self.allocate_span_id();

        let mut round = self.round.borrow_mut();

        if round.stack.is_empty() {
            tracing::debug!(root = %name, "round started");
        }

        let depth = round.stack.push(id, name.clone(), bucket, start);
        round.aggregator.reserve(&name, depth);

        tracing::trace!(span = %name, %id, depth, "span entered");

        id
    }

    /// Exits the innermost open span at the current clock reading.
    ///
    /// If the span is the root of the round, the round is completed: reports are built, the
    /// stopwatch is reset and the export callbacks are invoked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StackImbalance`] if no span is open. Nothing is recorded in that case.
    pub fn exit(&self) -> Result<SpanExit> {
        self.exit_with(ExitTarget::Innermost, None)
    }

    /// Exits the innermost open span at the given clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StackImbalance`] if no span is open. Nothing is recorded in that case.
    pub fn exit_at(&self, at: Duration) -> Result<SpanExit> {
        self.exit_with(ExitTarget::Innermost, Some(at))
    }

    /// Exits the innermost open span, verifying that it has the expected name.
    ///
    /// A lenient stopwatch (see [`StopwatchBuilder::strict()`]) instead exits the innermost
    /// open span with this name, discarding any spans that were entered after it and are
    /// still open. Discarded spans are not recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StackImbalance`] if no span is open. Returns
    /// [`Error::SpanMismatch`] if a strict stopwatch finds a different innermost span or a
    /// lenient stopwatch finds no open span with this name. Nothing is recorded in either case.
    pub fn exit_named(&self, name: &str) -> Result<SpanExit> {
        self.exit_with(ExitTarget::Named(name), None)
    }

    pub(crate) fn exit_with(
        &self,
        target: ExitTarget<'_>,
        at: Option<Duration>,
    ) -> Result<SpanExit> {
        let end = at.unwrap_or_else(|| self.clock.now());

        let mut round = self.round.borrow_mut();

        let depth = self.resolve_exit_depth(&round.stack, target)?;

        for discarded in round.stack.unwind_above(depth) {
            tracing::warn!(
                span = %discarded.name,
                id = %discarded.id,
                depth = discarded.depth,
                "open span discarded because an enclosing span exited first"
            );
        }

        let span = round
            .stack
            .pop()
            .expect("exit depth was resolved against the open spans");

        let duration = span.duration_until(end);
        let root_start = round.stack.root().map_or(span.start, |root| root.start);
        let parent_span_id = round.stack.top().map(|parent| parent.id);

        round
            .aggregator
            .record(&span.name, duration, span.depth, span.bucket.as_ref());

        round.tracer.record(TraceRecord::new(
            span.name.clone(),
            span.id,
            parent_span_id,
            span.start.saturating_sub(root_start),
            duration,
            span.depth,
            span.annotations,
        ));

        for (key, threshold) in span.slow_tags {
            if round.tags.add_slow_tag(key.clone(), threshold, duration) {
                tracing::debug!(span = %span.name, tag = %key, ?duration, ?threshold, "slow tag added");
            }
        }

        tracing::trace!(span = %span.name, id = %span.id, depth = span.depth, ?duration, "span exited");

        if span.depth != 0 {
            return Ok(SpanExit {
                name: span.name,
                duration,
                depth: span.depth,
                completed_round: false,
                export_failures: Vec::new(),
            });
        }

        let tags = round.tags.take();
        let aggregated = Arc::new(AggregatedReport::new(
            span.name.clone(),
            duration,
            round.aggregator.take(),
            tags.clone(),
        ));
        let trace = Arc::new(TraceReport::new(
            span.name.clone(),
            round.tracer.take(),
            tags,
        ));

        round.reset();
        debug_assert!(round.is_empty());

        // Callbacks may use the stopwatch, so no round state may be borrowed while they run.
        drop(round);

        tracing::debug!(root = %span.name, ?duration, "round completed");

        *self.last_aggregated_report.borrow_mut() = Some(Arc::clone(&aggregated));
        *self.last_trace_report.borrow_mut() = Some(Arc::clone(&trace));

        self.pending_exports
            .borrow_mut()
            .push_back((aggregated, trace));

        let export_failures = self.deliver_pending_exports(&span.name);

        Ok(SpanExit {
            name: span.name,
            duration,
            depth: 0,
            completed_round: true,
            export_failures,
        })
    }

    /// Hands queued reports to the exporters until the queue is empty.
    ///
    /// If the exporters are already running (the round was completed by an export callback),
    /// the reports stay queued and the delivery loop further up the call stack picks them up.
    fn deliver_pending_exports(&self, root: &SpanName) -> Vec<Error> {
        let Ok(mut exporters) = self.exporters.try_borrow_mut() else {
            tracing::debug!(%root, "round completed inside an export callback; reports queued");
            return Vec::new();
        };

        let mut failures = Vec::new();

        loop {
            // The queue must not stay borrowed while callbacks run, they may complete rounds.
            let next = self.pending_exports.borrow_mut().pop_front();

            let Some((aggregated, trace)) = next else {
                break;
            };

            failures.extend(exporters.deliver(&aggregated, &trace));
        }

        failures
    }

    /// Determines the depth of the span an exit request refers to, without changing state.
    fn resolve_exit_depth(&self, stack: &SpanStack, target: ExitTarget<'_>) -> Result<usize> {
        let top = stack.top().ok_or(Error::StackImbalance)?;

        let mismatch = |expected: SpanName| Error::SpanMismatch {
            expected,
            found: top.name.clone(),
        };

        match target {
            ExitTarget::Innermost => Ok(top.depth),
            ExitTarget::Named(name) if top.name == name => Ok(top.depth),
            ExitTarget::Named(name) => {
                if self.strict {
                    return Err(mismatch(SpanName::Owned(name.to_owned())));
                }

                stack
                    .innermost_depth_where(|span| span.name == name)
                    .ok_or_else(|| mismatch(SpanName::Owned(name.to_owned())))
            }
            ExitTarget::Span(id, _) if top.id == id => Ok(top.depth),
            ExitTarget::Span(id, name) => {
                if self.strict {
                    return Err(mismatch(name.clone()));
                }

                stack
                    .innermost_depth_where(|span| span.id == id)
                    .ok_or_else(|| mismatch(name.clone()))
            }
        }
    }

    /// Adds a tag to the round in progress. The last value written for a key wins.
    ///
    /// Does nothing if no round is in progress.
    pub fn add_tag(&self, key: impl Into<TagKey>, value: impl Into<TagValue>) {
        // Conversions are user code and may call back into the stopwatch.
        let (key, value) = (key.into(), value.into());

        let mut round = self.round.borrow_mut();

        if round.stack.is_empty() {
            tracing::trace!("tag ignored because no round is in progress");
            return;
        }

        round.tags.add_tag(key, value);
    }

    /// Adds the tag `key = true` to the round if the innermost open span turns out to be open
    /// for at least `threshold`.
    ///
    /// The comparison happens when that span exits. Does nothing if no round is in progress.
    pub fn add_slow_tag(&self, key: impl Into<TagKey>, threshold: Duration) {
        let key = key.into();

        let mut round = self.round.borrow_mut();

        match round.stack.top_mut() {
            Some(span) => span.slow_tags.push((key, threshold)),
            None => tracing::trace!("slow tag ignored because no round is in progress"),
        }
    }

    /// Adds the tag `key = true` to the round if `observed >= threshold`. Returns whether the
    /// tag was added.
    ///
    /// Use this when the duration to compare was measured by other means. Does nothing and
    /// returns `false` if no round is in progress.
    pub fn tag_if_slow(
        &self,
        key: impl Into<TagKey>,
        threshold: Duration,
        observed: Duration,
    ) -> bool {
        let key = key.into();

        let mut round = self.round.borrow_mut();

        if round.stack.is_empty() {
            return false;
        }

        round.tags.add_slow_tag(key, threshold, observed)
    }

    /// Attaches a key/value annotation to the innermost open span.
    ///
    /// Annotations appear in the trace record of that span. Does nothing if no round is in
    /// progress.
    pub fn annotate(&self, key: impl Into<TagKey>, value: impl Into<TagValue>) {
        let (key, value) = (key.into(), value.into());

        let mut round = self.round.borrow_mut();

        if let Some(span) = round.stack.top_mut() {
            span.annotations.push((key, value));
        }
    }

    pub(crate) fn annotate_span(&self, id: SpanId, key: TagKey, value: TagValue) {
        let mut round = self.round.borrow_mut();

        if let Some(span) = round.stack.get_mut(id) {
            span.annotations.push((key, value));
        }
    }

    /// Whether a round is currently in progress.
    #[must_use]
    pub fn phase(&self) -> RoundPhase {
        if self.round.borrow().stack.is_empty() {
            RoundPhase::Idle
        } else {
            RoundPhase::InProgress
        }
    }

    /// The number of currently open spans, including the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.round.borrow().stack.len()
    }

    /// The tags added to the round in progress so far.
    #[must_use]
    pub fn tags(&self) -> BTreeMap<TagKey, TagValue> {
        self.round.borrow().tags.snapshot()
    }

    /// The aggregated report of the most recently completed round.
    #[must_use]
    pub fn last_aggregated_report(&self) -> Option<Arc<AggregatedReport>> {
        self.last_aggregated_report.borrow().clone()
    }

    /// The trace report of the most recently completed round.
    #[must_use]
    pub fn last_trace_report(&self) -> Option<Arc<TraceReport>> {
        self.last_trace_report.borrow().clone()
    }

    fn allocate_span_id(&self) -> SpanId {
        let value = self.next_span_id.get();
        self.next_span_id.set(value.wrapping_add(1));
        SpanId::new(value)
    }
}
