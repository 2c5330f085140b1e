//! Scoped span guards and the builder that creates them.

use std::time::Duration;

use crate::stopwatch::ExitTarget;
use crate::{Clock, MonotonicClock, Result, SpanExit, SpanId, SpanName, Stopwatch, TagKey, TagValue};

/// Builder for entering a span with options beyond a name.
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
///     let _root = stopwatch.timer("request");
///
///     clock.set(Duration::from_millis(30));
///     let _query = stopwatch
///         .span("load_user")
///         .bucket("database")
///         .start_at(Duration::from_millis(10))
///         .enter();
/// }
///
/// let report = stopwatch.last_aggregated_report().unwrap();
/// let load_user = report.summary("load_user").unwrap();
///
/// assert_eq!(load_user.bucket(), Some("database"));
/// assert_eq!(load_user.total_duration(), Duration::from_millis(20));
/// ```
#[derive(Debug)]
#[must_use = "the span is only entered by calling enter()"]
pub struct SpanBuilder<'a, C: Clock = MonotonicClock> {
    stopwatch: &'a Stopwatch<C>,
    name: SpanName,
    bucket: Option<SpanName>,
    start: Option<Duration>,
}

impl<'a, C: Clock> SpanBuilder<'a, C> {
    pub(crate) fn new(stopwatch: &'a Stopwatch<C>, name: SpanName) -> Self {
        Self {
            stopwatch,
            name,
            bucket: None,
            start: None,
        }
    }

    /// Places the span in a bucket, a category label shown next to the span name in the
    /// aggregated report.
    pub fn bucket(mut self, bucket: impl Into<SpanName>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Uses an explicit clock reading as the start of the span instead of the current one.
    pub fn start_at(mut self, start: Duration) -> Self {
        self.start = Some(start);
        self
    }

    /// Enters the span. It exits when the returned guard is dropped or finished.
    pub fn enter(self) -> SpanGuard<'a, C> {
        let id = self
            .stopwatch
            .enter_with(self.name.clone(), self.bucket, self.start);

        SpanGuard {
            stopwatch: self.stopwatch,
            id,
            name: self.name,
            finished: false,
        }
    }
}

/// An open span that exits when dropped.
///
/// The guard always exits its own span. If spans entered after it are still open when it is
/// dropped, a strict stopwatch refuses the exit and logs a warning, while a lenient one
/// discards those spans first.
///
/// Use [`finish()`][Self::finish] to exit explicitly and observe the outcome, including any
/// export failures if this span was the root of the round.
#[derive(Debug)]
#[must_use = "the span exits as soon as the guard is dropped"]
pub struct SpanGuard<'a, C: Clock = MonotonicClock> {
    stopwatch: &'a Stopwatch<C>,
    id: SpanId,
    name: SpanName,
    finished: bool,
}

impl<C: Clock> SpanGuard<'_, C> {
    /// The identifier of the guarded span.
    #[must_use]
    pub fn id(&self) -> SpanId {
        self.id
    }

    /// The name of the guarded span.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attaches a key/value annotation to the guarded span, even if other spans have been
    /// entered inside it since.
    pub fn annotate(&self, key: impl Into<TagKey>, value: impl Into<TagValue>) {
        self.stopwatch
            .annotate_span(self.id, key.into(), value.into());
    }

    /// Exits the span at the current clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StackImbalance`][crate::Error::StackImbalance] if no span is open
    /// anymore, or [`Error::SpanMismatch`][crate::Error::SpanMismatch] if the guarded span is
    /// not the innermost open span of a strict stopwatch or is no longer open at all. Nothing
    /// is recorded in either case.
    pub fn finish(self) -> Result<SpanExit> {
        self.finish_with(None)
    }

    /// Exits the span at the given clock reading.
    ///
    /// # Errors
    ///
    /// Same as [`finish()`][Self::finish].
    pub fn finish_at(self, end: Duration) -> Result<SpanExit> {
        self.finish_with(Some(end))
    }

    fn finish_with(mut self, end: Option<Duration>) -> Result<SpanExit> {
        self.finished = true;

        self.stopwatch
            .exit_with(ExitTarget::Span(self.id, &self.name), end)
    }
}

impl<C: Clock> Drop for SpanGuard<'_, C> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if let Err(error) = self
            .stopwatch
            .exit_with(ExitTarget::Span(self.id, &self.name), None)
        {
            tracing::warn!(span = %self.name, id = %self.id, %error, "span guard failed to exit its span");
        }
    }
}
