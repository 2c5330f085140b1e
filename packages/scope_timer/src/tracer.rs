//! Per-entry span records for one round.

use std::mem;
use std::time::Duration;

use foldhash::{HashMap, HashMapExt};

use crate::{SpanId, SpanName, TagKey, TagValue};

/// One completed span occurrence.
///
/// Unlike aggregate entries, trace records are never merged: a span entered 50 times in a loop
/// produces 50 records.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRecord {
    name: SpanName,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    start_offset: Duration,
    duration: Duration,
    depth: usize,
    annotations: Vec<(TagKey, TagValue)>,
}

impl TraceRecord {
    pub(crate) fn new(
        name: SpanName,
        span_id: SpanId,
        parent_span_id: Option<SpanId>,
        start_offset: Duration,
        duration: Duration,
        depth: usize,
        annotations: Vec<(TagKey, TagValue)>,
    ) -> Self {
        Self {
            name,
            span_id,
            parent_span_id,
            start_offset,
            duration,
            depth,
            annotations,
        }
    }

    /// The name of the span.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identifier assigned to the span when it was entered.
    #[must_use]
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// The identifier of the enclosing span, `None` for the root span.
    #[must_use]
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    /// When the span was entered, relative to the start of the root span.
    #[must_use]
    pub fn start_offset(&self) -> Duration {
        self.start_offset
    }

    /// How long the span was open.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The number of spans that were open when this span was entered (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Annotations attached to the span while it was open, in the order they were added.
    #[must_use]
    pub fn annotations(&self) -> &[(TagKey, TagValue)] {
        &self.annotations
    }
}

/// Limits applied to what the tracer keeps.
///
/// The defaults keep every record.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TraceLimits {
    pub(crate) min_duration: Duration,
    pub(crate) max_per_name: Option<usize>,
}

impl Default for TraceLimits {
    fn default() -> Self {
        Self {
            min_duration: Duration::ZERO,
            max_per_name: None,
        }
    }
}

/// Collects trace records in completion order.
#[derive(Debug)]
pub(crate) struct Tracer {
    limits: TraceLimits,
    records: Vec<TraceRecord>,
    per_name: HashMap<SpanName, usize>,
}

impl Tracer {
    pub(crate) fn new(limits: TraceLimits) -> Self {
        Self {
            limits,
            records: Vec::new(),
            per_name: HashMap::new(),
        }
    }

    /// Appends a record unless the configured limits exclude it. Returns whether it was kept.
    ///
    /// The root span is always kept, so every completed round has at least one record.
    pub(crate) fn record(&mut self, record: TraceRecord) -> bool {
        let is_root = record.depth == 0;

        if !is_root && !self.admits(&record) {
            return false;
        }

        let traced = self.per_name.entry(record.name.clone()).or_insert(0);
        *traced = traced.saturating_add(1);

        self.records.push(record);
        true
    }

    fn admits(&self, record: &TraceRecord) -> bool {
        if record.duration < self.limits.min_duration {
            return false;
        }

        match self.limits.max_per_name {
            None => true,
            Some(max) => self.per_name.get(&record.name).copied().unwrap_or(0) < max,
        }
    }

    /// Removes the recorded spans in completion order, leaving the tracer empty.
    pub(crate) fn take(&mut self) -> Vec<TraceRecord> {
        self.per_name.clear();
        mem::take(&mut self.records)
    }

    pub(crate) fn reset(&mut self) {
        self.records.clear();
        self.per_name.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::indexing_slicing, reason = "panic is fine in tests")]
mod tests {
    use super::*;

    fn record(name: &'static str, id: u64, duration: Duration, depth: usize) -> TraceRecord {
        TraceRecord::new(
            name.into(),
            SpanId::new(id),
            None,
            Duration::ZERO,
            duration,
            depth,
            Vec::new(),
        )
    }

    #[test]
    fn records_are_kept_in_completion_order() {
        let mut tracer = Tracer::new(TraceLimits::default());

        tracer.record(record("grandchild", 3, Duration::from_millis(1), 2));
        tracer.record(record("child", 2, Duration::from_millis(2), 1));
        tracer.record(record("root", 1, Duration::from_millis(3), 0));

        let names: Vec<_> = tracer.take().iter().map(|r| r.name().to_owned()).collect();
        assert_eq!(names, ["grandchild", "child", "root"]);
    }

    #[test]
    fn repeated_names_are_never_merged() {
        let mut tracer = Tracer::new(TraceLimits::default());

        for id in 0..50 {
            tracer.record(record("inner_task", id, Duration::from_millis(100), 1));
        }

        assert_eq!(tracer.take().len(), 50);
    }

    #[test]
    fn short_records_are_dropped_below_minimum() {
        let mut tracer = Tracer::new(TraceLimits {
            min_duration: Duration::from_millis(3),
            max_per_name: None,
        });

        assert!(!tracer.record(record("fast", 1, Duration::from_millis(2), 1)));
        assert!(tracer.record(record("exact", 2, Duration::from_millis(3), 1)));

        let records = tracer.take();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "exact");
    }

    #[test]
    fn per_name_cap_is_enforced() {
        let mut tracer = Tracer::new(TraceLimits {
            min_duration: Duration::ZERO,
            max_per_name: Some(2),
        });

        for id in 0..5 {
            tracer.record(record("loop_body", id, Duration::from_millis(1), 1));
        }
        tracer.record(record("other", 9, Duration::from_millis(1), 1));

        let records = tracer.take();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].span_id(), SpanId::new(1));
        assert_eq!(records[2].name(), "other");
    }

    #[test]
    fn root_is_kept_regardless_of_limits() {
        let mut tracer = Tracer::new(TraceLimits {
            min_duration: Duration::from_secs(10),
            max_per_name: Some(0),
        });

        assert!(tracer.record(record("root", 1, Duration::ZERO, 0)));
        assert_eq!(tracer.take().len(), 1);
    }

    #[test]
    fn reset_clears_records_and_caps() {
        let mut tracer = Tracer::new(TraceLimits {
            min_duration: Duration::ZERO,
            max_per_name: Some(1),
        });
        tracer.record(record("task", 1, Duration::ZERO, 1));

        tracer.reset();

        assert!(tracer.is_empty());
        assert!(tracer.record(record("task", 2, Duration::ZERO, 1)));
    }

    #[test]
    fn take_leaves_tracer_empty_and_resets_caps() {
        let mut tracer = Tracer::new(TraceLimits {
            min_duration: Duration::ZERO,
            max_per_name: Some(1),
        });
        tracer.record(record("task", 1, Duration::ZERO, 1));

        assert_eq!(tracer.take().len(), 1);
        assert!(tracer.is_empty());
        assert!(tracer.record(record("task", 2, Duration::ZERO, 1)));
    }
}
