//! Reports produced when a round completes.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use crate::aggregator::AggregateEntry;
use crate::{SpanName, TagKey, TagValue, TraceRecord};

const NAME_COLUMN_WIDTH: usize = 40;

/// Aggregated timing statistics for one completed round.
///
/// There is one [`SpanSummary`] per distinct span name, in the order the names were first
/// entered during the round. The root span is always the first summary.
///
/// For human-readable output, use the `Display` trait implementation. For machine-readable
/// output, inspect the report contents via the provided methods.
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
///     for _ in 0..4 {
///         let _query = stopwatch.timer("query");
///         clock.advance(Duration::from_millis(10));
///     }
///     clock.advance(Duration::from_millis(60));
/// }
///
/// let report = stopwatch.last_aggregated_report().unwrap();
/// let query = report.summary("query").unwrap();
///
/// assert_eq!(query.count(), 4);
/// assert_eq!(query.total_duration(), Duration::from_millis(40));
/// assert!((query.percentage() - 40.0).abs() < 1e-9);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedReport {
    root_name: SpanName,
    root_duration: Duration,
    summaries: Vec<SpanSummary>,
    tags: BTreeMap<TagKey, TagValue>,
}

impl AggregatedReport {
    pub(crate) fn new(
        root_name: SpanName,
        root_duration: Duration,
        entries: Vec<AggregateEntry>,
        tags: BTreeMap<TagKey, TagValue>,
    ) -> Self {
        let summaries = entries
            .into_iter()
            .map(|entry| {
                let percentage = percentage_of_root(
                    &entry.name,
                    entry.total_duration,
                    &root_name,
                    root_duration,
                );

                SpanSummary {
                    name: entry.name,
                    count: entry.count,
                    total_duration: entry.total_duration,
                    percentage,
                    depth: entry.depth,
                    bucket: entry.bucket,
                }
            })
            .collect();

        Self {
            root_name,
            root_duration,
            summaries,
            tags,
        }
    }

    /// The name of the root span that delimited the round.
    #[must_use]
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// How long the root span was open.
    #[must_use]
    pub fn root_duration(&self) -> Duration {
        self.root_duration
    }

    /// Iterates over the per-name summaries in first-entry order.
    pub fn summaries(&self) -> impl Iterator<Item = &SpanSummary> {
        self.summaries.iter()
    }

    /// The summary for spans with the given name, if any such span exited in the round.
    #[must_use]
    pub fn summary(&self, name: &str) -> Option<&SpanSummary> {
        self.summaries.iter().find(|summary| summary.name == name)
    }

    /// The tags attached to the round, ordered by key.
    #[must_use]
    pub fn tags(&self) -> &BTreeMap<TagKey, TagValue> {
        &self.tags
    }

    /// Prints the report to stdout.
    ///
    /// A failure to write (e.g. stdout is a closed pipe) is logged, not raised.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        if let Err(error) = writeln!(io::stdout().lock(), "{self}") {
            tracing::warn!(root = %self.root_name, %error, "failed to print aggregated report");
        }
    }
}

/// `100 * total / root`, with a zero-length root defined as 100% for the root name and 0%
/// for everything else.
fn percentage_of_root(
    name: &SpanName,
    total: Duration,
    root_name: &SpanName,
    root_duration: Duration,
) -> f64 {
    if root_duration.is_zero() {
        return if name == root_name { 100.0 } else { 0.0 };
    }

    100.0 * total.as_secs_f64() / root_duration.as_secs_f64()
}

impl fmt::Display for AggregatedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Round '{}' took {}",
            self.root_name,
            Millis(self.root_duration)
        )?;

        for summary in &self.summaries {
            writeln!(f, "{summary}")?;
        }

        write_tags(f, &self.tags)
    }
}

/// Statistics for all spans with one name within a round.
///
/// Part of an [`AggregatedReport`].
#[derive(Clone, Debug, PartialEq)]
pub struct SpanSummary {
    name: SpanName,
    count: u64,
    total_duration: Duration,
    percentage: f64,
    depth: usize,
    bucket: Option<SpanName>,
}

impl SpanSummary {
    /// The span name these statistics belong to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How many spans with this name exited during the round.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The exact sum of the durations of all spans with this name.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// `100 * total_duration / root_duration`.
    ///
    /// The root span itself reports 100. Names that are also entered recursively inside
    /// themselves may report more than 100 because nested durations are counted again.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// The depth at which a span with this name was first entered (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The bucket of the first span with this name that was given one.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Calculates the mean duration of one span with this name.
    #[must_use]
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }

        let mean_nanos = self
            .total_duration
            .as_nanos()
            .checked_div(u128::from(self.count))
            .unwrap_or_default();

        Duration::from_nanos(u64::try_from(mean_nanos).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for SpanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut label = "  ".repeat(self.depth.saturating_add(1));
        label.push_str(&self.name);

        if let Some(bucket) = &self.bucket {
            label.push_str(" [");
            label.push_str(bucket);
            label.push(']');
        }

        write!(
            f,
            "{label:<width$} {count:>6} {total:>14} {percentage:>5.0}%",
            width = NAME_COLUMN_WIDTH,
            count = self.count,
            total = Millis(self.total_duration).to_string(),
            percentage = self.percentage,
        )
    }
}

/// Every traced span occurrence of one completed round.
///
/// Records are in completion order: children appear before their parents and the root span
/// is always the last record.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceReport {
    root_name: SpanName,
    records: Vec<TraceRecord>,
    tags: BTreeMap<TagKey, TagValue>,
}

impl TraceReport {
    pub(crate) fn new(
        root_name: SpanName,
        records: Vec<TraceRecord>,
        tags: BTreeMap<TagKey, TagValue>,
    ) -> Self {
        Self {
            root_name,
            records,
            tags,
        }
    }

    /// The name of the root span that delimited the round.
    #[must_use]
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// The trace records in completion order.
    #[must_use]
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// The tags attached to the round, ordered by key.
    #[must_use]
    pub fn tags(&self) -> &BTreeMap<TagKey, TagValue> {
        &self.tags
    }
}

impl fmt::Display for TraceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trace of round '{}':", self.root_name)?;

        for record in &self.records {
            let indent = "  ".repeat(record.depth().saturating_add(1));
            writeln!(
                f,
                "{indent}{name} [{id}] at +{offset} for {duration}",
                name = record.name(),
                id = record.span_id(),
                offset = Millis(record.start_offset()),
                duration = Millis(record.duration()),
            )?;
        }

        write_tags(f, &self.tags)
    }
}

fn write_tags(f: &mut fmt::Formatter<'_>, tags: &BTreeMap<TagKey, TagValue>) -> fmt::Result {
    write!(f, "Tags:")?;

    if tags.is_empty() {
        return writeln!(f, " (none)");
    }

    for (index, (key, value)) in tags.iter().enumerate() {
        let separator = if index == 0 { " " } else { ", " };
        write!(f, "{separator}{key}={value}")?;
    }

    writeln!(f)
}

/// Renders a duration as fractional milliseconds.
struct Millis(Duration);

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}ms", self.0.as_secs_f64() * 1000.0)
    }
}
