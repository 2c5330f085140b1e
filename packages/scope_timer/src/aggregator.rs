//! Per-name span statistics for one round.

use std::mem;
use std::time::Duration;

use foldhash::{HashMap, HashMapExt};

use crate::SpanName;

/// Running statistics for all spans with the same name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct AggregateEntry {
    pub(crate) name: SpanName,
    pub(crate) count: u64,
    pub(crate) total_duration: Duration,

    // Depth of the first entry with this name, used to indent human-readable output.
    pub(crate) depth: usize,

    // First bucket seen for this name.
    pub(crate) bucket: Option<SpanName>,
}

/// Accumulates span durations per name, preserving first-entry order.
///
/// The hash index maps a name to its slot in `entries`; the slot order is the order in which
/// names were first entered in the round, which mirrors the call structure of the measured
/// code rather than any hashing order.
#[derive(Debug, Default)]
pub(crate) struct Aggregator {
    index: HashMap<SpanName, usize>,
    entries: Vec<AggregateEntry>,
}

impl Aggregator {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Reserves the report position of `name` when a span with that name is entered.
    ///
    /// A reserved entry has a count of zero until the first span with that name exits.
    pub(crate) fn reserve(&mut self, name: &SpanName, depth: usize) {
        if self.index.contains_key(name) {
            return;
        }

        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(AggregateEntry {
            name: name.clone(),
            count: 0,
            total_duration: Duration::ZERO,
            depth,
            bucket: None,
        });
    }

    /// Records one exit of a span with the given name.
    pub(crate) fn record(
        &mut self,
        name: &SpanName,
        duration: Duration,
        depth: usize,
        bucket: Option<&SpanName>,
    ) {
        self.reserve(name, depth);

        let slot = *self
            .index
            .get(name)
            .expect("reserve() guarantees that the name is indexed");
        let entry = self
            .entries
            .get_mut(slot)
            .expect("index only holds positions of existing entries");

        entry.count = entry.count.saturating_add(1);
        entry.total_duration = entry.total_duration.saturating_add(duration);

        if entry.bucket.is_none() {
            entry.bucket = bucket.cloned();
        }
    }

    /// Removes the recorded entries in first-entry order, leaving the aggregator empty.
    ///
    /// Names that were entered but never exited (possible when lenient unwinding discards
    /// spans) are omitted.
    pub(crate) fn take(&mut self) -> Vec<AggregateEntry> {
        self.index.clear();

        mem::take(&mut self.entries)
            .into_iter()
            .filter(|entry| entry.count > 0)
            .collect()
    }

    pub(crate) fn reset(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
