//! The stack of currently open spans.

use std::time::Duration;

use crate::{SpanId, SpanName, TagKey, TagValue};

/// A span that has been entered but not yet exited.
#[derive(Debug)]
pub(crate) struct OpenSpan {
    pub(crate) id: SpanId,
    pub(crate) name: SpanName,
    pub(crate) bucket: Option<SpanName>,
    pub(crate) start: Duration,
    pub(crate) depth: usize,
    pub(crate) annotations: Vec<(TagKey, TagValue)>,

    // Tags to add to the round if this span turns out to be at least this slow.
    pub(crate) slow_tags: Vec<(TagKey, Duration)>,
}

impl OpenSpan {
    pub(crate) fn duration_until(&self, end: Duration) -> Duration {
        end.saturating_sub(self.start)
    }
}

/// Open spans in entry order; the last element is the innermost span.
///
/// The depth of a span is its position in the stack, so the root is always at depth 0 and
/// exits are strictly LIFO.
#[derive(Debug, Default)]
pub(crate) struct SpanStack {
    spans: Vec<OpenSpan>,
}

impl SpanStack {
    /// Pushes a new span on top of the stack and returns its depth.
    pub(crate) fn push(
        &mut self,
        id: SpanId,
        name: SpanName,
        bucket: Option<SpanName>,
        start: Duration,
    ) -> usize {
        let depth = self.spans.len();

        self.spans.push(OpenSpan {
            id,
            name,
            bucket,
            start,
            depth,
            annotations: Vec::new(),
            slow_tags: Vec::new(),
        });

        depth
    }

    pub(crate) fn pop(&mut self) -> Option<OpenSpan> {
        self.spans.pop()
    }

    pub(crate) fn top(&self) -> Option<&OpenSpan> {
        self.spans.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut OpenSpan> {
        self.spans.last_mut()
    }

    /// The root span of the round in progress, if any.
    pub(crate) fn root(&self) -> Option<&OpenSpan> {
        self.spans.first()
    }

    /// Finds the open span with the given identifier.
    pub(crate) fn get_mut(&mut self, id: SpanId) -> Option<&mut OpenSpan> {
        self.spans.iter_mut().rev().find(|span| span.id == id)
    }

    /// Depth of the innermost open span satisfying `predicate`.
    pub(crate) fn innermost_depth_where(
        &self,
        mut predicate: impl FnMut(&OpenSpan) -> bool,
    ) -> Option<usize> {
        self.spans
            .iter()
            .rev()
            .find(|span| predicate(span))
            .map(|span| span.depth)
    }

    /// Removes and returns every span above `depth`, innermost first.
    pub(crate) fn unwind_above(&mut self, depth: usize) -> Vec<OpenSpan> {
        let keep = depth.saturating_add(1).min(self.spans.len());
        let mut discarded = self.spans.split_off(keep);
        discarded.reverse();
        discarded
    }

    pub(crate) fn len(&self) -> usize {
        self.spans.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.spans.clear();
    }
}
