use std::borrow::Cow;
use std::fmt;

/// The name of a span, used for display and as the aggregation key.
///
/// Typically span names are `&'static str` but for rare cases when the set of spans is not
/// known in advance, we also support owned strings via `Cow`.
pub type SpanName = Cow<'static, str>;

/// The key of a round tag or span annotation.
pub type TagKey = Cow<'static, str>;

/// Identifies one span entry within a [`Stopwatch`][crate::Stopwatch].
///
/// Identifiers are assigned in entry order and are never reused by the same stopwatch,
/// including across rounds.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SpanId(u64);

impl SpanId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The numeric value of the identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn span_id_displays_as_fixed_width_hex() {
        assert_eq!(SpanId::new(255).to_string(), "00000000000000ff");
    }
}
