//! Round tags and span annotation values.

use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::time::Duration;

use crate::TagKey;

/// The value of a round tag or span annotation.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum TagValue {
    /// A text value.
    Str(String),

    /// An integer value.
    Int(i64),

    /// A floating point value.
    Float(f64),

    /// A boolean value. Slow tags use `true`.
    Bool(bool),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for TagValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for TagValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The tags attached to one round, keyed by tag name.
///
/// Iteration order is by key, so reports render tags deterministically.
#[derive(Debug, Default)]
pub(crate) struct TagSet {
    tags: BTreeMap<TagKey, TagValue>,
}

impl TagSet {
    /// Inserts a tag. The last write for a key wins.
    pub(crate) fn add_tag(&mut self, key: TagKey, value: TagValue) {
        self.tags.insert(key, value);
    }

    /// Inserts a `true` tag if `observed >= threshold`. Returns whether the tag was added.
    pub(crate) fn add_slow_tag(
        &mut self,
        key: TagKey,
        threshold: Duration,
        observed: Duration,
    ) -> bool {
        if observed < threshold {
            return false;
        }

        self.add_tag(key, TagValue::Bool(true));
        true
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<TagKey, TagValue> {
        self.tags.clone()
    }

    /// Removes all tags, leaving the set empty.
    pub(crate) fn take(&mut self) -> BTreeMap<TagKey, TagValue> {
        mem::take(&mut self.tags)
    }

    pub(crate) fn reset(&mut self) {
        self.tags.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
