use std::fmt;

use thiserror::Error;

use crate::SpanName;

/// Errors that can occur when recording spans or finalizing a round.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A span exit was requested but no span is open.
    ///
    /// This is a defect in the calling code: every exit must match an earlier enter. The
    /// stopwatch state is left untouched, so no phantom data is recorded.
    #[error("span exit requested but no span is open")]
    StackImbalance,

    /// A span exit named a span that is not the innermost open span.
    ///
    /// In strict mode this is reported whenever the names differ. In lenient mode it is only
    /// reported when no open span carries the expected name. Either way, the stopwatch state
    /// is left untouched.
    #[error("span exit expected '{expected}' but the innermost open span is '{found}'")]
    SpanMismatch {
        /// The name the caller tried to exit.
        expected: SpanName,

        /// The name of the innermost open span at the time of the exit.
        found: SpanName,
    },

    /// An export callback failed while a completed round was being delivered.
    ///
    /// The round has already been reset when this is reported; the stopwatch is ready for
    /// the next round.
    #[error("{kind} export failed: {message}")]
    ExportFailed {
        /// Which of the export callbacks failed.
        kind: ExportKind,

        /// A human-readable description of the failure (error message or panic payload).
        message: String,
    },
}

/// Identifies one of the export callbacks invoked at the end of a round.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ExportKind {
    /// The callback receiving the [`AggregatedReport`][crate::AggregatedReport].
    Aggregated,

    /// The callback receiving the [`TraceReport`][crate::TraceReport].
    Tracing,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregated => write!(f, "aggregated report"),
            Self::Tracing => write!(f, "trace report"),
        }
    }
}

/// A specialized `Result` type for stopwatch operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
