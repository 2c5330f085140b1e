//! Delivery of completed-round reports to export callbacks.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};

use crate::{AggregatedReport, Error, ExportKind, TraceReport};

/// The error type export callbacks may return.
pub type ExportError = Box<dyn StdError + Send + Sync>;

/// The return type of export callbacks.
pub type ExportResult = Result<(), ExportError>;

pub(crate) type AggregatedExportFn = Box<dyn FnMut(&AggregatedReport) -> ExportResult + Send>;
pub(crate) type TracingExportFn = Box<dyn FnMut(&TraceReport) -> ExportResult + Send>;

/// The export callbacks configured for a stopwatch.
#[derive(Default)]
pub(crate) struct Exporters {
    pub(crate) aggregated: Option<AggregatedExportFn>,
    pub(crate) tracing: Option<TracingExportFn>,
}

impl Exporters {
    /// Hands the reports of a completed round to the configured callbacks.
    ///
    /// Without an aggregated callback, the aggregated report is printed to stdout. Without a
    /// tracing callback, the trace report is not delivered anywhere.
    ///
    /// A callback that returns an error or panics does not prevent the other callback from
    /// running. Every failure is returned.
    pub(crate) fn deliver(
        &mut self,
        aggregated: &AggregatedReport,
        trace: &TraceReport,
    ) -> Vec<Error> {
        self.deliver_with_default_output(aggregated, trace, || io::stdout().lock())
    }

    /// Same as [`deliver()`][Self::deliver] but the aggregated report is written to the output
    /// returned by `default_output` when no aggregated callback is configured.
    ///
    /// Write failures of the default output are handled like callback failures.
    pub(crate) fn deliver_with_default_output<W: Write>(
        &mut self,
        aggregated: &AggregatedReport,
        trace: &TraceReport,
        default_output: impl FnOnce() -> W,
    ) -> Vec<Error> {
        let mut failures = Vec::new();

        let result = match self.aggregated.as_mut() {
            Some(export) => invoke(ExportKind::Aggregated, || export(aggregated)),
            None => invoke(ExportKind::Aggregated, || {
                writeln!(default_output(), "{aggregated}")?;
                Ok(())
            }),
        };

        if let Err(error) = result {
            failures.push(error);
        }

        if let Some(export) = self.tracing.as_mut() {
            if let Err(error) = invoke(ExportKind::Tracing, || export(trace)) {
                failures.push(error);
            }
        }

        failures
    }
}

impl fmt::Debug for Exporters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporters")
            .field("aggregated", &self.aggregated.is_some())
            .field("tracing", &self.tracing.is_some())
            .finish()
    }
}

fn invoke(kind: ExportKind, export: impl FnOnce() -> ExportResult) -> Result<(), Error> {
    let message = match panic::catch_unwind(AssertUnwindSafe(export)) {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(error)) => error.to_string(),
        Err(payload) => format!("callback panicked: {}", format_panic_payload(&*payload)),
    };

    tracing::warn!(%kind, %message, "report export failed");

    Err(Error::ExportFailed { kind, message })
}

/// Formats a panic payload for logging.
fn format_panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
