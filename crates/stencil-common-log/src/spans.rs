//! Span helpers for template compilation.

use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Span covering one run of the compile pipeline.
pub fn compile_span(path: &str, module: &str) -> Span {
    info_span!("compile", path = %path, module = %module)
}

/// Span covering one cache invalidation.
pub fn invalidate_span(path: &str) -> Span {
    info_span!("invalidate", path = %path)
}

/// Instrument a future with a span.
pub fn instrument_future<F: Future>(future: F, span: Span) -> impl Future<Output = F::Output> {
    future.instrument(span)
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Milliseconds elapsed so far.
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    /// Complete the timer and record duration.
    pub fn finish(self) -> u128 {
        let elapsed = self.elapsed_ms();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %elapsed,
            "operation completed"
        );
        elapsed
    }
}
