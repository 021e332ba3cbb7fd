//! Span helpers for flow runs.

use std::time::Instant;
use tracing::Span;
use uuid::Uuid;

/// Span attributes for a flow run.
#[derive(Debug, Clone)]
pub struct FlowSpanAttributes {
    /// Flow name.
    pub flow_name: Option<String>,
    /// Run ID.
    pub run_id: Uuid,
    /// Number of steps in the flow.
    pub step_count: usize,
}

impl FlowSpanAttributes {
    /// Creates attributes for a run.
    #[must_use]
    pub fn new(run_id: Uuid, step_count: usize) -> Self {
        Self {
            flow_name: None,
            run_id,
            step_count,
        }
    }

    /// Sets the flow name.
    #[must_use]
    pub fn with_flow_name(mut self, name: Option<&str>) -> Self {
        self.flow_name = name.map(str::to_string);
        self
    }

    /// Opens the `flow.run` span.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "flow.run",
            flow = self.flow_name.as_deref().unwrap_or("unnamed"),
            run_id = %self.run_id,
            steps = self.step_count,
        )
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
}

impl SpanTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_span_attributes() {
        let run_id = Uuid::new_v4();
        let attrs = FlowSpanAttributes::new(run_id, 3).with_flow_name(Some("ingest"));

        assert_eq!(attrs.flow_name.as_deref(), Some("ingest"));
        assert_eq!(attrs.run_id, run_id);
        assert_eq!(attrs.step_count, 3);
    }

    #[test]
    fn test_span_carries_run_fields() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let span = FlowSpanAttributes::new(Uuid::new_v4(), 0).span();
            let metadata = span.metadata().map(|m| (m.name(), m.fields().len()));
            assert_eq!(metadata, Some(("flow.run", 3)));
            assert!(span.metadata().is_some_and(|m| m.fields().field("run_id").is_some()));
        });
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }
}
