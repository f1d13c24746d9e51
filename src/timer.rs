//! Per-call phase timing.
//!
//! A [`CallTimer`] accumulates named phase durations for one invocation and
//! emits a single `function_call_metrics` event when finished.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const RECEIVE_DATA: &str = "receive_data";
pub const PARSE_INPUT: &str = "parse_input";
pub const CALL_FUNCTION: &str = "call_function";
pub const FORMAT_OUTPUT: &str = "format_output";
pub const SEND_RESPONSE: &str = "send_response";

#[derive(Debug)]
pub struct CallTimer {
    request_id: Uuid,
    function: String,
    started_at: DateTime<Utc>,
    start: Instant,
    phases: Vec<(&'static str, Duration)>,
}

impl CallTimer {
    pub fn start(function: impl Into<String>) -> Self {
        CallTimer {
            request_id: Uuid::new_v4(),
            function: function.into(),
            started_at: Utc::now(),
            start: Instant::now(),
            phases: Vec::new(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Run `f` and record its duration under `phase`. Repeated phases add up.
    pub fn time<T>(&mut self, phase: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(phase, start.elapsed());
        out
    }

    pub fn record(&mut self, phase: &'static str, elapsed: Duration) {
        match self.phases.iter_mut().find(|(name, _)| *name == phase) {
            Some((_, total)) => *total += elapsed,
            None => self.phases.push((phase, elapsed)),
        }
    }

    pub fn phase(&self, phase: &str) -> Option<Duration> {
        self.phases
            .iter()
            .find(|(name, _)| *name == phase)
            .map(|(_, d)| *d)
    }

    /// Total elapsed time; logs the metrics event when `enabled`.
    pub fn finish(self, enabled: bool) -> Duration {
        let total = self.start.elapsed();
        if enabled {
            let ms = |phase: &str| self.phase(phase).map_or(0.0, |d| d.as_secs_f64() * 1000.0);
            tracing::info!(
                request_id = %self.request_id,
                function = %self.function,
                started_at = %self.started_at.to_rfc3339(),
                receive_data_ms = ms(RECEIVE_DATA),
                parse_input_ms = ms(PARSE_INPUT),
                call_function_ms = ms(CALL_FUNCTION),
                format_output_ms = ms(FORMAT_OUTPUT),
                send_response_ms = ms(SEND_RESPONSE),
                total_ms = total.as_secs_f64() * 1000.0,
                "function_call_metrics"
            );
        }
        total
    }
}
