//! Progress reporting as an injected sink.
//!
//! The engines push one update per iteration; rendering is the sink's
//! business. The default sink logs through tracing, tests use the null
//! sink.

/// One per-iteration snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub iteration: usize,
    /// Best incumbent value Q̃.
    pub objective: f64,
    /// Lower model value θ.
    pub lower_bound: f64,
    /// Relative gap.
    pub gap: f64,
    /// Cuts generated so far.
    pub num_cuts: usize,
}

/// Sink for progress updates.
pub trait ProgressSink: Send {
    fn update(&mut self, update: &ProgressUpdate);
}

/// Logs each update through tracing.
#[derive(Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn update(&mut self, update: &ProgressUpdate) {
        tracing::info!(
            component = "engine",
            operation = "iterate",
            status = "progress",
            iteration = update.iteration,
            objective = update.objective,
            lower_bound = update.lower_bound,
            gap = update.gap,
            num_cuts = update.num_cuts,
            "L-shaped progress"
        );
    }
}

/// Discards every update.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&mut self, _update: &ProgressUpdate) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinks_accept_updates() {
        let update = ProgressUpdate {
            iteration: 1,
            objective: 10.0,
            lower_bound: 9.5,
            gap: 0.05,
            num_cuts: 4,
        };
        LogSink.update(&update);
        NullSink.update(&update);
    }
}
