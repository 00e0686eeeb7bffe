//! Demo run statistics.

use std::time::Duration;

use observability::SessionMetricsAggregator;

#[derive(Debug, Clone, Default)]
pub struct DemoStats {
    pub sessions: usize,

    /// Frames the recording transports captured, terminal frames included
    pub frames_recorded: usize,

    /// Dispatch tasks that did not return a summary
    pub failed_tasks: usize,

    pub duration: Duration,

    pub sessions_metrics: SessionMetricsAggregator,
}

impl DemoStats {
    pub fn frames_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_recorded as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Demo Statistics ===\n");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Sessions: {}", self.sessions);
        println!("Frames recorded: {}", self.frames_recorded);
        println!("Frames/s: {:.2}", self.frames_per_second());
        if self.failed_tasks > 0 {
            println!("Failed dispatch tasks: {}", self.failed_tasks);
        }
        println!();
        print!("{}", self.sessions_metrics.summary());
        println!();
    }
}
