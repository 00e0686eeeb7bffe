//! Demo orchestration: synthetic producers driven through real sessions.

mod orchestrator;
mod stats;

pub use orchestrator::{Demo, DemoConfig};
pub use stats::DemoStats;
