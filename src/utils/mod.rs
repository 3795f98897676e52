pub mod perf;

pub use perf::{LatencyWindow, TurnTimer};
