//! Serializable run diagnostics.
//!
//! [`RunReport`] is what the demo writes next to its output image: the input
//! and output shapes, the schedule that was used and the executor's counters
//! and per-stage timings.

pub mod report;
pub mod timing;

pub use report::{ImageDescriptor, RunReport};
pub use timing::{StageTiming, TimingBreakdown};
