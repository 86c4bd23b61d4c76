use crate::buffer::Region;
use serde::{Deserialize, Serialize};

/// Wall time spent realizing one root stage over its demanded region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: String,
    pub region: Region,
    pub elapsed_ms: f64,
}

impl StageTiming {
    /// Realized points per millisecond; `None` for runs below timer resolution.
    pub fn throughput(&self) -> Option<f64> {
        (self.elapsed_ms > 0.0).then(|| self.region.area() as f64 / self.elapsed_ms)
    }
}

/// Root-stage timings of one run, in realization order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn record(&mut self, stage: impl Into<String>, region: Region, elapsed_ms: f64) {
        self.stages.push(StageTiming {
            stage: stage.into(),
            region,
            elapsed_ms,
        });
    }

    pub fn stage(&self, name: &str) -> Option<&StageTiming> {
        self.stages.iter().find(|t| t.stage == name)
    }

    /// Time not attributed to any root stage (validation, bound inference).
    pub fn overhead_ms(&self) -> f64 {
        let staged: f64 = self.stages.iter().map(|s| s.elapsed_ms).sum();
        (self.total_ms - staged).max(0.0)
    }
}
