use super::TimingBreakdown;
use crate::exec::{ExecutionStats, Realization};
use crate::image::ImageView;
use crate::schedule::ScheduleSpec;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl ImageDescriptor {
    pub fn of<V: ImageView>(view: &V) -> Self {
        Self {
            width: view.width(),
            height: view.height(),
            channels: view.channels(),
        }
    }
}

/// Summary of one pipeline invocation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub pipeline: String,
    pub inputs: Vec<ImageDescriptor>,
    pub output: ImageDescriptor,
    pub schedule: ScheduleSpec,
    pub stats: ExecutionStats,
}

impl RunReport {
    pub fn new(
        pipeline: impl Into<String>,
        inputs: Vec<ImageDescriptor>,
        schedule: &ScheduleSpec,
        realization: &Realization,
    ) -> Self {
        let out = &realization.output;
        Self {
            pipeline: pipeline.into(),
            inputs,
            output: ImageDescriptor {
                width: out.width(),
                height: out.height(),
                channels: out.channels(),
            },
            schedule: schedule.clone(),
            stats: realization.stats.clone(),
        }
    }

    pub fn timing(&self) -> &TimingBreakdown {
        &self.stats.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageU8;
    use crate::pipelines::{BlurParams, SeparableBlur};

    #[test]
    fn report_serializes_shapes_and_counters() {
        let data = vec![10u8; 12 * 6];
        let img = ImageU8::gray(12, 6, &data);
        let blur = SeparableBlur::new(BlurParams::default()).unwrap();
        let schedule = blur.default_schedule();
        let realization = blur.run_with(&img, &schedule).unwrap();
        let inputs = vec![ImageDescriptor::of(&img)];
        let report = RunReport::new("blur", inputs, &schedule, &realization);

        assert_eq!(report.output.width, 12);
        assert_eq!(report.output.channels, 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["pipeline"], "blur");
        assert_eq!(json["inputs"][0]["height"], 6);
        assert!(json["stats"]["fallbackEvaluations"].is_number());
        assert!(report.timing().stage("blur_y").is_some());
    }
}
