//! Configuration of `stencil_demo`: which pipeline to run on which files,
//! an optional schedule override and where to write the results.
//!
//! ```json
//! {
//!   "pipeline": { "kind": "harris", "input": "board.png",
//!                 "params": { "threshold": 1000.0 } },
//!   "output": { "image": "out/corners.png", "report_json": "out/report.json" }
//! }
//! ```
use crate::image::io::ColorMode;
use crate::pipelines::{BlurParams, GaussianParams, HarrisParams, StereoParams};
use crate::schedule::ScheduleSpec;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineConfig {
    Blur {
        input: PathBuf,
        #[serde(default = "rgb")]
        color: ColorMode,
        #[serde(default)]
        params: BlurParams,
    },
    Gaussian {
        input: PathBuf,
        #[serde(default)]
        params: GaussianParams,
    },
    Harris {
        input: PathBuf,
        #[serde(default)]
        params: HarrisParams,
    },
    Stereo {
        left: PathBuf,
        right: PathBuf,
        /// Missing remaps mean no displacement.
        left_remap: Option<PathBuf>,
        right_remap: Option<PathBuf>,
        #[serde(default)]
        params: StereoParams,
    },
}

fn rgb() -> ColorMode {
    ColorMode::Rgb
}

impl PipelineConfig {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineConfig::Blur { .. } => "blur",
            PipelineConfig::Gaussian { .. } => "gaussian",
            PipelineConfig::Harris { .. } => "harris",
            PipelineConfig::Stereo { .. } => "stereo",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DemoOutputConfig {
    pub image: PathBuf,
    #[serde(default)]
    pub report_json: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DemoConfig {
    pub pipeline: PipelineConfig,
    /// Replaces the pipeline's default schedule when present.
    #[serde(default)]
    pub schedule: Option<ScheduleSpec>,
    pub output: DemoOutputConfig,
}

pub fn load_config(path: &Path) -> Result<DemoConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    parse_config(&contents).map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<DemoConfig, serde_json::Error> {
    serde_json::from_str(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::{BlurPrecision, Rectification};

    #[test]
    fn parses_blur_config_with_defaults() {
        let cfg = parse_config(
            r#"{ "pipeline": { "kind": "blur", "input": "in.png",
                              "params": { "precision": "f32" } },
                 "output": { "image": "out.png" } }"#,
        )
        .unwrap();
        match cfg.pipeline {
            PipelineConfig::Blur {
                color, params, ..
            } => {
                assert_eq!(color, ColorMode::Rgb);
                assert_eq!(params.precision, BlurPrecision::F32);
                assert_eq!(params.kernel.taps().len(), 5);
            }
            other => panic!("unexpected pipeline {other:?}"),
        }
        assert!(cfg.schedule.is_none());
        assert!(cfg.output.report_json.is_none());
    }

    #[test]
    fn parses_stereo_config_with_schedule() {
        let cfg = parse_config(
            r#"{ "pipeline": { "kind": "stereo", "left": "l.png", "right": "r.png",
                              "params": { "search_range": 16, "rectification": "fixed" } },
                 "schedule": { "stages": { "sad": { "compute": "root" } } },
                 "output": { "image": "d.png", "report_json": "d.json" } }"#,
        )
        .unwrap();
        let PipelineConfig::Stereo {
            left_remap, params, ..
        } = &cfg.pipeline
        else {
            panic!("expected stereo");
        };
        assert!(left_remap.is_none());
        assert_eq!(params.search_range, 16);
        assert_eq!(params.window_radius, 4);
        assert_eq!(params.rectification, Rectification::Fixed);
        assert!(cfg.schedule.unwrap().get("sad").is_some());
    }

    #[test]
    fn unknown_pipeline_kind_fails() {
        let err = parse_config(
            r#"{ "pipeline": { "kind": "sharpen", "input": "a.png" },
                 "output": { "image": "b.png" } }"#,
        );
        assert!(err.is_err());
    }
}
