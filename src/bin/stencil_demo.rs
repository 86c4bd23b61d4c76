use stencil_pipes::config::demo::{load_config, DemoConfig, PipelineConfig};
use stencil_pipes::diagnostics::{ImageDescriptor, RunReport};
use stencil_pipes::exec::Realization;
use stencil_pipes::image::io::{load_image, save_image, write_json_file, ColorMode};
use stencil_pipes::image::{ImageBufU8, ImageView};
use stencil_pipes::pipelines::stereo::identity_remap;
use stencil_pipes::pipelines::{
    GaussianBlur, HarrisCorner, SeparableBlur, StereoInputs, StereoMatch,
};
use stencil_pipes::schedule::ScheduleSpec;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn usage() -> String {
    "Usage: stencil_demo <config.json>".to_string()
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_config(Path::new(&config_path))?;

    let t0 = Instant::now();
    let (realization, schedule, inputs) = execute(&config).map_err(|e| e.to_string())?;
    let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;

    let image = realization.to_image();
    save_image(&image, &config.output.image)?;

    println!("Pipeline: {}", config.pipeline.name());
    println!(
        "  output: {}x{} -> {}",
        realization.output.width(),
        realization.output.height(),
        config.output.image.display()
    );
    println!("  points evaluated: {}", realization.stats.total_evaluated());
    println!("  tiles: {}", realization.stats.tiles);
    println!("  elapsed_ms: {elapsed_ms:.3}");

    if let Some(path) = &config.output.report_json {
        let report = RunReport::new(config.pipeline.name(), inputs, &schedule, &realization);
        write_json_file(path, &report)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

type Executed = (Realization, ScheduleSpec, Vec<ImageDescriptor>);

fn execute(config: &DemoConfig) -> Result<Executed, Box<dyn std::error::Error>> {
    match &config.pipeline {
        PipelineConfig::Blur {
            input,
            color,
            params,
        } => {
            let img = load_image(input, *color)?;
            let blur = SeparableBlur::new(params.clone())?;
            let schedule = pick(&config.schedule, || blur.default_schedule());
            let realization = blur.run_with(&img.as_view(), &schedule)?;
            Ok((realization, schedule, vec![ImageDescriptor::of(&img)]))
        }
        PipelineConfig::Gaussian { input, params } => {
            let img = load_image(input, ColorMode::Gray)?;
            let gaussian = GaussianBlur::new(params.clone())?;
            let schedule = pick(&config.schedule, || gaussian.default_schedule());
            let realization = gaussian.run_with(&img.as_view(), &schedule)?;
            Ok((realization, schedule, vec![ImageDescriptor::of(&img)]))
        }
        PipelineConfig::Harris { input, params } => {
            let img = load_image(input, ColorMode::Gray)?;
            let harris = HarrisCorner::new(params.clone())?;
            let schedule = pick(&config.schedule, || harris.default_schedule());
            let realization = harris.run_with(&img.as_view(), &schedule)?;
            Ok((realization, schedule, vec![ImageDescriptor::of(&img)]))
        }
        PipelineConfig::Stereo {
            left,
            right,
            left_remap,
            right_remap,
            params,
        } => {
            let left = load_image(left, ColorMode::Rgb)?;
            let right = load_image(right, ColorMode::Rgb)?;
            let left_remap = load_remap(left_remap.as_ref(), &left)?;
            let right_remap = load_remap(right_remap.as_ref(), &right)?;
            let stereo = StereoMatch::new(params.clone())?;
            let schedule = pick(&config.schedule, || stereo.default_schedule());
            let inputs = StereoInputs {
                right: right.as_view(),
                left: left.as_view(),
                right_remap: right_remap.as_view(),
                left_remap: left_remap.as_view(),
            };
            let realization = stereo.run_with(&inputs, &schedule)?;
            let descriptors = [&right, &left, &right_remap, &left_remap]
                .into_iter()
                .map(ImageDescriptor::of)
                .collect();
            Ok((realization, schedule, descriptors))
        }
    }
}

fn pick(
    configured: &Option<ScheduleSpec>,
    default: impl FnOnce() -> ScheduleSpec,
) -> ScheduleSpec {
    configured.clone().unwrap_or_else(default)
}

fn load_remap(path: Option<&PathBuf>, image: &ImageBufU8) -> Result<ImageBufU8, String> {
    match path {
        Some(path) => load_image(path, ColorMode::Rgb),
        None => Ok(identity_remap(image.width(), image.height())),
    }
}
