//! rwsnake-bench: CLI tool for seed propagation experiments and diagnostics.
//!
//! Rasterizes a contour over an image, propagates foreground and
//! background seeds with configurable parameters and prints per-stage
//! diagnostics. Useful for:
//!
//! - Tuning `shrinkPower` / `expandPower` before handing seeds to a solver
//! - Checking how host-style configuration strings marshal
//! - Measuring per-stage durations
//! - Previewing seeds as a tinted PNG
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin rwsnake-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use image::DynamicImage;
use rwsnake_pipeline::diagnostics::{
    Clock, RefineDiagnostics, refine_with_diagnostics, seeds_with_diagnostics,
};
use rwsnake_pipeline::{
    Contour, ContourId, Point, RawConfig, SeedBundle, SeedRole, SegmentationParameters,
    SegmenterError,
};

/// Seed propagation experimentation and diagnostics for rwsnake.
///
/// Runs rasterization and seed propagation on a given image with
/// configurable parameters and prints per-stage timing and pixel counts.
#[derive(Parser)]
#[command(name = "rwsnake-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, TIFF, WebP).
    image_path: PathBuf,

    /// Contour as JSON: `{"id": 1, "points": [{"x": 0.0, "y": 0.0}, ...]}`.
    ///
    /// Defaults to a rectangle inset by a quarter of each image side.
    #[arg(long)]
    contour: Option<String>,

    /// Flat configuration as a JSON object, e.g. `{"shrinkPower": 4}`.
    #[arg(long)]
    config_json: Option<String>,

    /// Configuration entry as `key=value`; repeatable, applied after
    /// `--config-json`.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Continue past seed propagation with an engine that returns the
    /// foreground seed unchanged.
    #[arg(long)]
    echo_engine: bool,

    /// Write the seed composite (foreground red, background green) to a PNG.
    #[arg(long)]
    seeds_png: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Log level filter (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Split a `key=value` argument.
fn parse_param(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{arg}`"))?;
    if key.is_empty() {
        return Err(format!("missing key in `{arg}`"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

/// Build a [`RawConfig`] from `--config-json` and `--param` entries.
fn raw_config_from_cli(cli: &Cli) -> Result<RawConfig, String> {
    let mut raw = match cli.config_json {
        Some(ref json) => serde_json::from_str::<RawConfig>(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"))?,
        None => RawConfig::new(),
    };
    for (key, value) in &cli.params {
        raw.insert(key.as_str(), value.as_str());
    }
    Ok(raw)
}

/// Parse `--contour`, or inset a rectangle into the image.
fn contour_from_cli(cli: &Cli, image: &DynamicImage) -> Result<Contour, String> {
    if let Some(ref json) = cli.contour {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --contour: {e}"));
    }
    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    let (x0, y0, x1, y1) = (w * 0.25, h * 0.25, w * 0.75, h * 0.75);
    Contour::new(
        ContourId(0),
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ],
    )
    .map_err(|e| format!("Image too small for a default contour: {e}"))
}

/// Engine that hands back the foreground seed as its label mask.
fn echo_foreground(
    _: &image::GrayImage,
    seeds: &SeedBundle,
    _: &SegmentationParameters,
) -> Result<image::GrayImage, SegmenterError> {
    Ok(seeds.get(SeedRole::Foreground).clone())
}

/// One pipeline run: diagnostics plus the seeds for the preview.
fn run_once(
    cli: &Cli,
    contour: &Contour,
    image: &DynamicImage,
    params: &SegmentationParameters,
) -> Result<(RefineDiagnostics, SeedBundle), rwsnake_pipeline::PipelineError> {
    if cli.echo_engine {
        let (result, diagnostics) =
            refine_with_diagnostics(contour, image, params, &echo_foreground, &StdClock)?;
        Ok((diagnostics, result.seeds))
    } else {
        let (propagated, diagnostics) = seeds_with_diagnostics(contour, image, params, &StdClock)?;
        Ok((diagnostics, propagated.seeds().clone()))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logger = match flexi_logger::Logger::try_with_str(&cli.log_level).and_then(|l| l.start())
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error starting logger: {e}");
            return ExitCode::FAILURE;
        }
    };

    let raw = match raw_config_from_cli(&cli) {
        Ok(r) => r,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let params = match rwsnake_pipeline::marshal(&raw) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let image = match image::open(&cli.image_path) {
        Ok(img) => img,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let contour = match contour_from_cli(&cli, &image) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({}x{})",
        cli.image_path.display(),
        image.width(),
        image.height(),
    );
    eprintln!("Contour: {} ({} points)", contour.id(), contour.len());
    eprintln!("Params: {params:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match run_once(&cli, &contour, &image, &params) {
            Ok((diagnostics, seeds)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write the preview on the first run only.
                if run == 0
                    && let Some(ref png_path) = cli.seeds_png
                {
                    let composite = seeds.composite(&image.to_luma8());
                    match composite.save(png_path) {
                        Ok(()) => eprintln!("Seed composite written to {}", png_path.display()),
                        Err(e) => {
                            eprintln!("Error writing PNG to {}: {e}", png_path.display());
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&RefineDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[RefineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Source", |d| Some(d.source.duration)),
        ("Rasterize", |d| Some(d.rasterize.duration)),
        ("Propagate", |d| Some(d.propagate.duration)),
        ("Segment", |d| d.segment.as_ref().map(|s| s.duration)),
        ("Clean", |d| d.clean.as_ref().map(|s| s.duration)),
        ("Extract", |d| d.extract.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn param_splits_on_first_equals() {
        assert_eq!(
            parse_param("maskLimits=seeds").unwrap(),
            ("maskLimits".to_owned(), "seeds".to_owned())
        );
        assert_eq!(parse_param("a=b=c").unwrap(), ("a".to_owned(), "b=c".to_owned()));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=1").is_err());
    }

    #[test]
    fn params_override_config_json() {
        let cli = Cli::parse_from([
            "rwsnake-bench",
            "in.png",
            "--config-json",
            r#"{"shrinkPower": 4, "clean": false}"#,
            "--param",
            "SHRINKPOWER=6",
        ]);
        let params = rwsnake_pipeline::marshal(&raw_config_from_cli(&cli).unwrap()).unwrap();
        assert_eq!(params.shrink_distance, 6);
        assert!(!params.clean);
    }

    #[test]
    fn default_contour_is_inset_rectangle() {
        let cli = Cli::parse_from(["rwsnake-bench", "in.png"]);
        let image = DynamicImage::new_luma8(40, 20);
        let contour = contour_from_cli(&cli, &image).unwrap();
        assert_eq!(contour.points()[0], Point::new(10.0, 5.0));
        assert_eq!(contour.points()[2], Point::new(30.0, 15.0));
    }

    #[test]
    fn contour_json_is_validated() {
        let cli = Cli::parse_from([
            "rwsnake-bench",
            "in.png",
            "--contour",
            r#"{"id": 3, "points": [{"x": 0, "y": 0}, {"x": 1, "y": 1}]}"#,
        ]);
        let image = DynamicImage::new_luma8(40, 20);
        assert!(contour_from_cli(&cli, &image).is_err());
    }
}
