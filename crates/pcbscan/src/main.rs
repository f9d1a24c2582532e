//! pcbscan: inspect a PCB photograph against a golden reference.
//!
//! Runs the full inspection on a test/reference image pair, writes the
//! report artifacts to an output directory and prints per-stage
//! diagnostics.
//!
//! Artifacts:
//!
//! - `{category}_result.png` for each of the six categories
//! - `all_defects_result.png`, `highlighted_diff.png`
//! - `report.txt`, `report.json`, `overlay.svg`
//! - `circuit.txt` (netlist)
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin pcbscan -- [OPTIONS] <TEST> <REFERENCE>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use ab_glyph::FontArc;
use clap::{Parser, ValueEnum};
use pcbscan_export::SvgMetadata;
use pcbscan_pipeline::diagnostics::Clock;
use pcbscan_pipeline::{
    Analysis, ChannelOrder, Classifier, DefectCategory, DefectReport, FixedClassifier,
    InspectionConfig, Inspector, LabelStyle, Netlist, ResampleFilter,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Inspect a PCB photograph against a known-good reference.
///
/// Scores similarity, locates changed regions, classifies each one and
/// writes annotated images, a text/JSON report, an SVG overlay and a
/// netlist to the output directory.
#[derive(Parser)]
#[command(name = "pcbscan", version)]
struct Cli {
    /// Path to the test image (PNG, JPEG, BMP, WebP).
    test: PathBuf,

    /// Path to the golden reference image.
    reference: PathBuf,

    /// Directory receiving the report artifacts.
    #[arg(long, default_value = "pcbscan-out")]
    out_dir: PathBuf,

    /// ONNX classifier model (requires the `onnx` build feature).
    ///
    /// Takes a `[1, 224, 224, 3]` tensor of raw intensities and returns
    /// one score per category.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Channel order the model was trained on.
    #[arg(long, value_enum, default_value_t = Channels::Bgr)]
    channel_order: Channels,

    /// Category reported for every region when no `--model` is given.
    #[arg(long, default_value_t = DefectCategory::Open)]
    assume_category: DefectCategory,

    /// Grayscale difference above which a pixel is highlighted.
    #[arg(long, default_value_t = InspectionConfig::DEFAULT_DIFF_THRESHOLD)]
    diff_threshold: u8,

    /// Padding added around each candidate region, in pixels.
    #[arg(long, default_value_t = InspectionConfig::DEFAULT_REGION_PADDING, value_parser = clap::value_parser!(i32).range(0..))]
    region_padding: i32,

    /// Morphology radius for mask cleanup (1 = 3x3 square, 0 = off).
    #[arg(long, default_value_t = InspectionConfig::DEFAULT_MORPHOLOGY_RADIUS)]
    morphology_radius: u8,

    /// Grayscale level at or below which a pixel counts as a netlist shape.
    #[arg(long, default_value_t = InspectionConfig::DEFAULT_NETLIST_THRESHOLD)]
    netlist_threshold: u8,

    /// Resampling filter (nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    resample_filter: Filter,

    /// Full inspection config as a JSON string.
    ///
    /// When provided, all other inspection parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// TrueType/OpenType font for raster labels, replacing the bundled
    /// DejaVu Sans.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Model input channel order.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Channels {
    /// Red, green, blue.
    Rgb,
    /// Blue, green, red (models trained on OpenCV-decoded images).
    Bgr,
}

impl From<Channels> for ChannelOrder {
    fn from(c: Channels) -> Self {
        match c {
            Channels::Rgb => Self::Rgb,
            Channels::Bgr => Self::Bgr,
        }
    }
}

/// Maps a [`ResampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: ResampleFilter) -> Filter {
    match f {
        ResampleFilter::Nearest => Filter::Nearest,
        ResampleFilter::Triangle => Filter::Triangle,
        ResampleFilter::CatmullRom => Filter::CatmullRom,
        ResampleFilter::Gaussian => Filter::Gaussian,
        ResampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from
/// [`InspectionConfig::DEFAULT_RESAMPLE_FILTER`] so the two cannot
/// silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(InspectionConfig::DEFAULT_RESAMPLE_FILTER);

/// Failures that end the run.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error parsing --config-json: {0}")]
    ConfigJson(serde_json::Error),

    #[error("error serializing JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error reading font {}: {source}", path.display())]
    FontRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not a usable font", path.display())]
    FontParse { path: PathBuf },

    #[cfg(feature = "onnx")]
    #[error(transparent)]
    Model(#[from] pcbscan_pipeline::ClassifierError),

    #[cfg(not(feature = "onnx"))]
    #[error("cannot load {}: pcbscan was built without the `onnx` feature", path.display())]
    ModelUnsupported { path: PathBuf },

    #[error(transparent)]
    Pipeline(#[from] pcbscan_pipeline::PipelineError),

    #[error(transparent)]
    Export(#[from] pcbscan_export::ExportError),

    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Build an [`InspectionConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<InspectionConfig, CliError> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(CliError::ConfigJson);
    }

    Ok(InspectionConfig {
        diff_threshold: cli.diff_threshold,
        region_padding: cli.region_padding,
        morphology_radius: cli.morphology_radius,
        netlist_threshold: cli.netlist_threshold,
        resample_filter: match cli.resample_filter {
            Filter::Nearest => ResampleFilter::Nearest,
            Filter::Triangle => ResampleFilter::Triangle,
            Filter::CatmullRom => ResampleFilter::CatmullRom,
            Filter::Gaussian => ResampleFilter::Gaussian,
            Filter::Lanczos3 => ResampleFilter::Lanczos3,
        },
        ..InspectionConfig::default()
    })
}

/// Label style from the optional `--font`.
fn label_style(font: Option<&Path>) -> Result<LabelStyle, CliError> {
    let Some(path) = font else {
        return Ok(LabelStyle::default());
    };
    let bytes = std::fs::read(path).map_err(|source| CliError::FontRead {
        path: path.to_path_buf(),
        source,
    })?;
    let font = FontArc::try_from_vec(bytes).map_err(|_| CliError::FontParse {
        path: path.to_path_buf(),
    })?;
    Ok(LabelStyle::with_font(font))
}

/// Classifier backend: the `--model` session, or a fixed
/// `--assume-category` classifier without one.
fn classifier(cli: &Cli) -> Result<Box<dyn Classifier>, CliError> {
    let Some(path) = cli.model.as_deref() else {
        return Ok(Box::new(FixedClassifier::for_category(cli.assume_category)));
    };
    #[cfg(feature = "onnx")]
    {
        let model = pcbscan_pipeline::OnnxClassifier::load(path, cli.channel_order.into())?;
        Ok(Box::new(model))
    }
    #[cfg(not(feature = "onnx"))]
    {
        Err(CliError::ModelUnsupported {
            path: path.to_path_buf(),
        })
    }
}

/// File name of a category's annotated image.
fn category_artifact(category: DefectCategory) -> String {
    format!("{category}_result.png")
}

/// Write `contents` to `out_dir/name`, returning the full path.
fn write_artifact(out_dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf, CliError> {
    let path = out_dir.join(name);
    std::fs::write(&path, contents).map_err(|source| CliError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Serialize and write every artifact of one inspection.
fn write_artifacts(
    out_dir: &Path,
    cli: &Cli,
    config: &InspectionConfig,
    analysis: &Analysis,
    report: &DefectReport,
    netlist: &Netlist,
) -> Result<Vec<PathBuf>, CliError> {
    std::fs::create_dir_all(out_dir).map_err(|source| CliError::Write {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for (&category, image) in &report.category_images {
        let png = pcbscan_export::to_png(image)?;
        written.push(write_artifact(out_dir, &category_artifact(category), &png)?);
    }

    let combined = pcbscan_export::to_png(&report.combined_image)?;
    written.push(write_artifact(out_dir, "all_defects_result.png", &combined)?);

    let diff = pcbscan_export::to_png(&analysis.diff_image)?;
    written.push(write_artifact(out_dir, "highlighted_diff.png", &diff)?);

    let summary = report.summary();
    let text = pcbscan_export::to_text_report(&summary);
    written.push(write_artifact(out_dir, "report.txt", text.as_bytes())?);

    let json = pcbscan_export::to_json(&summary)?;
    written.push(write_artifact(out_dir, "report.json", json.as_bytes())?);

    let title = cli
        .test
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("pcbscan");
    let desc = format!(
        "Similarity {:.2}% (grade {}), {} defects",
        report.similarity.percentage,
        report.similarity.grade,
        report.defects.len(),
    );
    let config_json = serde_json::to_string(config)?;
    let metadata = SvgMetadata {
        title: Some(title),
        description: Some(&desc),
        config_json: Some(&config_json),
        background_href: Some("all_defects_result.png"),
    };
    let dimensions = pcbscan_pipeline::Dimensions::of(&analysis.test_image);
    let svg = pcbscan_export::to_overlay_svg(&report.defects, dimensions, &metadata);
    written.push(write_artifact(out_dir, "overlay.svg", svg.as_bytes())?);

    let circuit = pcbscan_export::to_netlist_text(netlist);
    written.push(write_artifact(out_dir, "circuit.txt", circuit.as_bytes())?);

    Ok(written)
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = config_from_cli(cli)?;
    let style = label_style(cli.font.as_deref())?;
    let inspector = Inspector::new(classifier(cli)?, config)?;

    eprintln!("Test: {}", cli.test.display());
    eprintln!("Reference: {}", cli.reference.display());
    match &cli.model {
        Some(path) => eprintln!("Model: {} ({:?})", path.display(), cli.channel_order),
        None => eprintln!("Model: none, every region is {}", cli.assume_category),
    }
    eprintln!("Config: {:#?}", inspector.config());
    eprintln!();

    let started = Instant::now();
    let (analysis, diagnostics) =
        inspector.analyze_with_diagnostics(&cli.test, &cli.reference, &StdClock)?;
    let elapsed = started.elapsed();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        println!("{}", diagnostics.report());
    }

    if !analysis.skipped.is_empty() {
        warn!(
            skipped = analysis.skipped.len(),
            "some candidate regions could not be classified"
        );
    }

    let report = analysis.report(&style);
    let netlist = inspector.netlist(&analysis);
    let written = write_artifacts(
        &cli.out_dir,
        cli,
        inspector.config(),
        &analysis,
        &report,
        &netlist,
    )?;
    for path in &written {
        info!(path = %path.display(), "wrote artifact");
    }

    eprintln!();
    eprintln!(
        "Similarity: {:.2}% (grade {})",
        report.similarity.percentage, report.similarity.grade,
    );
    eprintln!("Defects: {}", report.defects.len());
    eprintln!("Inference time: {:.3}s", elapsed.as_secs_f64());
    eprintln!(
        "{} artifacts written to {}",
        written.len(),
        cli.out_dir.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
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
