//! datmo - Display-adaptive tone mapping CLI
//!
//! Tone maps Radiance HDR and OpenEXR images for a chosen display.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "datmo")]
#[command(author, version, about = "Display-adaptive tone mapping")]
#[command(long_about = "
Tone maps HDR images so that the visible contrasts of the scene are
preserved as well as the target display allows.

Examples:
  datmo tonemap memorial.hdr -o memorial.png             # Default LCD
  datmo tonemap in.exr -o out.png -d lcd_bright -e 1.3   # Boost contrast
  datmo tonemap frames/*.exr -o out/ --fps 30 --dump-curves curves.csv
  datmo tonemap in.hdr -o out.png --display-lut measured.txt
  datmo curve in.hdr -d crt                              # Print the tone curve
  datmo displays                                         # List display presets
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Tone map an image or a frame sequence
    #[command(visible_alias = "t")]
    Tonemap(TonemapArgs),

    /// Compute and print the tone curve of an image
    #[command(visible_alias = "c")]
    Curve(CurveArgs),

    /// List display presets
    Displays,
}

/// Settings shared by every command that runs the tone mapper.
#[derive(Args, Clone)]
struct TuningArgs {
    /// YAML configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display preset: lcd_office, lcd, lcd_bright, crt, plasma
    #[arg(short, long)]
    display: Option<String>,

    /// Measured display response (two columns: code value, luminance)
    #[arg(long, conflicts_with = "display")]
    display_lut: Option<PathBuf>,

    /// Contrast enhancement factor
    #[arg(short = 'e', long)]
    contrast: Option<f32>,

    /// Colour saturation factor
    #[arg(short, long)]
    saturation: Option<f32>,

    /// Scene luminance (cd/m²) mapped to the display peak
    #[arg(short, long)]
    white: Option<f32>,

    /// Scene adaptation: 'auto' or a luminance in cd/m²
    #[arg(long)]
    adaptation: Option<String>,

    /// Pixels per visual degree
    #[arg(long)]
    ppd: Option<f32>,

    /// Frame rate of a sequence: 25, 30 or 60
    #[arg(long)]
    fps: Option<u32>,

    /// Scale factor applied to input pixel values to get cd/m²
    #[arg(long, default_value = "1.0")]
    exposure: f32,
}

#[derive(Args)]
struct TonemapArgs {
    /// Input HDR image(s), processed in order as one sequence
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output PNG, or a directory when several inputs are given
    #[arg(short, long)]
    output: PathBuf,

    /// Write 16-bit PNGs
    #[arg(long)]
    bit16: bool,

    /// Append every frame's tone curve to this CSV file
    #[arg(long)]
    dump_curves: Option<PathBuf>,

    /// Treat every input as a new scene (no temporal filtering)
    #[arg(long)]
    independent: bool,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args)]
struct CurveArgs {
    /// Input HDR image
    input: PathBuf,

    /// Write the curve as CSV instead of printing it
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Tonemap(args) => commands::tonemap::run(args, cli.quiet),
        Commands::Curve(args) => commands::curve::run(args),
        Commands::Displays => commands::displays::run(),
    }
}
