//! Tone mapping command

use crate::TonemapArgs;
use anyhow::{Context, Result};
use datmo_ops::{CurveDump, ToneMapper};
use std::fs;
use std::path::{Path, PathBuf};
#[allow(unused_imports)]
use tracing::{debug, info, trace};

pub fn run(args: TonemapArgs, quiet: bool) -> Result<()> {
    let config = super::build_config(&args.tuning)?;
    let mut mapper = ToneMapper::new(config)?;
    let outputs = output_paths(&args.input, &args.output)?;

    let mut dump = args
        .dump_curves
        .as_ref()
        .map(|p| CurveDump::create(p).with_context(|| format!("Failed to create: {}", p.display())))
        .transpose()?;

    for (index, (input, output)) in args.input.iter().zip(&outputs).enumerate() {
        let frame = super::load_frame(input, args.tuning.exposure)?;
        if args.independent {
            mapper.reset();
        }

        let mut progress = |percent: u8| {
            trace!(frame = index, percent, "progress");
            true
        };
        let (out, _curve) = match dump.as_mut() {
            Some(dump) => mapper.tonemap_frame_dumped(&frame, &mut progress, dump),
            None => mapper.tonemap_frame(&frame, &mut progress),
        }
        .with_context(|| format!("Failed to tone map: {}", input.display()))?;

        super::save_png(output, &out, args.bit16)?;

        if let Some(report) = mapper.last_report() {
            debug!(
                iterations = report.iterations,
                converged = report.converged(),
                "optimizer"
            );
        }
        info!(input = %input.display(), output = %output.display(), "frame written");
        if !quiet {
            println!("{} -> {}", input.display(), output.display());
        }
    }

    if let Some(dump) = dump.as_mut() {
        dump.flush().context("Failed to write curve dump")?;
    }
    Ok(())
}

/// Output file per input: `output` itself for one input, otherwise
/// `<output>/<input stem>.png`.
fn output_paths(inputs: &[PathBuf], output: &Path) -> Result<Vec<PathBuf>> {
    if inputs.len() == 1 && !output.is_dir() {
        return Ok(vec![output.to_path_buf()]);
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create directory: {}", output.display()))?;
    inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .with_context(|| format!("Input has no file name: {}", input.display()))?;
            Ok(output.join(format!("{}.png", stem.to_string_lossy())))
        })
        .collect()
}
