//! Tone curve inspection command

use crate::CurveArgs;
use anyhow::{Context, Result};
use datmo_core::NoProgress;
use datmo_display::DisplayFunction;
use datmo_ops::{CurveDump, ToneCurve, ToneMapper};
use std::io::{self, Write};
#[allow(unused_imports)]
use tracing::{debug, info, trace};

pub fn run(args: CurveArgs) -> Result<()> {
    let config = super::build_config(&args.tuning)?;
    let mut mapper = ToneMapper::new(config)?;
    let frame = super::load_frame(&args.input, args.tuning.exposure)?;
    let luminance = frame.luminance();
    let curve = mapper
        .optimize_curve(&luminance, &mut NoProgress)
        .with_context(|| format!("Failed to compute curve: {}", args.input.display()))?;

    if let Some(path) = &args.output {
        let mut dump = CurveDump::create(path)
            .with_context(|| format!("Failed to create: {}", path.display()))?;
        dump.write(0, &curve)?;
        dump.flush()?;
        info!(path = %path.display(), "curve written");
        return Ok(());
    }

    let positive = luminance.data().iter().copied().filter(|l| *l > 0.0);
    let (lo, hi) = positive.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), l| {
        (lo.min(l.log10()), hi.max(l.log10()))
    });
    let stdout = io::stdout();
    print_table(&mut stdout.lock(), &curve, &mapper, lo, hi)?;

    if let Some(report) = mapper.last_report() {
        println!(
            "# {} iterations, {}, {} of {} nodes used",
            report.iterations,
            if report.converged() { "converged" } else { "not converged" },
            report.used_nodes,
            curve.len()
        );
    }
    Ok(())
}

/// Writes one row per node in the image's luminance range, plus one node
/// of margin on each side.
fn print_table(
    out: &mut impl Write,
    curve: &ToneCurve,
    mapper: &ToneMapper,
    lo: f32,
    hi: f32,
) -> Result<()> {
    let display = mapper.display();
    let black = display.min_luminance();
    let step = curve.x()[1] - curve.x()[0];
    writeln!(out, "{:>8} {:>10} {:>10} {:>7}", "log10 L", "display", "cd/m2", "code")?;
    for (&x, &y) in curve.x().iter().zip(curve.y()) {
        if x < lo - step || x > hi + step {
            continue;
        }
        let lum = black * 10f32.powf(y);
        writeln!(
            out,
            "{:>8.2} {:>10.4} {:>10.3} {:>7.4}",
            x,
            y,
            lum,
            display.inverse_display(lum)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datmo_core::LogLuminanceScale;
    use datmo_ops::TonemapConfig;

    #[test]
    fn test_table_rows_cover_range() {
        let mapper = ToneMapper::new(TonemapConfig::default()).unwrap();
        let range = mapper.display().dynamic_range();
        let curve = ToneCurve::linear(&LogLuminanceScale::standard(), range);
        let mut buf = Vec::new();
        print_table(&mut buf, &curve, &mapper, 0.05, 0.95).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].contains("code"));
        // Nodes 0.1..=0.9 plus one node of margin each side
        assert_eq!(lines.len(), 1 + 11);
        assert!(lines.iter().skip(1).all(|l| l.split_whitespace().count() == 4));
    }
}
