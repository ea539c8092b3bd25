//! CLI command implementations

pub mod curve;
pub mod displays;
pub mod tonemap;

use crate::TuningArgs;
use anyhow::{Context, Result};
use datmo_core::RgbFrame;
use datmo_display::{DisplayConfig, ViewingGeometry};
use datmo_ops::{DisplayFrame, FrameRate, TonemapConfig};
use std::fs;
use std::path::Path;
#[allow(unused_imports)]
use tracing::{debug, info, trace};

/// Loads an HDR image as linear RGB in cd/m².
///
/// Any format the `image` crate decodes works; Radiance HDR and OpenEXR
/// keep their full range.
pub fn load_frame(path: &Path, exposure: f32) -> Result<RgbFrame> {
    let image = image::open(path)
        .with_context(|| format!("Failed to load: {}", path.display()))?
        .into_rgb32f();
    let (width, height) = image.dimensions();
    let mut data = image.into_raw();
    if exposure != 1.0 {
        data.iter_mut().for_each(|v| *v *= exposure);
    }
    debug!(path = %path.display(), width, height, "loaded frame");
    RgbFrame::from_interleaved(width, height, &data)
        .with_context(|| format!("Invalid image: {}", path.display()))
}

/// Writes display code values as an 8- or 16-bit PNG.
pub fn save_png(path: &Path, frame: &DisplayFrame, bit16: bool) -> Result<()> {
    let (w, h) = (frame.width(), frame.height());
    let result = if bit16 {
        image::ImageBuffer::<image::Rgb<u16>, _>::from_raw(w, h, frame.to_rgb16())
            .context("Output buffer size mismatch")?
            .save(path)
    } else {
        image::RgbImage::from_raw(w, h, frame.to_rgb8())
            .context("Output buffer size mismatch")?
            .save(path)
    };
    result.with_context(|| format!("Failed to save: {}", path.display()))
}

/// Builds the session configuration: YAML file first, then flags.
pub fn build_config(args: &TuningArgs) -> Result<TonemapConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        }
        None => TonemapConfig::default(),
    };

    if let Some(name) = &args.display {
        config.display = DisplayConfig::preset(name).with_context(|| {
            format!(
                "Unknown display '{}' (expected one of: {})",
                name,
                DisplayConfig::PRESETS.join(", ")
            )
        })?;
    }
    if let Some(path) = &args.display_lut {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read display LUT: {}", path.display()))?;
        config.display = DisplayConfig::parse_lut(&text)
            .with_context(|| format!("Invalid display LUT: {}", path.display()))?;
    }
    if let Some(e) = args.contrast {
        config.contrast_enhancement = e;
    }
    if let Some(s) = args.saturation {
        config.saturation = s;
    }
    if let Some(w) = args.white {
        config.reference_white = Some(w);
    }
    if let Some(a) = &args.adaptation {
        config.scene_adaptation = a.parse()?;
    }
    if let Some(ppd) = args.ppd {
        config.viewing = ViewingGeometry::PixelsPerDegree(ppd);
    }
    if let Some(fps) = args.fps {
        config.frame_rate = FrameRate::try_from(fps)?;
    }

    config.validate().context("Invalid tone mapping settings")?;
    trace!(?config, "session configuration");
    Ok(config)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use datmo_core::LogLuminanceScale;
    use datmo_display::{DisplayFunction, DisplayModel};
    use datmo_ops::{apply_tone_curve, SceneAdaptation, ToneCurve};

    pub(crate) fn tuning() -> TuningArgs {
        TuningArgs {
            config: None,
            display: None,
            display_lut: None,
            contrast: None,
            saturation: None,
            white: None,
            adaptation: None,
            ppd: None,
            fps: None,
            exposure: 1.0,
        }
    }

    /// Writes a small gradient PNG to `path`.
    pub(crate) fn write_input(path: &Path) {
        let img = image::RgbImage::from_fn(24, 16, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 15) as u8, ((x + y) * 5) as u8])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_flags_override_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("session.yaml");
        fs::write(&yaml, "contrast_enhancement: 0.5\nframe_rate: 60\ndisplay:\n  type: crt\n").unwrap();

        let mut args = tuning();
        args.config = Some(yaml);
        args.contrast = Some(1.5);
        args.adaptation = Some("200".into());
        let config = build_config(&args).unwrap();
        assert_eq!(config.contrast_enhancement, 1.5);
        assert_eq!(config.frame_rate, FrameRate::Fps60);
        assert_eq!(config.display, DisplayConfig::Crt);
        assert_eq!(config.scene_adaptation, SceneAdaptation::Fixed(200.0));
    }

    #[test]
    fn test_bad_settings() {
        let mut args = tuning();
        args.display = Some("oled".into());
        assert!(build_config(&args).is_err());

        let mut args = tuning();
        args.fps = Some(24);
        assert!(build_config(&args).is_err());

        let mut args = tuning();
        args.saturation = Some(-2.0);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_display_lut_file() {
        let dir = tempfile::tempdir().unwrap();
        let lut = dir.path().join("panel.txt");
        fs::write(&lut, "# code luminance\n0 0.4\n0.5 25\n1 250\n").unwrap();
        let mut args = tuning();
        args.display_lut = Some(lut);
        let config = build_config(&args).unwrap();
        assert!(matches!(config.display, DisplayConfig::Lut { .. }));
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        write_input(&input);
        let frame = load_frame(&input, 100.0).unwrap();
        assert_eq!((frame.width(), frame.height()), (24, 16));
        assert!(frame.r.data().iter().all(|v| (0.0..=100.0).contains(v)));

        let display = DisplayModel::from_config(&DisplayConfig::Lcd).unwrap();
        let curve = ToneCurve::linear(&LogLuminanceScale::standard(), display.dynamic_range());
        let out = apply_tone_curve(&curve, &frame.luminance(), &frame, &display, 1.0).unwrap();
        let path = dir.path().join("out.png");
        save_png(&path, &out, true).unwrap();
        let back = image::open(&path).unwrap().into_rgb16();
        assert_eq!(back.dimensions(), (24, 16));
        assert_eq!(&back.as_raw()[..], &out.to_rgb16()[..]);
    }
}
