//! Tone-mapping session.
//!
//! A [`ToneMapper`] owns everything that stays fixed over a stream: the
//! validated configuration, the display model, the scene sensitivity
//! tables for the viewing setup and the temporal filter state. Frames are
//! processed strictly in order.
//!
//! # Usage
//!
//! ```rust
//! use datmo_core::{NoProgress, Plane, RgbFrame};
//! use datmo_ops::{TonemapConfig, ToneMapper};
//!
//! let lum = Plane::from_fn(32, 32, |x, _| 1.0 + x as f32 * 30.0).unwrap();
//! let frame = RgbFrame::new(lum.clone(), lum.clone(), lum).unwrap();
//!
//! let mut mapper = ToneMapper::new(TonemapConfig::default()).unwrap();
//! let (out, curve) = mapper.tonemap_frame(&frame, &mut NoProgress).unwrap();
//! assert_eq!(out.width(), 32);
//! assert!(curve.is_monotonic());
//! ```
//!
//! # Progress
//!
//! The sink sees 0 when density estimation starts, one report per
//! frequency band up to 50, 90 once the curve is computed and 100 when the
//! frame is done. Only answers during density estimation can abort.

use crate::apply::{apply_tone_curve, DisplayFrame};
use crate::config::TonemapConfig;
use crate::curve::ToneCurve;
use crate::density::{self, band_frequencies};
use crate::dump::CurveDump;
use crate::optimizer::{OptimizerReport, SceneSensitivity, ToneCurveOptimizer};
use crate::temporal::TemporalFilter;
use crate::visual::VisualModel;
use crate::TmoResult;
use datmo_core::{LogLuminanceScale, Plane, ProgressSink, RgbFrame};
use datmo_display::{DisplayFunction, DisplayModel};
use std::io::Write;
#[allow(unused_imports)]
use tracing::{debug, info, trace};

/// Session state for a stream of frames.
#[derive(Debug)]
pub struct ToneMapper {
    config: TonemapConfig,
    display: DisplayModel,
    pixels_per_degree: f32,
    optimizer: ToneCurveOptimizer,
    scene: SceneSensitivity,
    temporal: TemporalFilter,
    last_report: Option<OptimizerReport>,
    frames: usize,
}

impl ToneMapper {
    /// Validates `config` and prepares the per-session tables.
    pub fn new(config: TonemapConfig) -> TmoResult<Self> {
        config.validate()?;
        let display = DisplayModel::from_config(&config.display)?;
        let pixels_per_degree = config.viewing.pixels_per_degree()?;
        let model = VisualModel::new(config.visual_model);
        let scale = LogLuminanceScale::standard();
        let frequencies = band_frequencies(pixels_per_degree);
        let scene = SceneSensitivity::build(&model, &scale, &frequencies, config.scene_adaptation);
        let optimizer = ToneCurveOptimizer::new(model)
            .with_contrast_enhancement(config.contrast_enhancement)
            .with_reference_white(config.white_anchor())
            .with_max_iterations(config.max_iterations);
        let dynamic_range = display.dynamic_range();
        let temporal = TemporalFilter::new(config.frame_rate, dynamic_range);

        info!(
            display = ?config.display,
            dynamic_range,
            pixels_per_degree,
            bands = frequencies.len(),
            "tone mapper ready"
        );

        Ok(Self {
            config,
            display,
            pixels_per_degree,
            optimizer,
            scene,
            temporal,
            last_report: None,
            frames: 0,
        })
    }

    /// Session configuration.
    pub fn config(&self) -> &TonemapConfig {
        &self.config
    }

    /// Target display.
    pub fn display(&self) -> &DisplayModel {
        &self.display
    }

    /// Angular resolution of the viewing setup.
    pub fn pixels_per_degree(&self) -> f32 {
        self.pixels_per_degree
    }

    /// Report of the most recent optimisation.
    pub fn last_report(&self) -> Option<&OptimizerReport> {
        self.last_report.as_ref()
    }

    /// Frames processed so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Restarts the temporal filter, e.g. at a scene cut.
    pub fn reset(&mut self) {
        self.temporal.reset();
    }

    /// Computes the unfiltered tone curve for one luminance field.
    pub fn optimize_curve(
        &mut self,
        luminance: &Plane,
        progress: &mut dyn ProgressSink,
    ) -> TmoResult<ToneCurve> {
        let density = density::estimate(luminance, self.pixels_per_degree, progress)?;
        let (curve, report) = self.optimizer.optimize(&density, &self.scene, &self.display)?;
        debug!(
            iterations = report.iterations,
            converged = report.converged(),
            used_nodes = report.used_nodes,
            "frame curve"
        );
        self.last_report = Some(report);
        progress.report(90);
        Ok(curve)
    }

    /// Computes the temporally filtered tone curve for the next frame.
    pub fn compute_curve(
        &mut self,
        luminance: &Plane,
        progress: &mut dyn ProgressSink,
    ) -> TmoResult<ToneCurve> {
        let raw = self.optimize_curve(luminance, progress)?;
        let filtered = self.temporal.filter(&raw);
        self.frames += 1;
        Ok(filtered)
    }

    /// Tone maps the next frame, using its Rec.709 luminance.
    pub fn tonemap_frame(
        &mut self,
        frame: &RgbFrame,
        progress: &mut dyn ProgressSink,
    ) -> TmoResult<(DisplayFrame, ToneCurve)> {
        let luminance = frame.luminance();
        self.tonemap_with_luminance(frame, &luminance, progress)
    }

    /// Tone maps the next frame with a separately supplied luminance channel.
    pub fn tonemap_with_luminance(
        &mut self,
        frame: &RgbFrame,
        luminance: &Plane,
        progress: &mut dyn ProgressSink,
    ) -> TmoResult<(DisplayFrame, ToneCurve)> {
        let curve = self.compute_curve(luminance, progress)?;
        let out = apply_tone_curve(&curve, luminance, frame, &self.display, self.config.saturation)?;
        progress.report(100);
        trace!(frame = self.frames, "frame done");
        Ok((out, curve))
    }

    /// Like [`tonemap_frame`](Self::tonemap_frame), also appending the
    /// curve to `dump`.
    pub fn tonemap_frame_dumped<W: Write>(
        &mut self,
        frame: &RgbFrame,
        progress: &mut dyn ProgressSink,
        dump: &mut CurveDump<W>,
    ) -> TmoResult<(DisplayFrame, ToneCurve)> {
        let index = self.frames;
        let result = self.tonemap_frame(frame, progress)?;
        dump.write(index, &result.1)?;
        Ok(result)
    }
}
