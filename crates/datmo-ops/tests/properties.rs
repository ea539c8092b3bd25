//! Properties every computed tone curve must satisfy.

mod common;

use approx::assert_relative_eq;
use common::generators::{gen_blocks, gen_flat, gen_noise, gen_ramp, grey, Lcg};
use common::{assert_monotonic, display_with_range};
use datmo_core::{LogLuminanceScale, NoProgress, Plane};
use datmo_display::{DisplayConfig, DisplayFunction, DisplayModel};
use datmo_ops::density::{self, ConditionalDensity};
use datmo_ops::{
    apply_tone_curve, FrameRate, SceneAdaptation, SceneSensitivity, TemporalFilter, ToneCurve,
    ToneCurveOptimizer, TonemapConfig, ToneMapper, VisualModel, VisualModelFlags,
};

const PPD: f32 = 30.0;

fn optimize(
    lum: &Plane,
    flags: VisualModelFlags,
    enhancement: f32,
    display: &DisplayModel,
) -> (ToneCurve, datmo_ops::OptimizerReport) {
    let density = density::estimate(lum, PPD, &mut NoProgress).unwrap();
    optimize_density(&density, flags, enhancement, display)
}

fn optimize_density(
    density: &ConditionalDensity,
    flags: VisualModelFlags,
    enhancement: f32,
    display: &DisplayModel,
) -> (ToneCurve, datmo_ops::OptimizerReport) {
    let model = VisualModel::new(flags);
    let scene = SceneSensitivity::build(
        &model,
        density.scale(),
        density.frequencies(),
        SceneAdaptation::Auto,
    );
    ToneCurveOptimizer::new(model)
        .with_contrast_enhancement(enhancement)
        .optimize(density, &scene, display)
        .unwrap()
}

fn lcd() -> DisplayModel {
    DisplayModel::from_config(&DisplayConfig::Lcd).unwrap()
}

#[test]
fn random_fields_give_monotonic_curves_spanning_the_display() {
    let display = lcd();
    let range = display.dynamic_range();
    let mut rng = Lcg::new(12345);
    for enhancement in [0.3, 1.0, 2.0, 0.7, 1.5] {
        let lum = gen_noise(24, 24, -1.0, 4.0, &mut rng);
        let (curve, report) = optimize(&lum, VisualModelFlags::ALL, enhancement, &display);

        assert_eq!(curve.len(), LogLuminanceScale::standard().len());
        assert_monotonic(curve.y());
        assert_relative_eq!(curve.y()[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(curve.span(), range, epsilon = 1e-3);
        assert!(
            curve.y().iter().all(|&v| (-1e-5..=range + 1e-3).contains(&v)),
            "curve leaves [0, {range}] at enhancement {enhancement}"
        );
        assert!(report.converged(), "enhancement {enhancement}: {report:?}");
    }
}

#[test]
fn null_enhancement_spaces_evenly_covered_nodes_uniformly() {
    let display = lcd();
    let range = display.dynamic_range();
    let scale = LogLuminanceScale::standard();
    let mut density = ConditionalDensity::new(scale, vec![7.5]);
    for x in 59..100 {
        assert!(density.record(0, x, 1, 3.0));
    }
    for x in 60..101 {
        assert!(density.record(0, x, -1, 3.0));
    }
    density.finish();

    let flags = VisualModelFlags {
        luminance_masking: false,
        ..VisualModelFlags::ALL
    };
    let (curve, report) = optimize_density(&density, flags, 0.0, &display);
    assert!(report.converged());
    assert_eq!(report.used_nodes, 42);

    let step = range / 41.0;
    for w in curve.y()[59..=100].windows(2) {
        assert_relative_eq!(w[1] - w[0], step, epsilon = 1e-4);
    }
    assert_relative_eq!(curve.lookup(scale.node(59)), 0.0, epsilon = 1e-5);
    assert_relative_eq!(curve.lookup(scale.node(100)), range, epsilon = 1e-4);
}

/// Largest over smallest node step between the first and last rising node.
fn step_ratio(curve: &ToneCurve) -> f32 {
    let steps: Vec<f32> = curve.y().windows(2).map(|w| w[1] - w[0]).collect();
    let first = steps.iter().position(|&s| s > 1e-6).unwrap();
    let last = steps.iter().rposition(|&s| s > 1e-6).unwrap();
    let inner = &steps[first..=last];
    let max = inner.iter().copied().fold(0.0f32, f32::max);
    let min = inner.iter().copied().fold(f32::INFINITY, f32::min);
    max / min.max(1e-12)
}

#[test]
fn vanishing_enhancement_gives_near_linear_curves() {
    let display = lcd();
    let images = [
        ("noise", gen_noise(32, 32, 0.0, 3.0, &mut Lcg::new(7))),
        ("blocks", gen_blocks(32, 32, 8, &mut Lcg::new(99))),
    ];
    let no_masking = VisualModelFlags {
        contrast_masking: false,
        ..VisualModelFlags::ALL
    };
    for (name, lum) in &images {
        for flags in [VisualModelFlags::ALL, no_masking] {
            for enhancement in [0.0, 1e-3] {
                let (curve, report) = optimize(lum, flags, enhancement, &display);
                assert!(report.converged(), "{name} at {enhancement}: {report:?}");
                assert_monotonic(curve.y());
                assert_relative_eq!(curve.span(), display.dynamic_range(), epsilon = 1e-3);
                let ratio = step_ratio(&curve);
                assert!(ratio < 2.5, "{name} at {enhancement}: step ratio {ratio}");
            }
        }
    }
}

#[test]
fn flat_image_maps_to_mid_range() {
    let display = lcd();
    let range = display.dynamic_range();
    let lum = gen_flat(16, 16, 100.0);
    let (curve, report) = optimize(&lum, VisualModelFlags::ALL, 1.0, &display);

    assert_eq!(report.used_nodes, 3);
    assert_monotonic(curve.y());
    assert_relative_eq!(curve.lookup(2.0), range / 2.0, epsilon = 1e-3);

    let out = apply_tone_curve(&curve, &lum, &grey(&lum), &display, 1.0).unwrap();
    let first = out.get(0, 0);
    assert!(out.data().chunks_exact(3).all(|px| px == first));
    let expected = display.min_luminance() * 10f32.powf(range / 2.0);
    assert_relative_eq!(display.display(first[1]), expected, max_relative = 1e-3);
}

#[test]
fn temporal_filter_converges_to_new_scene() {
    let display = lcd();
    let range = display.dynamic_range();
    let mut rng = Lcg::new(7);
    let dark = gen_noise(24, 24, -1.0, 1.5, &mut rng);
    let bright = gen_noise(24, 24, 1.5, 4.0, &mut rng);
    let (a, _) = optimize(&dark, VisualModelFlags::ALL, 1.0, &display);
    let (b, _) = optimize(&bright, VisualModelFlags::ALL, 1.0, &display);

    for (rate, frames) in [(FrameRate::Fps25, 200), (FrameRate::Fps60, 400)] {
        let mut filter = TemporalFilter::new(rate, range);
        for _ in 0..5 {
            filter.filter(&a);
        }
        let mut out = filter.filter(&b);
        for _ in 0..frames {
            assert_monotonic(out.y());
            assert!(out.y().iter().all(|&v| (0.0..=range).contains(&v)));
            out = filter.filter(&b);
        }
        for (got, want) in out.y().iter().zip(b.y()) {
            assert_relative_eq!(*got, *want, epsilon = 2e-3);
        }
    }
}

#[test]
fn output_code_values_reproduce_curve_luminance() {
    let lum = gen_ramp(48, 4, 0.05, 5000.0);
    let frame = grey(&lum);
    let mut configs: Vec<DisplayConfig> = DisplayConfig::PRESETS
        .iter()
        .map(|name| DisplayConfig::preset(name).unwrap())
        .collect();
    configs.push(DisplayConfig::Lut {
        code: vec![0.0, 0.25, 0.5, 0.75, 1.0],
        luminance: vec![0.3, 5.0, 30.0, 90.0, 180.0],
    });

    for config in configs {
        let mut mapper = ToneMapper::new(TonemapConfig {
            display: config.clone(),
            ..Default::default()
        })
        .unwrap();
        let (out, curve) = mapper.tonemap_frame(&frame, &mut NoProgress).unwrap();
        let display = mapper.display();
        assert_relative_eq!(curve.span(), display.dynamic_range(), epsilon = 1e-3);

        for (i, px) in out.data().chunks_exact(3).enumerate() {
            assert!(px.iter().all(|v| (0.0..=1.0).contains(v)), "{config:?}");
            let want = display.min_luminance() * 10f32.powf(curve.lookup(lum.data()[i].log10()));
            assert_relative_eq!(display.display(px[0]), want, max_relative = 2e-3);
        }
    }
}

#[test]
fn custom_display_range_is_honoured() {
    let display = display_with_range(100.0, 1.5);
    assert_relative_eq!(display.dynamic_range(), 1.5, epsilon = 1e-5);
    let mut rng = Lcg::new(99);
    let lum = gen_noise(24, 24, 0.0, 3.0, &mut rng);
    let (curve, _) = optimize(&lum, VisualModelFlags::ALL, 1.0, &display);
    assert_relative_eq!(curve.span(), 1.5, epsilon = 1e-3);
    assert_monotonic(curve.y());
}
