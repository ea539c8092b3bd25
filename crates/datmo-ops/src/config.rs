//! Tone-mapping configuration.
//!
//! [`TonemapConfig`] gathers every tuning knob of a session. It derives
//! serde so front ends can load it from YAML; [`TonemapConfig::validate`]
//! rejects out-of-range values before any frame is processed.
//!
//! ```yaml
//! contrast_enhancement: 1.2
//! saturation: 1.0
//! reference_white: 300
//! scene_adaptation: auto        # or a luminance in cd/m², e.g. 120
//! frame_rate: 30
//! display:
//!   type: lcd_bright
//! viewing:
//!   screen_heights: { vertical_resolution: 1080, distance: 3.0 }
//! visual_model:
//!   contrast_masking: true
//!   luminance_masking: true
//!   csf: true
//! ```

use crate::optimizer::MAX_ITERATIONS;
use crate::temporal::FrameRate;
use crate::visual::VisualModelFlags;
use crate::{TmoError, TmoResult};
use datmo_core::Error;
use datmo_display::{DisplayConfig, DisplayModel, ViewingGeometry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Adaptation luminance assumed for scene contrasts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "AdaptationRepr", into = "AdaptationRepr")]
pub enum SceneAdaptation {
    /// Each contrast is judged at the luminance of its local background.
    #[default]
    Auto,
    /// Every contrast is judged at one fixed luminance (cd/m²).
    Fixed(f32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AdaptationRepr {
    Luminance(f32),
    Name(String),
}

impl TryFrom<AdaptationRepr> for SceneAdaptation {
    type Error = TmoError;

    fn try_from(repr: AdaptationRepr) -> TmoResult<Self> {
        match repr {
            AdaptationRepr::Luminance(l) => Ok(Self::Fixed(l)),
            AdaptationRepr::Name(s) => s.parse(),
        }
    }
}

impl From<SceneAdaptation> for AdaptationRepr {
    fn from(a: SceneAdaptation) -> Self {
        match a {
            SceneAdaptation::Auto => Self::Name("auto".into()),
            SceneAdaptation::Fixed(l) => Self::Luminance(l),
        }
    }
}

impl FromStr for SceneAdaptation {
    type Err = TmoError;

    fn from_str(s: &str) -> TmoResult<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse::<f32>().map(Self::Fixed).map_err(|_| {
            Error::invalid_parameter(
                "scene_adaptation",
                format!("expected 'auto' or a luminance, got '{s}'"),
            )
            .into()
        })
    }
}

impl fmt::Display for SceneAdaptation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(l) => write!(f, "{l}"),
        }
    }
}

/// All parameters of a tone-mapping session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TonemapConfig {
    /// Multiplier on scene contrasts; below 1 compresses, above 1 boosts.
    pub contrast_enhancement: f32,
    /// Multiplier on the colour saturation exponent.
    pub saturation: f32,
    /// Scene luminance mapped to display peak; `None` or negative disables.
    pub reference_white: Option<f32>,
    /// Visual model components.
    pub visual_model: VisualModelFlags,
    /// How scene contrasts are judged.
    pub scene_adaptation: SceneAdaptation,
    /// Frame rate of the stream, selects the temporal filter.
    pub frame_rate: FrameRate,
    /// Target display.
    pub display: DisplayConfig,
    /// Viewing conditions, written as a one-key map (`pixels_per_degree: 45`).
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub viewing: ViewingGeometry,
    /// Cap on optimizer iterations per frame.
    pub max_iterations: usize,
}

impl Default for TonemapConfig {
    fn default() -> Self {
        Self {
            contrast_enhancement: 1.0,
            saturation: 1.0,
            reference_white: None,
            visual_model: VisualModelFlags::ALL,
            scene_adaptation: SceneAdaptation::Auto,
            frame_rate: FrameRate::Fps25,
            display: DisplayConfig::default(),
            viewing: ViewingGeometry::default(),
            max_iterations: MAX_ITERATIONS,
        }
    }
}

impl TonemapConfig {
    /// Checks every parameter; display and viewing are resolved too.
    pub fn validate(&self) -> TmoResult<()> {
        non_negative("contrast_enhancement", self.contrast_enhancement)?;
        non_negative("saturation", self.saturation)?;
        if let Some(w) = self.reference_white {
            if !w.is_finite() {
                return Err(Error::invalid_parameter("reference_white", format!("must be finite, got {w}")).into());
            }
        }
        if let SceneAdaptation::Fixed(l) = self.scene_adaptation {
            if !(l.is_finite() && l > 0.0) {
                return Err(Error::invalid_parameter(
                    "scene_adaptation",
                    format!("fixed adaptation luminance must be > 0, got {l}"),
                )
                .into());
            }
        }
        if self.max_iterations == 0 {
            return Err(Error::invalid_parameter("max_iterations", "must be >= 1").into());
        }
        DisplayModel::from_config(&self.display)?;
        self.viewing.pixels_per_degree()?;
        Ok(())
    }

    /// Reference white if anchoring is enabled.
    pub fn white_anchor(&self) -> Option<f32> {
        self.reference_white.filter(|&w| w > 0.0)
    }
}

fn non_negative(name: &'static str, v: f32) -> TmoResult<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_parameter(name, format!("must be finite and >= 0, got {v}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let c = TonemapConfig::default();
        c.validate().unwrap();
        assert_eq!(c.white_anchor(), None);
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = [
            TonemapConfig {
                saturation: -0.1,
                ..Default::default()
            },
            TonemapConfig {
                contrast_enhancement: f32::NAN,
                ..Default::default()
            },
            TonemapConfig {
                scene_adaptation: SceneAdaptation::Fixed(0.0),
                ..Default::default()
            },
            TonemapConfig {
                viewing: ViewingGeometry::PixelsPerDegree(-3.0),
                ..Default::default()
            },
            TonemapConfig {
                display: DisplayConfig::Custom {
                    gamma: 2.2,
                    peak_luminance: 0.5,
                    black_level: 1.0,
                    ambient: 0.0,
                    reflectivity: 0.01,
                },
                ..Default::default()
            },
        ];
        for c in bad {
            let err = c.validate().unwrap_err();
            assert!(matches!(err, TmoError::Core(_) | TmoError::Display(_)), "{err}");
        }
    }

    #[test]
    fn test_negative_white_disables() {
        let c = TonemapConfig {
            reference_white: Some(-1.0),
            ..Default::default()
        };
        c.validate().unwrap();
        assert_eq!(c.white_anchor(), None);
    }

    #[test]
    fn test_yaml() {
        let yaml = "
contrast_enhancement: 0.8
scene_adaptation: 120
frame_rate: 60
display:
  type: crt
viewing:
  pixels_per_degree: 45
visual_model:
  csf: false
";
        let c: TonemapConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.contrast_enhancement, 0.8);
        assert_eq!(c.saturation, 1.0);
        assert_eq!(c.scene_adaptation, SceneAdaptation::Fixed(120.0));
        assert_eq!(c.frame_rate, FrameRate::Fps60);
        assert_eq!(c.display, DisplayConfig::Crt);
        assert_eq!(c.viewing, ViewingGeometry::PixelsPerDegree(45.0));
        assert!(!c.visual_model.csf && c.visual_model.contrast_masking);
        c.validate().unwrap();

        let sized: TonemapConfig = serde_yaml::from_str(
            "viewing:\n  screen_heights: { vertical_resolution: 1080, distance: 3.0 }\n",
        )
        .unwrap();
        assert_eq!(
            sized.viewing,
            ViewingGeometry::ScreenHeights {
                vertical_resolution: 1080,
                distance: 3.0
            }
        );
        let text = serde_yaml::to_string(&sized).unwrap();
        assert!(text.contains("screen_heights:"), "{text}");
        assert_eq!(serde_yaml::from_str::<TonemapConfig>(&text).unwrap(), sized);

        let auto: TonemapConfig = serde_yaml::from_str("scene_adaptation: auto").unwrap();
        assert_eq!(auto.scene_adaptation, SceneAdaptation::Auto);
        assert!(serde_yaml::from_str::<TonemapConfig>("frame_rate: 24").is_err());
    }

    #[test]
    fn test_adaptation_from_str() {
        assert_eq!("AUTO".parse::<SceneAdaptation>().unwrap(), SceneAdaptation::Auto);
        assert_eq!("50".parse::<SceneAdaptation>().unwrap(), SceneAdaptation::Fixed(50.0));
        assert!("bright".parse::<SceneAdaptation>().is_err());
        assert_eq!(SceneAdaptation::Fixed(50.0).to_string(), "50");
    }
}
