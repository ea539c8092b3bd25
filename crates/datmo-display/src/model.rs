//! Display function trait, configuration and the resolved [`DisplayModel`].

use crate::{DisplayError, DisplayResult, GgbaDisplay, LutDisplay};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mapping between normalized code values and emitted luminance.
///
/// Implementations must be monotonic so that
/// `inverse_display(display(v)) == v` holds for every `v` in [0, 1].
pub trait DisplayFunction {
    /// Code value in [0, 1] to luminance in cd/m².
    fn display(&self, v: f32) -> f32;

    /// Luminance in cd/m² to code value, clamped to [0, 1].
    fn inverse_display(&self, luminance: f32) -> f32;

    /// Luminance of code value 0 (effective black level).
    fn min_luminance(&self) -> f32;

    /// Luminance of code value 1.
    fn max_luminance(&self) -> f32;

    /// Achievable dynamic range in log10 units (decades).
    fn dynamic_range(&self) -> f32 {
        (self.max_luminance() / self.min_luminance()).log10()
    }
}

/// Serializable display selection.
///
/// ```rust
/// use datmo_display::DisplayConfig;
///
/// let cfg: DisplayConfig = serde_yaml::from_str("type: crt").unwrap();
/// assert_eq!(cfg, DisplayConfig::Crt);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayConfig {
    /// LCD in a bright office.
    LcdOffice,
    /// Typical LCD in a dim room.
    Lcd,
    /// Bright LCD in a dark room.
    LcdBright,
    /// CRT monitor.
    Crt,
    /// Plasma panel.
    Plasma,
    /// User-specified gamma-gain-black-ambient display.
    Custom {
        /// Response exponent
        gamma: f32,
        /// Peak luminance (cd/m²)
        peak_luminance: f32,
        /// Black level (cd/m²)
        black_level: f32,
        /// Ambient illuminance (lux)
        #[serde(default)]
        ambient: f32,
        /// Screen reflectivity
        #[serde(default = "default_reflectivity")]
        reflectivity: f32,
    },
    /// Measured display response.
    Lut {
        /// Code values, 0 to 1
        code: Vec<f32>,
        /// Luminance for each code value (cd/m²)
        luminance: Vec<f32>,
    },
}

fn default_reflectivity() -> f32 {
    0.01
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::Lcd
    }
}

impl DisplayConfig {
    /// Names of the built-in presets, in display order.
    pub const PRESETS: [&'static str; 5] = ["lcd_office", "lcd", "lcd_bright", "crt", "plasma"];

    /// Looks up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lcd_office" | "lcd-office" => Some(Self::LcdOffice),
            "lcd" => Some(Self::Lcd),
            "lcd_bright" | "lcd-bright" => Some(Self::LcdBright),
            "crt" => Some(Self::Crt),
            "plasma" => Some(Self::Plasma),
            _ => None,
        }
    }

    /// Reads a measured display from the two-column LUT text format.
    pub fn parse_lut(text: &str) -> DisplayResult<Self> {
        let lut = LutDisplay::parse(text)?;
        Ok(Self::Lut {
            code: lut.code().to_vec(),
            luminance: lut.luminance(),
        })
    }

    /// Gamma, peak, black, ambient and reflectivity of a parametric display.
    fn ggba_params(&self) -> Option<(f32, f32, f32, f32, f32)> {
        match *self {
            Self::LcdOffice => Some((2.2, 100.0, 0.8, 400.0, 0.01)),
            Self::Lcd => Some((2.2, 200.0, 0.8, 60.0, 0.01)),
            Self::LcdBright => Some((2.6, 500.0, 0.5, 10.0, 0.01)),
            Self::Crt => Some((2.2, 80.0, 1.0, 60.0, 0.02)),
            Self::Plasma => Some((2.2, 150.0, 0.1, 60.0, 0.01)),
            Self::Custom {
                gamma,
                peak_luminance,
                black_level,
                ambient,
                reflectivity,
            } => Some((gamma, peak_luminance, black_level, ambient, reflectivity)),
            Self::Lut { .. } => None,
        }
    }
}

/// A validated display model.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayModel {
    /// Parametric response
    Ggba(GgbaDisplay),
    /// Tabulated response
    Lut(LutDisplay),
}

impl DisplayModel {
    /// Resolves and validates a configuration.
    pub fn from_config(config: &DisplayConfig) -> DisplayResult<Self> {
        let model = match config {
            DisplayConfig::Lut { code, luminance } => {
                Self::Lut(LutDisplay::new(code.clone(), luminance.clone())?)
            }
            _ => {
                let (g, p, b, a, k) = config
                    .ggba_params()
                    .ok_or_else(|| DisplayError::param("type", "display has no parametric form"))?;
                Self::Ggba(GgbaDisplay::new(g, p, b, a, k)?)
            }
        };
        debug!(
            min = model.min_luminance(),
            max = model.max_luminance(),
            range = model.dynamic_range(),
            "display model"
        );
        Ok(model)
    }
}

impl DisplayFunction for DisplayModel {
    #[inline]
    fn display(&self, v: f32) -> f32 {
        match self {
            Self::Ggba(d) => d.display(v),
            Self::Lut(d) => d.display(v),
        }
    }

    #[inline]
    fn inverse_display(&self, luminance: f32) -> f32 {
        match self {
            Self::Ggba(d) => d.inverse_display(luminance),
            Self::Lut(d) => d.inverse_display(luminance),
        }
    }

    #[inline]
    fn min_luminance(&self) -> f32 {
        match self {
            Self::Ggba(d) => d.min_luminance(),
            Self::Lut(d) => d.min_luminance(),
        }
    }

    #[inline]
    fn max_luminance(&self) -> f32 {
        match self {
            Self::Ggba(d) => d.max_luminance(),
            Self::Lut(d) => d.max_luminance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_displays() -> Vec<DisplayModel> {
        let mut out: Vec<DisplayModel> = DisplayConfig::PRESETS
            .iter()
            .map(|n| DisplayModel::from_config(&DisplayConfig::preset(n).unwrap()).unwrap())
            .collect();
        out.push(
            DisplayModel::from_config(&DisplayConfig::Custom {
                gamma: 2.4,
                peak_luminance: 1000.0,
                black_level: 0.05,
                ambient: 5.0,
                reflectivity: 0.01,
            })
            .unwrap(),
        );
        out.push(
            DisplayModel::from_config(&DisplayConfig::Lut {
                code: vec![0.0, 0.3, 0.7, 1.0],
                luminance: vec![0.3, 5.0, 60.0, 250.0],
            })
            .unwrap(),
        );
        out
    }

    #[test]
    fn test_round_trip_every_display() {
        for d in all_displays() {
            for i in 0..=100 {
                let v = i as f32 / 100.0;
                let back = d.inverse_display(d.display(v));
                assert!((back - v).abs() < 1e-4, "{d:?}: v={v} back={back}");
            }
        }
    }

    #[test]
    fn test_monotonic_and_positive_range() {
        for d in all_displays() {
            assert!(d.dynamic_range() > 1.0);
            let mut prev = d.display(0.0);
            for i in 1..=50 {
                let l = d.display(i as f32 / 50.0);
                assert!(l > prev);
                prev = l;
            }
        }
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(DisplayConfig::preset("LCD-Office"), Some(DisplayConfig::LcdOffice));
        assert_eq!(DisplayConfig::preset("oled"), None);
    }

    #[test]
    fn test_yaml_custom() {
        let yaml = "type: custom\ngamma: 2.2\npeak_luminance: 300\nblack_level: 0.3\n";
        let cfg: DisplayConfig = serde_yaml::from_str(yaml).unwrap();
        let d = DisplayModel::from_config(&cfg).unwrap();
        assert!((d.max_luminance() - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_custom_rejected() {
        let cfg = DisplayConfig::Custom {
            gamma: -1.0,
            peak_luminance: 100.0,
            black_level: 1.0,
            ambient: 0.0,
            reflectivity: 0.01,
        };
        assert!(DisplayModel::from_config(&cfg).is_err());
    }

    #[test]
    fn test_parse_lut_config() {
        let cfg = DisplayConfig::parse_lut("0 0.5\n0.5 20\n1 180\n").unwrap();
        let DisplayConfig::Lut { code, luminance } = &cfg else {
            panic!("expected a LUT config, got {cfg:?}");
        };
        assert_eq!(code, &[0.0, 0.5, 1.0]);
        assert!((luminance[2] - 180.0).abs() < 1e-2);
        let d = DisplayModel::from_config(&cfg).unwrap();
        assert!((d.min_luminance() - 0.5).abs() < 1e-5);
        assert!(DisplayConfig::parse_lut("0 1\n").is_err());
    }
}
