//! Viewing geometry.
//!
//! The visual model needs the angular resolution of the viewing setup:
//! how many pixels fit into one degree of visual angle. It can be given
//! directly or derived from the screen size and viewing distance.

use crate::{DisplayError, DisplayResult};
use serde::{Deserialize, Serialize};

/// Angular resolution used when nothing else is known.
pub const DEFAULT_PIXELS_PER_DEGREE: f32 = 30.0;

/// How far the viewer sits from the screen, in one of three forms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewingGeometry {
    /// Angular resolution given directly.
    PixelsPerDegree(f32),
    /// Vertical resolution and viewing distance in screen heights.
    ScreenHeights {
        /// Vertical resolution in pixels
        vertical_resolution: u32,
        /// Viewing distance as a multiple of the screen height
        distance: f32,
    },
    /// Physical screen description.
    Diagonal {
        /// Screen diagonal in inches
        diagonal_inches: f32,
        /// Horizontal resolution in pixels
        width: u32,
        /// Vertical resolution in pixels
        height: u32,
        /// Viewing distance in metres
        distance_m: f32,
    },
}

impl Default for ViewingGeometry {
    fn default() -> Self {
        Self::PixelsPerDegree(DEFAULT_PIXELS_PER_DEGREE)
    }
}

impl ViewingGeometry {
    /// Pixels per visual degree.
    ///
    /// # Example
    ///
    /// ```rust
    /// use datmo_display::ViewingGeometry;
    ///
    /// let g = ViewingGeometry::ScreenHeights { vertical_resolution: 1080, distance: 3.0 };
    /// let ppd = g.pixels_per_degree().unwrap();
    /// assert!(ppd > 50.0 && ppd < 60.0);
    /// ```
    pub fn pixels_per_degree(&self) -> DisplayResult<f32> {
        let ppd = match *self {
            Self::PixelsPerDegree(ppd) => ppd,
            Self::ScreenHeights {
                vertical_resolution,
                distance,
            } => {
                if !(distance > 0.0) {
                    return Err(DisplayError::InvalidGeometry(format!(
                        "viewing distance must be > 0 screen heights, got {distance}"
                    )));
                }
                let screen_deg = 2.0 * (0.5 / distance).atan().to_degrees();
                vertical_resolution as f32 / screen_deg
            }
            Self::Diagonal {
                diagonal_inches,
                width,
                height,
                distance_m,
            } => {
                if !(diagonal_inches > 0.0 && distance_m > 0.0) || width == 0 || height == 0 {
                    return Err(DisplayError::InvalidGeometry(
                        "diagonal, resolution and distance must be > 0".into(),
                    ));
                }
                let diag_px = ((width as f32).powi(2) + (height as f32).powi(2)).sqrt();
                let pitch_m = diagonal_inches * 0.0254 / diag_px;
                let pixel_deg = 2.0 * (pitch_m / (2.0 * distance_m)).atan().to_degrees();
                1.0 / pixel_deg
            }
        };
        if !(ppd.is_finite() && ppd > 0.0) {
            return Err(DisplayError::InvalidGeometry(format!(
                "pixels per degree must be > 0, got {ppd}"
            )));
        }
        Ok(ppd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_direct() {
        let g = ViewingGeometry::default();
        assert_relative_eq!(g.pixels_per_degree().unwrap(), 30.0);
        assert!(ViewingGeometry::PixelsPerDegree(0.0).pixels_per_degree().is_err());
    }

    #[test]
    fn test_screen_heights() {
        // 1080 lines at 3 picture heights subtend ~18.9 degrees
        let g = ViewingGeometry::ScreenHeights {
            vertical_resolution: 1080,
            distance: 3.0,
        };
        assert_relative_eq!(g.pixels_per_degree().unwrap(), 57.1, epsilon = 0.2);
    }

    #[test]
    fn test_diagonal() {
        // 24" 1920x1080 at 0.6 m is roughly 40 ppd
        let g = ViewingGeometry::Diagonal {
            diagonal_inches: 24.0,
            width: 1920,
            height: 1080,
            distance_m: 0.6,
        };
        let ppd = g.pixels_per_degree().unwrap();
        assert!(ppd > 35.0 && ppd < 45.0, "ppd = {ppd}");
    }

    #[test]
    fn test_bad_distance() {
        let g = ViewingGeometry::ScreenHeights {
            vertical_resolution: 1080,
            distance: 0.0,
        };
        assert!(g.pixels_per_degree().is_err());
    }
}
