//! Plane buffers for tone-mapping input and output.
//!
//! - [`Plane`] - One float channel, row-major, top-to-bottom
//! - [`RgbFrame`] - Three planes (linear R, G, B) of the same size
//!
//! # Memory Layout
//!
//! ```text
//! Memory: [p(0,0) p(1,0) ... p(w-1,0)]  <- Row 0
//!         [p(0,1) p(1,1) ... p(w-1,1)]  <- Row 1
//!         ...
//! ```
//!
//! Planes are planar rather than interleaved because the density pass and
//! the applicator work on the luminance channel alone.
//!
//! # Usage
//!
//! ```rust
//! use datmo_core::Plane;
//!
//! let lum = Plane::filled(4, 2, 100.0).unwrap();
//! assert_eq!(lum.len(), 8);
//! assert_eq!(lum.get(3, 1), 100.0);
//! ```

use crate::{Error, Result};
use rayon::prelude::*;

/// Rec.709 luma coefficients for R, G, B.
pub const REC709_LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Relative luminance of a linear Rec.709 triplet.
#[inline]
pub fn luminance_rec709(r: f32, g: f32, b: f32) -> f32 {
    REC709_LUMA[0] * r + REC709_LUMA[1] * g + REC709_LUMA[2] * b
}

/// Single-channel float image stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Plane {
    /// Wraps an existing buffer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidDimensions`] if either dimension is zero or the buffer
    /// length is not `width * height`.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_dimensions(
                width,
                height,
                "width and height must be > 0",
            ));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| Error::invalid_dimensions(width, height, "size overflow"))?;
        if data.len() != expected {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("expected {} samples, got {}", expected, data.len()),
            ));
        }
        Ok(Self { width, height, data })
    }

    /// Creates a plane with every sample set to `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> Result<Self> {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    /// Builds a plane by evaluating `f(x, y)` for every sample.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> Result<Self> {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(width, height, data)
    }

    /// Plane width in samples.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Plane height in samples.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false` for a constructed plane; present for API symmetry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the plane.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Row `y` as a slice.
    #[inline]
    pub fn row(&self, y: u32) -> &[f32] {
        let w = self.width as usize;
        let start = y as usize * w;
        &self.data[start..start + w]
    }

    /// Raw samples.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Raw samples, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the plane and returns its buffer.
    #[inline]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Linear-light RGB frame stored as three planes.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbFrame {
    /// Red channel
    pub r: Plane,
    /// Green channel
    pub g: Plane,
    /// Blue channel
    pub b: Plane,
}

impl RgbFrame {
    /// Groups three planes into a frame.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] if the planes differ in size.
    pub fn new(r: Plane, g: Plane, b: Plane) -> Result<Self> {
        for other in [&g, &b] {
            if other.dims() != r.dims() {
                return Err(Error::dimension_mismatch(r.dims(), other.dims()));
            }
        }
        Ok(Self { r, g, b })
    }

    /// Splits an interleaved `[R G B R G B ...]` buffer into planes.
    pub fn from_interleaved(width: u32, height: u32, rgb: &[f32]) -> Result<Self> {
        let count = width as usize * height as usize;
        if rgb.len() != count * 3 {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("expected {} interleaved samples, got {}", count * 3, rgb.len()),
            ));
        }
        let mut r = Vec::with_capacity(count);
        let mut g = Vec::with_capacity(count);
        let mut b = Vec::with_capacity(count);
        for px in rgb.chunks_exact(3) {
            r.push(px[0]);
            g.push(px[1]);
            b.push(px[2]);
        }
        Self::new(
            Plane::new(width, height, r)?,
            Plane::new(width, height, g)?,
            Plane::new(width, height, b)?,
        )
    }

    /// Frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.r.width()
    }

    /// Frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.r.height()
    }

    /// Derives the luminance plane with Rec.709 weights.
    pub fn luminance(&self) -> Plane {
        let data: Vec<f32> = self
            .r
            .data()
            .par_iter()
            .zip(self.g.data().par_iter())
            .zip(self.b.data().par_iter())
            .map(|((&r, &g), &b)| luminance_rec709(r, g, b))
            .collect();
        Plane {
            width: self.r.width,
            height: self.r.height,
            data,
        }
    }

    /// Interleaves the planes back into `[R G B ...]`.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.r.len() * 3);
        for i in 0..self.r.len() {
            out.push(self.r.data[i]);
            out.push(self.g.data[i]);
            out.push(self.b.data[i]);
        }
        out
    }
}
