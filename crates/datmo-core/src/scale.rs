//! The log10 luminance grid shared by density tables, visual-model lookup
//! tables and tone curves.
//!
//! Nodes are `MIN_LOG_LUM + i * LOG_LUM_STEP` for `i in 0..len()`, covering
//! 16 decades (1e-8 .. 1e8 cd/m²) in steps of 0.1.

/// Lowest node of the scale (log10 cd/m²).
pub const MIN_LOG_LUM: f32 = -8.0;
/// Highest node of the scale (log10 cd/m²).
pub const MAX_LOG_LUM: f32 = 8.0;
/// Distance between adjacent nodes (log10 units).
pub const LOG_LUM_STEP: f32 = 0.1;

/// Fixed-step log-luminance axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLuminanceScale {
    min: f32,
    step: f32,
    count: usize,
}

impl Default for LogLuminanceScale {
    fn default() -> Self {
        Self::standard()
    }
}

impl LogLuminanceScale {
    /// The process-wide scale: -8..+8 in steps of 0.1 (161 nodes).
    pub const fn standard() -> Self {
        Self {
            min: MIN_LOG_LUM,
            step: LOG_LUM_STEP,
            count: 161,
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// A scale always has nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Node spacing.
    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    /// First node.
    #[inline]
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Last node.
    #[inline]
    pub fn max(&self) -> f32 {
        self.node(self.count - 1)
    }

    /// Value of node `i`.
    #[inline]
    pub fn node(&self, i: usize) -> f32 {
        self.min + i as f32 * self.step
    }

    /// All node values in order.
    pub fn nodes(&self) -> Vec<f32> {
        (0..self.count).map(|i| self.node(i)).collect()
    }

    /// Nearest node index, or `None` when `x` lies more than half a step
    /// outside the scale.
    #[inline]
    pub fn try_index(&self, x: f32) -> Option<usize> {
        let pos = ((x - self.min) / self.step).round();
        if pos.is_nan() || pos < 0.0 || pos >= self.count as f32 {
            None
        } else {
            Some(pos as usize)
        }
    }

    /// Nearest node index, clamped to the scale.
    #[inline]
    pub fn index_of(&self, x: f32) -> usize {
        let pos = ((x - self.min) / self.step).round();
        if pos.is_nan() || pos <= 0.0 {
            0
        } else {
            (pos as usize).min(self.count - 1)
        }
    }

    /// Clamps `x` into `[min, max]`.
    #[inline]
    pub fn clamp(&self, x: f32) -> f32 {
        x.clamp(self.min, self.max())
    }
}
