//! Progress reporting.
//!
//! A [`ProgressSink`] receives an integer percentage at coarse milestones and
//! answers whether processing may continue. Only the density pass honours a
//! `false` answer; other stages ignore it.

/// Receiver of progress percentages.
pub trait ProgressSink {
    /// Reports `percent` (0..=100). Returns `false` to request an abort.
    fn report(&mut self, percent: u8) -> bool;
}

impl<F> ProgressSink for F
where
    F: FnMut(u8) -> bool,
{
    #[inline]
    fn report(&mut self, percent: u8) -> bool {
        self(percent)
    }
}

/// Sink that ignores every report and never aborts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    #[inline]
    fn report(&mut self, _percent: u8) -> bool {
        true
    }
}
