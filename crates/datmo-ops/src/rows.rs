//! Row-parallel iteration helper.
//!
//! Pixel rows are independent in the pyramid filter and in the
//! applicator, so both hand each output row to [`for_each_row`]. With the
//! `parallel` feature (default) rows are distributed over the rayon pool;
//! without it they run in order on the calling thread.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Calls `f(y, row)` for every `width`-sized row of `dst`.
pub(crate) fn for_each_row<F>(dst: &mut [f32], width: usize, f: F)
where
    F: Fn(usize, &mut [f32]) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    dst.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| f(y, row));

    #[cfg(not(feature = "parallel"))]
    dst.chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| f(y, row));
}
