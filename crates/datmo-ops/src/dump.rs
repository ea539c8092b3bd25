//! CSV dump of per-frame tone curves.
//!
//! Each frame starts with a header record followed by one row per node:
//!
//! ```text
//! frame,<index>,<node count>
//! <x>,<y>
//! ...
//! ```
//!
//! Values are written with the shortest representation that reads back
//! to the same `f32`.

use crate::curve::ToneCurve;
use crate::{TmoError, TmoResult};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Writer appending one curve per frame.
pub struct CurveDump<W: Write> {
    out: W,
    frames: usize,
}

impl CurveDump<BufWriter<File>> {
    /// Creates (truncates) a dump file.
    pub fn create(path: impl AsRef<Path>) -> TmoResult<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> CurveDump<W> {
    /// Wraps a writer.
    pub fn new(out: W) -> Self {
        Self { out, frames: 0 }
    }

    /// Records written so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Appends the curve of frame `index`.
    pub fn write(&mut self, index: usize, curve: &ToneCurve) -> TmoResult<()> {
        writeln!(self.out, "frame,{index},{}", curve.len())?;
        for (x, y) in curve.x().iter().zip(curve.y()) {
            writeln!(self.out, "{x},{y}")?;
        }
        self.frames += 1;
        Ok(())
    }

    /// Flushes buffered output.
    pub fn flush(&mut self) -> TmoResult<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flushes and returns the inner writer.
    pub fn into_inner(mut self) -> TmoResult<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

fn parse_err(line: usize, reason: impl Into<String>) -> TmoError {
    TmoError::Parse {
        line,
        reason: reason.into(),
    }
}

/// Reads every `(frame index, curve)` record from a dump.
pub fn read_curves<R: BufRead>(input: R) -> TmoResult<Vec<(usize, ToneCurve)>> {
    let mut out = Vec::new();
    let mut lines = input.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((no, line)) = lines.next() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        if fields.next() != Some("frame") {
            return Err(parse_err(no, format!("expected frame header, got '{line}'")));
        }
        let index: usize = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(|| parse_err(no, "bad frame index"))?;
        let count: usize = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(|| parse_err(no, "bad node count"))?;

        let mut x = Vec::with_capacity(count);
        let mut y = Vec::with_capacity(count);
        for _ in 0..count {
            let (no, row) = lines
                .next()
                .ok_or_else(|| parse_err(no, format!("frame {index} truncated")))?;
            let row = row?;
            let (a, b) = row
                .trim()
                .split_once(',')
                .ok_or_else(|| parse_err(no, "expected 'x,y'"))?;
            let parse = |s: &str| s.trim().parse::<f32>().map_err(|e| parse_err(no, e.to_string()));
            x.push(parse(a)?);
            y.push(parse(b)?);
        }
        let curve = ToneCurve::new(x, y).map_err(|e| parse_err(no, e.to_string()))?;
        out.push((index, curve));
    }
    Ok(out)
}

/// Reads a dump file.
pub fn read_curves_file(path: impl AsRef<Path>) -> TmoResult<Vec<(usize, ToneCurve)>> {
    read_curves(BufReader::new(File::open(path)?))
}
