//! Tone curve optimisation.
//!
//! The curve is parametrised by how much display log-range each span
//! between *used* luminance nodes receives. A node is used when some
//! observed transition of the [`ConditionalDensity`] starts or ends on it;
//! everything below the first and above the last used node stays flat.
//!
//! Each transition asks that its display contrast produces the same
//! perceptual response as the (enhanced) scene contrast did:
//!
//! ```text
//! R     = T(e * |g|, S_scene)                 target response
//! dy*   = T⁻¹(R, S_display(y))                display increment giving R
//! cost  = Σ count * a² * (Σ_span x - dy*)²    a = secant slope of T at the current increment
//! ```
//!
//! `S_display` depends on the luminance the current curve assigns to the
//! transition's background, and `a` on the current increment, so the
//! problem is re-linearised and solved as a QP until the curve settles:
//!
//! ```text
//! Initialized -> (Linearize -> SolveQp -> CheckConvergence)* -> Converged | MaxIterationsReached
//! ```
//!
//! Below unit enhancement the scene targets shrink towards zero and stop
//! saying where the display range should go, so every span is also pulled
//! towards its share of a linear curve with weight
//! `LINEAR_PRIOR_STRENGTH * (1 - e)²`.
//!
//! Successive QP solutions are blended into the current estimate; the
//! blend factor halves whenever the curve change grows, which stops the
//! two-cycle oscillation relinearisation can otherwise fall into.
//!
//! The iteration cap is not an error: the last feasible curve is returned
//! and the report says so.

use crate::config::SceneAdaptation;
use crate::curve::ToneCurve;
use crate::density::ConditionalDensity;
use crate::qp::QuadraticProgram;
use crate::visual::{masked_stimulus, VisualModel, VisualModelLut};
use crate::TmoResult;
use datmo_core::LogLuminanceScale;
use datmo_display::DisplayFunction;
#[allow(unused_imports)]
use tracing::{debug, trace};

/// Outer iteration cap.
pub const MAX_ITERATIONS: usize = 200;
/// Convergence threshold as a fraction of the scale step.
pub const CONVERGENCE_FRACTION: f32 = 0.01;
/// Smallest fraction of the QP step taken per outer iteration.
pub const MIN_DAMPING: f64 = 1.0 / 64.0;
/// Weight of the reference-white anchor relative to the summed transition weight.
pub const WHITE_ANCHOR_STRENGTH: f64 = 0.1;
/// Weight of connector terms relative to the summed transition weight.
pub const CONNECTOR_STRENGTH: f64 = 1e-3;
/// Per-variable weight of the pull towards the linear curve at zero
/// enhancement. Fades as `(1 - e)²` and vanishes from `e = 1` on.
pub const LINEAR_PRIOR_STRENGTH: f64 = 1.0;

/// Phase of the optimisation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    /// Variables and targets set up, no QP solved yet.
    Initialized,
    /// Building the quadratic model around the current curve.
    Linearize,
    /// Solving the quadratic program.
    SolveQp,
    /// Comparing the new curve to the previous one.
    CheckConvergence,
    /// Node change fell below the threshold.
    Converged,
    /// Iteration cap hit; the last iterate is returned.
    MaxIterationsReached,
}

impl OptimizerState {
    /// `true` for the two final states.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::MaxIterationsReached)
    }
}

/// Summary of one optimisation run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerReport {
    /// Final state.
    pub state: OptimizerState,
    /// Outer iterations performed.
    pub iterations: usize,
    /// Active-set iterations summed over all QP solves.
    pub qp_iterations: usize,
    /// QP solves that hit their own iteration cap.
    pub qp_unconverged: usize,
    /// Number of used nodes.
    pub used_nodes: usize,
    /// Number of decision variables.
    pub variables: usize,
    /// Largest node change in the last iteration.
    pub last_change: f32,
}

impl OptimizerReport {
    /// `true` when the loop stopped on the convergence test.
    pub fn converged(&self) -> bool {
        self.state == OptimizerState::Converged
    }
}

/// Mapping between curve nodes and the QP decision variables.
///
/// Variable `j` holds the display range of the span between used nodes
/// `used[j]` and `used[j + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMap {
    used: Vec<usize>,
    node_count: usize,
    /// For each used node, its position in `used`.
    slot: Vec<Option<usize>>,
}

impl NodeMap {
    /// Builds the map from a per-node "used" mask.
    ///
    /// With fewer than two used nodes the first and last node of the scale
    /// are used instead, so there is always at least one variable.
    pub fn new(mask: &[bool]) -> Self {
        let node_count = mask.len();
        let mut used: Vec<usize> = (0..node_count).filter(|&i| mask[i]).collect();
        if used.len() < 2 && node_count >= 2 {
            used = vec![0, node_count - 1];
        }
        let mut slot = vec![None; node_count];
        for (k, &i) in used.iter().enumerate() {
            slot[i] = Some(k);
        }
        Self {
            used,
            node_count,
            slot,
        }
    }

    /// Used nodes in ascending order.
    pub fn used_nodes(&self) -> &[usize] {
        &self.used
    }

    /// Number of decision variables.
    pub fn variable_count(&self) -> usize {
        self.used.len().saturating_sub(1)
    }

    /// Variable range `lo..hi` whose sum is the curve rise between two used
    /// nodes, or `None` if either node is unused.
    pub fn variables_between(&self, a: usize, b: usize) -> Option<(usize, usize)> {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let lo = (*self.slot.get(a)?)?;
        let hi = (*self.slot.get(b)?)?;
        (lo < hi).then_some((lo, hi))
    }

    /// Initial allocation proportional to span length.
    pub fn uniform(&self, total: f64) -> Vec<f64> {
        let first = self.used.first().copied().unwrap_or(0);
        let last = self.used.last().copied().unwrap_or(0);
        let length = (last - first).max(1) as f64;
        self.used
            .windows(2)
            .map(|w| total * (w[1] - w[0]) as f64 / length)
            .collect()
    }

    /// Node values from variable values, spreading each span evenly over
    /// its intervals.
    pub fn reconstruct(&self, x: &[f64]) -> Vec<f32> {
        let mut y = vec![0.0f32; self.node_count];
        let Some(&first) = self.used.first() else {
            return y;
        };
        let mut acc = 0.0f64;
        let mut node = first;
        for (j, w) in self.used.windows(2).enumerate() {
            let len = (w[1] - w[0]) as f64;
            let v = x.get(j).copied().unwrap_or(0.0).max(0.0);
            for k in 1..=(w[1] - w[0]) {
                y[w[0] + k] = (acc + v * k as f64 / len) as f32;
            }
            acc += v;
            node = w[1];
        }
        for v in &mut y[node + 1..] {
            *v = acc as f32;
        }
        y
    }
}

/// Scene-side sensitivity per band.
#[derive(Debug, Clone, PartialEq)]
pub enum BandSensitivity {
    /// Sensitivity follows the background luminance of each node.
    PerNode(VisualModelLut),
    /// One sensitivity for the whole band.
    Constant(f32),
}

/// Scene sensitivities for every band, built once per viewing setup.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSensitivity {
    bands: Vec<BandSensitivity>,
}

impl SceneSensitivity {
    /// Samples the visual model for the given band frequencies.
    pub fn build(
        model: &VisualModel,
        scale: &LogLuminanceScale,
        frequencies: &[f32],
        adaptation: SceneAdaptation,
    ) -> Self {
        let bands = frequencies
            .iter()
            .map(|&f| match adaptation {
                SceneAdaptation::Auto => BandSensitivity::PerNode(VisualModelLut::build(model, scale, f)),
                SceneAdaptation::Fixed(lum) => BandSensitivity::Constant(model.csf(f, lum)),
            })
            .collect();
        Self { bands }
    }

    /// Number of bands.
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Sensitivity for `band` at scale node `node`.
    #[inline]
    pub fn get(&self, band: usize, node: usize) -> f32 {
        match &self.bands[band] {
            BandSensitivity::PerNode(lut) => lut.get(node),
            BandSensitivity::Constant(s) => *s,
        }
    }
}

/// One observed transition prepared for the QP.
#[derive(Debug, Clone, Copy)]
struct Term {
    band: usize,
    background: usize,
    vars: (usize, usize),
    count: f64,
    response: f64,
    stimulus: f64,
}

/// Per-frame data shared by every outer iteration.
struct Problem<'a> {
    scale: LogLuminanceScale,
    frequencies: &'a [f32],
    black: f32,
    range: f64,
    map: NodeMap,
    linear: Vec<f64>,
    terms: Vec<Term>,
}

/// Computes tone curves from conditional densities.
#[derive(Debug, Clone)]
pub struct ToneCurveOptimizer {
    model: VisualModel,
    contrast_enhancement: f32,
    reference_white: Option<f32>,
    max_iterations: usize,
}

impl ToneCurveOptimizer {
    /// Optimizer with enhancement 1, no reference white and the default cap.
    pub fn new(model: VisualModel) -> Self {
        Self {
            model,
            contrast_enhancement: 1.0,
            reference_white: None,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Factor applied to all scene contrasts before matching.
    pub fn with_contrast_enhancement(mut self, factor: f32) -> Self {
        self.contrast_enhancement = factor;
        self
    }

    /// Scene luminance (cd/m²) anchored to the display peak. Non-positive
    /// values disable the anchor.
    pub fn with_reference_white(mut self, luminance: Option<f32>) -> Self {
        self.reference_white = luminance.filter(|&l| l > 0.0);
        self
    }

    /// Caps the number of outer iterations.
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n.max(1);
        self
    }

    /// Visual model used for both scene and display sensitivities.
    pub fn model(&self) -> &VisualModel {
        &self.model
    }

    fn prepare_terms(
        &self,
        density: &ConditionalDensity,
        scene: &SceneSensitivity,
        map: &NodeMap,
    ) -> Vec<Term> {
        let step = density.scale().step();
        let masking = self.model.flags.contrast_masking;
        density
            .transitions()
            .filter_map(|(band, x, offset, count)| {
                let dest = (x as isize + offset) as usize;
                let vars = map.variables_between(x, dest)?;
                let contrast = self.contrast_enhancement * offset.unsigned_abs() as f32 * step;
                let response = self
                    .model
                    .contrast_transducer(contrast, scene.get(band, x))
                    .abs() as f64;
                let stimulus = if masking { masked_stimulus(response as f32) } else { 0.0 };
                Some(Term {
                    band,
                    background: x,
                    vars,
                    count: count as f64,
                    response,
                    stimulus,
                })
            })
            .collect()
    }

    fn linearize(&self, problem: &Problem<'_>, x: &[f64], y: &[f32]) -> QuadraticProgram {
        let map = &problem.map;
        let n = map.variable_count();
        let masking = self.model.flags.contrast_masking;
        let floor = 0.5 * problem.scale.step() as f64;
        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0.0f64);
        for v in x {
            prefix.push(prefix[prefix.len() - 1] + v);
        }

        let mut weighted = Vec::with_capacity(problem.terms.len());
        let mut covered = vec![false; n];
        let mut weight_sum = 0.0f64;
        for t in &problem.terms {
            let lum = problem.black * 10f32.powf(y[t.background]);
            let s_disp = (self.model.csf(problem.frequencies[t.band], lum) as f64).max(1e-12);
            let target = if masking {
                (1.0 + t.stimulus / s_disp).log10()
            } else {
                t.response / s_disp
            };
            let current = (prefix[t.vars.1] - prefix[t.vars.0]).max(floor);
            let slope = if masking {
                self.model.contrast_transducer(current as f32, s_disp as f32) as f64 / current
            } else {
                s_disp
            };
            let w = t.count * slope * slope;
            weight_sum += w;
            covered[t.vars.0..t.vars.1].iter_mut().for_each(|c| *c = true);
            weighted.push((t.vars, w, target));
        }
        let norm = if weight_sum > 0.0 { weight_sum } else { 1.0 };

        let mut qp = QuadraticProgram::new(n, problem.range);
        for ((lo, hi), w, target) in weighted {
            qp.add_squared_residual(lo, hi, w / norm, target);
        }
        for (j, _) in covered.iter().enumerate().filter(|(_, c)| !**c) {
            qp.add_squared_residual(j, j + 1, CONNECTOR_STRENGTH, 0.0);
        }
        let prior = self.linear_prior_weight();
        if prior > 0.0 {
            for (j, &share) in problem.linear.iter().enumerate() {
                qp.add_squared_residual(j, j + 1, prior, share);
            }
        }
        if let Some(first) = self.white_variable(map, &problem.scale) {
            qp.add_squared_residual(first, n, WHITE_ANCHOR_STRENGTH, 0.0);
        }
        qp
    }

    /// Weight of the linear-curve prior for the current enhancement.
    fn linear_prior_weight(&self) -> f64 {
        let fade = 1.0 - (self.contrast_enhancement as f64).clamp(0.0, 1.0);
        LINEAR_PRIOR_STRENGTH * fade * fade
    }

    /// First variable lying above the reference white node.
    fn white_variable(&self, map: &NodeMap, scale: &LogLuminanceScale) -> Option<usize> {
        let white = self.reference_white?;
        let node = scale.index_of(white.log10());
        let first = map.used_nodes().partition_point(|&u| u < node);
        (first < map.variable_count()).then_some(first)
    }

    /// Computes a tone curve for `density` on `display`.
    ///
    /// The curve is relative to the display black level and spans the
    /// display's dynamic range.
    pub fn optimize(
        &self,
        density: &ConditionalDensity,
        scene: &SceneSensitivity,
        display: &dyn DisplayFunction,
    ) -> TmoResult<(ToneCurve, OptimizerReport)> {
        let scale = *density.scale();
        let range = display.dynamic_range() as f64;

        let mut mask = vec![false; scale.len()];
        for (_, x, offset, _) in density.transitions() {
            mask[x] = true;
            mask[(x as isize + offset) as usize] = true;
        }
        let map = NodeMap::new(&mask);
        let terms = self.prepare_terms(density, scene, &map);
        let linear = map.uniform(range);
        let problem = Problem {
            scale,
            frequencies: density.frequencies(),
            black: display.min_luminance(),
            range,
            map,
            linear,
            terms,
        };
        let map = &problem.map;

        let mut x = problem.linear.clone();
        let mut y = map.reconstruct(&x);
        let mut qp = QuadraticProgram::new(map.variable_count(), range);
        let mut candidate = x.clone();
        let mut report = OptimizerReport {
            state: OptimizerState::Initialized,
            iterations: 0,
            qp_iterations: 0,
            qp_unconverged: 0,
            used_nodes: map.used_nodes().len(),
            variables: map.variable_count(),
            last_change: f32::INFINITY,
        };
        debug!(
            used_nodes = report.used_nodes,
            terms = problem.terms.len(),
            range,
            "tone curve optimization"
        );

        let tolerance = CONVERGENCE_FRACTION * scale.step();
        let mut damping = 1.0f64;
        let mut state = OptimizerState::Initialized;
        while !state.is_terminal() {
            state = match state {
                OptimizerState::Initialized => OptimizerState::Linearize,
                OptimizerState::Linearize => {
                    qp = self.linearize(&problem, &x, &y);
                    OptimizerState::SolveQp
                }
                OptimizerState::SolveQp => {
                    let sol = qp.solve(Some(&x))?;
                    trace!(
                        objective = qp.objective(&sol.x),
                        qp_iterations = sol.iterations,
                        "qp solved"
                    );
                    report.qp_iterations += sol.iterations;
                    if !sol.converged {
                        report.qp_unconverged += 1;
                    }
                    candidate = sol.x;
                    OptimizerState::CheckConvergence
                }
                OptimizerState::CheckConvergence => {
                    report.iterations += 1;
                    for (xi, ci) in x.iter_mut().zip(&candidate) {
                        *xi += damping * (ci - *xi);
                    }
                    let next = map.reconstruct(&x);
                    let change = next
                        .iter()
                        .zip(&y)
                        .fold(0.0f32, |m, (a, b)| m.max((a - b).abs()));
                    trace!(iteration = report.iterations, change, damping, "outer iteration");
                    if change > report.last_change {
                        damping = (damping * 0.5).max(MIN_DAMPING);
                    }
                    y = next;
                    report.last_change = change;
                    if change < tolerance {
                        OptimizerState::Converged
                    } else if report.iterations >= self.max_iterations {
                        OptimizerState::MaxIterationsReached
                    } else {
                        OptimizerState::Linearize
                    }
                }
                terminal => terminal,
            };
        }
        report.state = state;

        if state == OptimizerState::MaxIterationsReached {
            debug!(
                iterations = report.iterations,
                change = report.last_change,
                "tone curve did not settle; using last iterate"
            );
        } else {
            debug!(iterations = report.iterations, "tone curve converged");
        }

        Ok((ToneCurve::from_parts(scale.nodes(), y), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::VisualModelFlags;
    use approx::assert_relative_eq;
    use datmo_display::{DisplayConfig, DisplayModel};

    fn display() -> DisplayModel {
        DisplayModel::from_config(&DisplayConfig::Lcd).unwrap()
    }

    #[test]
    fn test_node_map() {
        let mut mask = vec![false; 10];
        for i in [2, 3, 6] {
            mask[i] = true;
        }
        let map = NodeMap::new(&mask);
        assert_eq!(map.used_nodes(), &[2, 3, 6]);
        assert_eq!(map.variable_count(), 2);
        assert_eq!(map.variables_between(6, 2), Some((0, 2)));
        assert_eq!(map.variables_between(3, 6), Some((1, 2)));
        assert_eq!(map.variables_between(3, 4), None);
    }

    #[test]
    fn test_reconstruct_spreads_spans() {
        let mut mask = vec![false; 8];
        for i in [1, 2, 5] {
            mask[i] = true;
        }
        let map = NodeMap::new(&mask);
        let y = map.reconstruct(&[0.5, 1.5]);
        let expected = [0.0, 0.0, 0.5, 1.0, 1.5, 2.0, 2.0, 2.0];
        for (a, b) in y.iter().zip(expected) {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }
        let u = map.uniform(2.0);
        assert_relative_eq!(u[0], 0.5);
        assert_relative_eq!(u[1], 1.5);
    }

    #[test]
    fn test_node_map_fallback() {
        let map = NodeMap::new(&[false, true, false, false]);
        assert_eq!(map.used_nodes(), &[0, 3]);
        assert_eq!(map.variable_count(), 1);
    }

    #[test]
    fn test_state_terminal() {
        assert!(OptimizerState::Converged.is_terminal());
        assert!(OptimizerState::MaxIterationsReached.is_terminal());
        assert!(!OptimizerState::SolveQp.is_terminal());
    }

    #[test]
    fn test_optimize_spans_display_range() {
        let scale = LogLuminanceScale::standard();
        let mut density = ConditionalDensity::new(scale, vec![7.5]);
        for x in 90..110 {
            density.record(0, x, 1, 10.0);
            density.record(0, x, -1, 10.0);
            density.record(0, x, 3, 2.0);
        }
        density.finish();
        let model = VisualModel::default();
        let scene = SceneSensitivity::build(&model, &scale, density.frequencies(), SceneAdaptation::Auto);
        let disp = display();
        let (curve, report) = ToneCurveOptimizer::new(model)
            .optimize(&density, &scene, &disp)
            .unwrap();
        assert!(curve.is_monotonic());
        assert_relative_eq!(curve.span(), disp.dynamic_range(), epsilon = 1e-4);
        assert_eq!(report.used_nodes, 24);
        assert!(report.iterations >= 1);
        // Flat outside the used nodes
        assert_eq!(curve.y()[50], 0.0);
        assert_relative_eq!(curve.y()[150], disp.dynamic_range(), epsilon = 1e-4);
    }

    #[test]
    fn test_reference_white_pulls_range_down() {
        let scale = LogLuminanceScale::standard();
        let mut density = ConditionalDensity::new(scale, vec![7.5]);
        for x in 80..120 {
            density.record(0, x, 1, 5.0);
            density.record(0, x, -1, 5.0);
        }
        density.finish();
        let model = VisualModel::new(VisualModelFlags {
            luminance_masking: false,
            ..VisualModelFlags::ALL
        });
        let scene = SceneSensitivity::build(&model, &scale, density.frequencies(), SceneAdaptation::Auto);
        let disp = display();
        let white_node = 105;
        let free = ToneCurveOptimizer::new(model);
        let anchored = ToneCurveOptimizer::new(model).with_reference_white(Some(10f32.powf(scale.node(white_node))));
        let (a, _) = free.optimize(&density, &scene, &disp).unwrap();
        let (b, _) = anchored.optimize(&density, &scene, &disp).unwrap();
        assert!(b.y()[white_node] > a.y()[white_node]);
        assert!(b.is_monotonic());
    }

    #[test]
    fn test_zero_enhancement_stays_near_linear() {
        let scale = LogLuminanceScale::standard();
        let mut density = ConditionalDensity::new(scale, vec![7.5]);
        for x in 90..110 {
            let count = if x < 100 { 1.0 } else { 50.0 };
            density.record(0, x, 1, count);
            density.record(0, x, -1, count);
        }
        density.finish();
        let model = VisualModel::default();
        let scene = SceneSensitivity::build(&model, &scale, density.frequencies(), SceneAdaptation::Auto);
        let disp = display();
        let (curve, report) = ToneCurveOptimizer::new(model)
            .with_contrast_enhancement(0.0)
            .optimize(&density, &scene, &disp)
            .unwrap();
        assert!(report.converged());
        assert_relative_eq!(curve.span(), disp.dynamic_range(), epsilon = 1e-4);
        let steps: Vec<f32> = curve.y()[89..=110].windows(2).map(|w| w[1] - w[0]).collect();
        let max = steps.iter().copied().fold(0.0f32, f32::max);
        let min = steps.iter().copied().fold(f32::INFINITY, f32::min);
        assert!(max < 1.5 * min, "steps {min}..{max}");
    }

    #[test]
    fn test_linear_prior_fades_out() {
        let model = VisualModel::default();
        let weight = |e: f32| ToneCurveOptimizer::new(model).with_contrast_enhancement(e).linear_prior_weight();
        assert_relative_eq!(weight(0.0), LINEAR_PRIOR_STRENGTH);
        assert_relative_eq!(weight(0.5), 0.25 * LINEAR_PRIOR_STRENGTH);
        assert_eq!(weight(1.0), 0.0);
        assert_eq!(weight(2.0), 0.0);
    }

    #[test]
    fn test_fixed_adaptation() {
        let model = VisualModel::default();
        let scale = LogLuminanceScale::standard();
        let scene = SceneSensitivity::build(&model, &scale, &[15.0, 7.5], SceneAdaptation::Fixed(100.0));
        assert_eq!(scene.band_count(), 2);
        assert_eq!(scene.get(1, 0), scene.get(1, 160));
        assert_eq!(scene.get(0, 3), model.csf(15.0, 100.0));
    }
}
