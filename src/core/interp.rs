use super::error::{ModelError, ModelResult};
use super::utility::Crra;

#[derive(Debug, Clone, Copy)]
pub struct AsymptoticLimit {
    pub intercept: f64,
    pub slope: f64,
}

#[derive(Debug, Clone)]
pub struct LinearInterp {
    x: Vec<f64>,
    y: Vec<f64>,
    limit: Option<AsymptoticLimit>,
    decay: Option<(f64, f64)>,
}

impl LinearInterp {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> ModelResult<Self> {
        Self::build(x, y, None)
    }

    pub fn with_limit(x: Vec<f64>, y: Vec<f64>, intercept: f64, slope: f64) -> ModelResult<Self> {
        Self::build(x, y, Some(AsymptoticLimit { intercept, slope }))
    }

    fn build(x: Vec<f64>, y: Vec<f64>, limit: Option<AsymptoticLimit>) -> ModelResult<Self> {
        if x.len() != y.len() {
            return Err(ModelError::ShapeMismatch {
                context: "interpolation grid",
                left: x.len(),
                right: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(ModelError::Configuration(
                "interpolation grid needs at least two points".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Configuration(
                "interpolation grid must be finite".to_string(),
            ));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ModelError::Configuration(
                "interpolation grid must be strictly increasing".to_string(),
            ));
        }
        Ok(Self::from_sorted(x, y, limit))
    }

    pub(crate) fn from_sorted(x: Vec<f64>, y: Vec<f64>, limit: Option<AsymptoticLimit>) -> Self {
        debug_assert!(x.len() == y.len() && x.len() >= 2);
        debug_assert!(x.windows(2).all(|w| w[1] > w[0]));
        let decay = limit.and_then(|lim| {
            let n = x.len();
            let slope_top = (y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2]);
            let gap = lim.intercept + lim.slope * x[n - 1] - y[n - 1];
            let rate = (slope_top - lim.slope) / gap;
            // The gap to the asymptote must shrink as x grows; otherwise fall
            // back to linear extrapolation from the top segment.
            (gap != 0.0 && rate.is_finite() && rate > 0.0).then_some((gap, rate))
        });
        Self { x, y, limit, decay }
    }

    pub fn x_min(&self) -> f64 {
        self.x[0]
    }

    pub fn x_max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    pub fn eval(&self, xq: f64) -> f64 {
        let n = self.x.len();
        if xq > self.x[n - 1] {
            if let (Some(lim), Some((gap, rate))) = (self.limit, self.decay) {
                return lim.intercept + lim.slope * xq
                    - gap * (-rate * (xq - self.x[n - 1])).exp();
            }
            return self.segment_eval(n - 2, xq);
        }
        if xq <= self.x[0] {
            return self.segment_eval(0, xq);
        }
        let hi = self.x.partition_point(|&v| v < xq).clamp(1, n - 1);
        self.segment_eval(hi - 1, xq)
    }

    fn segment_eval(&self, lo: usize, xq: f64) -> f64 {
        let (x0, x1) = (self.x[lo], self.x[lo + 1]);
        let w = (xq - x0) / (x1 - x0);
        self.y[lo] + w * (self.y[lo + 1] - self.y[lo])
    }
}

#[derive(Debug, Clone)]
pub struct LowerEnvelope {
    pub unconstrained: LinearInterp,
    pub constrained: LinearInterp,
}

impl LowerEnvelope {
    pub fn new(unconstrained: LinearInterp, constrained: LinearInterp) -> Self {
        Self {
            unconstrained,
            constrained,
        }
    }

    pub fn eval(&self, xq: f64) -> f64 {
        self.unconstrained.eval(xq).min(self.constrained.eval(xq))
    }
}

#[derive(Debug, Clone)]
pub enum Curve {
    Interp(LinearInterp),
    Envelope(LowerEnvelope),
}

impl Curve {
    pub fn eval(&self, xq: f64) -> f64 {
        match self {
            Self::Interp(f) => f.eval(xq),
            Self::Envelope(f) => f.eval(xq),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MargValueFunc {
    transformed: Curve,
    crra: Crra,
}

impl MargValueFunc {
    pub fn new(transformed: Curve, rho: f64) -> Self {
        Self {
            transformed,
            crra: Crra::new(rho),
        }
    }

    pub fn eval(&self, xq: f64) -> f64 {
        self.crra.u_prime(self.transformed.eval(xq))
    }
}

#[derive(Debug, Clone)]
pub struct ValueFunc {
    transformed: Curve,
    crra: Crra,
}

impl ValueFunc {
    pub fn new(transformed: Curve, rho: f64) -> Self {
        Self {
            transformed,
            crra: Crra::new(rho),
        }
    }

    pub fn eval(&self, xq: f64) -> f64 {
        self.crra.u(self.transformed.eval(xq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn interpolation_recovers_nodes_and_midpoints() {
        let f = LinearInterp::new(vec![0.0, 1.0, 3.0], vec![0.0, 2.0, 4.0]).expect("valid");
        assert_approx(f.eval(0.0), 0.0);
        assert_approx(f.eval(1.0), 2.0);
        assert_approx(f.eval(3.0), 4.0);
        assert_approx(f.eval(0.5), 1.0);
        assert_approx(f.eval(2.0), 3.0);
    }

    #[test]
    fn extrapolation_without_limit_extends_edge_segments() {
        let f = LinearInterp::new(vec![0.0, 1.0, 3.0], vec![0.0, 2.0, 4.0]).expect("valid");
        assert_approx(f.eval(-1.0), -2.0);
        assert_approx(f.eval(5.0), 6.0);
    }

    #[test]
    fn decay_extrapolation_is_continuous_and_approaches_the_asymptote() {
        // Concave curve below the limiting line y = 0.5 x + 1.
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![0.0, 0.9, 1.7];
        let f = LinearInterp::with_limit(x, y, 1.0, 0.5).expect("valid");
        assert_approx(f.eval(2.0), 1.7);
        let just_above = f.eval(2.0 + 1e-9);
        assert!((just_above - 1.7).abs() < 1e-6);
        let far = f.eval(60.0);
        let asymptote = 1.0 + 0.5 * 60.0;
        assert!(far < asymptote);
        assert!(asymptote - far < 1e-6);
        // The gap shrinks monotonically.
        let gap_near = 1.0 + 0.5 * 4.0 - f.eval(4.0);
        let gap_far = 1.0 + 0.5 * 8.0 - f.eval(8.0);
        assert!(gap_far < gap_near);
    }

    #[test]
    fn decay_extrapolation_handles_curves_above_the_asymptote() {
        // Decreasing curve approaching the constant limit y = 0.3 from above,
        // the shape of a risky-share policy.
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![1.0, 0.8, 0.65];
        let f = LinearInterp::with_limit(x, y, 0.3, 0.0).expect("valid");
        assert_approx(f.eval(2.0), 0.65);
        let far = f.eval(80.0);
        assert!(far > 0.3);
        assert!(far - 0.3 < 1e-4);
        assert!(f.eval(10.0) > f.eval(20.0));
    }

    #[test]
    fn unfittable_decay_falls_back_to_linear_extrapolation() {
        // Top-segment slope below the limiting slope: the gap would grow, so
        // extrapolation stays linear.
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![0.0, 0.2, 0.3];
        let f = LinearInterp::with_limit(x, y, 0.0, 1.0).expect("valid");
        assert_approx(f.eval(4.0), 0.3 + 2.0 * 0.1);
    }

    #[test]
    fn construction_rejects_bad_grids() {
        assert!(matches!(
            LinearInterp::new(vec![0.0, 1.0], vec![0.0]).unwrap_err(),
            ModelError::ShapeMismatch { .. }
        ));
        assert!(LinearInterp::new(vec![0.0], vec![0.0]).is_err());
        assert!(LinearInterp::new(vec![0.0, 0.0], vec![0.0, 1.0]).is_err());
        assert!(LinearInterp::new(vec![1.0, 0.5], vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn lower_envelope_takes_pointwise_minimum() {
        let a = LinearInterp::new(vec![0.0, 2.0], vec![1.0, 1.0]).expect("valid");
        let b = LinearInterp::new(vec![0.0, 2.0], vec![0.0, 2.0]).expect("valid");
        let env = LowerEnvelope::new(a, b);
        assert_approx(env.eval(0.5), 0.5);
        assert_approx(env.eval(1.0), 1.0);
        assert_approx(env.eval(1.5), 1.0);
    }

    #[test]
    fn marg_value_func_applies_marginal_utility_to_the_transformed_curve() {
        let identity = LinearInterp::new(vec![0.0, 1.0], vec![0.0, 1.0]).expect("valid");
        let vp = MargValueFunc::new(Curve::Interp(identity), 2.0);
        assert_approx(vp.eval(2.0), 0.25);
        assert_approx(vp.eval(0.5), 4.0);
    }

    #[test]
    fn value_func_applies_utility_to_the_transformed_curve() {
        let identity = LinearInterp::new(vec![0.0, 1.0], vec![0.0, 1.0]).expect("valid");
        let v = ValueFunc::new(Curve::Interp(identity), 2.0);
        assert_approx(v.eval(2.0), -0.5);
        assert_approx(v.eval(4.0), -0.25);
    }
}
