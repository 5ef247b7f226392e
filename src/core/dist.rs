use statrs::distribution::{ContinuousCDF, Normal};

use super::error::{ModelError, ModelResult};

const PROB_SUM_TOL: f64 = 1e-8;
const WORST_EVENT_TOL: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct DiscreteDistribution<T: Copy> {
    atoms: Vec<T>,
    probs: Vec<f64>,
}

pub type ScalarDstn = DiscreteDistribution<f64>;
pub type ShockTripleDstn = DiscreteDistribution<(f64, f64, f64)>;

impl<T: Copy> DiscreteDistribution<T> {
    pub fn new(atoms: Vec<T>, probs: Vec<f64>) -> ModelResult<Self> {
        if atoms.len() != probs.len() {
            return Err(ModelError::ShapeMismatch {
                context: "distribution support",
                left: atoms.len(),
                right: probs.len(),
            });
        }
        if atoms.is_empty() {
            return Err(ModelError::Distribution("empty support".to_string()));
        }
        if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ModelError::Distribution(
                "probabilities must be finite and non-negative".to_string(),
            ));
        }
        let total: f64 = probs.iter().sum();
        if (total - 1.0).abs() > PROB_SUM_TOL {
            return Err(ModelError::Distribution(format!(
                "probabilities sum to {total}, expected 1"
            )));
        }
        Ok(Self { atoms, probs })
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atoms(&self) -> &[T] {
        &self.atoms
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    pub fn expect(&self, f: impl Fn(T) -> f64) -> f64 {
        self.atoms
            .iter()
            .zip(&self.probs)
            .map(|(&x, &p)| p * f(x))
            .sum()
    }

    pub fn expect_on(&self, grid: &[f64], f: impl Fn(T, f64) -> f64) -> Vec<f64> {
        grid.iter().map(|&g| self.expect(|x| f(x, g))).collect()
    }

    pub fn expect_zip(
        &self,
        xs: &[f64],
        ys: &[f64],
        f: impl Fn(T, f64, f64) -> f64,
    ) -> ModelResult<Vec<f64>> {
        if xs.len() != ys.len() {
            return Err(ModelError::ShapeMismatch {
                context: "paired expectation grids",
                left: xs.len(),
                right: ys.len(),
            });
        }
        Ok(xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| self.expect(|o| f(o, x, y)))
            .collect())
    }
}

pub fn combine_indep<A: Copy, B: Copy>(
    a: &DiscreteDistribution<A>,
    b: &DiscreteDistribution<B>,
) -> DiscreteDistribution<(A, B)> {
    let mut atoms = Vec::with_capacity(a.len() * b.len());
    let mut probs = Vec::with_capacity(a.len() * b.len());
    for (&xa, &pa) in a.atoms.iter().zip(&a.probs) {
        for (&xb, &pb) in b.atoms.iter().zip(&b.probs) {
            atoms.push((xa, xb));
            probs.push(pa * pb);
        }
    }
    DiscreteDistribution { atoms, probs }
}

impl ScalarDstn {
    pub fn degenerate(x: f64) -> Self {
        Self {
            atoms: vec![x],
            probs: vec![1.0],
        }
    }

    pub fn min_atom(&self) -> f64 {
        self.atoms.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_atom(&self) -> f64 {
        self.atoms.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean(&self) -> f64 {
        self.expect(|x| x)
    }

    pub fn lognormal_from_mean_std(mean: f64, std: f64, n: usize) -> ModelResult<Self> {
        if !(mean > 0.0) || !mean.is_finite() {
            return Err(ModelError::Distribution(format!(
                "lognormal mean must be positive and finite, got {mean}"
            )));
        }
        if !(std >= 0.0) || !std.is_finite() {
            return Err(ModelError::Distribution(format!(
                "lognormal std must be non-negative and finite, got {std}"
            )));
        }
        if n == 0 {
            return Err(ModelError::Distribution(
                "lognormal approximation needs at least one point".to_string(),
            ));
        }
        if std == 0.0 {
            return Ok(Self::degenerate(mean));
        }

        let sigma_sq = (1.0 + (std / mean).powi(2)).ln();
        let sigma = sigma_sq.sqrt();
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| ModelError::Distribution(format!("standard normal: {e}")))?;

        // Equiprobable bins; each atom is the conditional mean of the bin,
        // E[X | bin_i] = n * mean * (Phi(z_i - sigma) - Phi(z_{i-1} - sigma)).
        let mut atoms = Vec::with_capacity(n);
        let mut cdf_lo = 0.0;
        for i in 1..=n {
            let cdf_hi = if i == n {
                1.0
            } else {
                normal.cdf(normal.inverse_cdf(i as f64 / n as f64) - sigma)
            };
            atoms.push(n as f64 * mean * (cdf_hi - cdf_lo));
            cdf_lo = cdf_hi;
        }
        let probs = vec![1.0 / n as f64; n];
        Ok(Self { atoms, probs })
    }

    pub fn mean_one_lognormal(std: f64, n: usize) -> ModelResult<Self> {
        Self::lognormal_from_mean_std(1.0, std, n)
    }

    pub fn with_point_mass_constant_mean(&self, x: f64, p: f64) -> ModelResult<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(ModelError::Distribution(format!(
                "point-mass probability must lie in [0, 1), got {p}"
            )));
        }
        if p == 0.0 {
            return Ok(self.clone());
        }
        let scale = (1.0 - p * x) / (1.0 - p);
        let mut atoms = vec![x];
        let mut probs = vec![p];
        atoms.extend(self.atoms.iter().map(|&a| a * scale));
        probs.extend(self.probs.iter().map(|&q| q * (1.0 - p)));
        Ok(Self { atoms, probs })
    }
}

pub fn income_process(
    perm_std: f64,
    perm_count: usize,
    tran_std: f64,
    tran_count: usize,
    unemp_prb: f64,
    inc_unemp: f64,
) -> ModelResult<(ScalarDstn, ScalarDstn)> {
    let perm = ScalarDstn::mean_one_lognormal(perm_std, perm_count)?;
    let employed = ScalarDstn::mean_one_lognormal(tran_std, tran_count)?;
    let tran = if unemp_prb > 0.0 {
        employed.with_point_mass_constant_mean(inc_unemp, unemp_prb)?
    } else {
        employed
    };
    Ok((perm, tran))
}

#[derive(Debug, Clone)]
pub enum ShockModel {
    Independent {
        perm: ScalarDstn,
        tran: ScalarDstn,
        risky: ScalarDstn,
    },
    Correlated {
        shocks: ShockTripleDstn,
    },
}

impl ShockModel {
    pub fn independent(perm: ScalarDstn, tran: ScalarDstn, risky: ScalarDstn) -> Self {
        Self::Independent { perm, tran, risky }
    }

    pub fn correlated(shocks: ShockTripleDstn) -> Self {
        Self::Correlated { shocks }
    }

    pub fn is_independent(&self) -> bool {
        matches!(self, Self::Independent { .. })
    }

    pub fn joint(&self) -> ShockTripleDstn {
        match self {
            Self::Independent { perm, tran, risky } => {
                let income = combine_indep(perm, tran);
                let full = combine_indep(&income, risky);
                DiscreteDistribution {
                    atoms: full.atoms.iter().map(|&((p, t), r)| (p, t, r)).collect(),
                    probs: full.probs,
                }
            }
            Self::Correlated { shocks } => shocks.clone(),
        }
    }

    pub fn perm_min(&self) -> f64 {
        match self {
            Self::Independent { perm, .. } => perm.min_atom(),
            Self::Correlated { shocks } => fold_component(shocks, |(p, _, _)| p, f64::min),
        }
    }

    pub fn perm_max(&self) -> f64 {
        match self {
            Self::Independent { perm, .. } => perm.max_atom(),
            Self::Correlated { shocks } => fold_component(shocks, |(p, _, _)| p, f64::max),
        }
    }

    pub fn tran_min(&self) -> f64 {
        match self {
            Self::Independent { tran, .. } => tran.min_atom(),
            Self::Correlated { shocks } => fold_component(shocks, |(_, t, _)| t, f64::min),
        }
    }

    pub fn risky_min(&self) -> f64 {
        match self {
            Self::Independent { risky, .. } => risky.min_atom(),
            Self::Correlated { shocks } => fold_component(shocks, |(_, _, r)| r, f64::min),
        }
    }

    pub fn risky_max(&self) -> f64 {
        match self {
            Self::Independent { risky, .. } => risky.max_atom(),
            Self::Correlated { shocks } => fold_component(shocks, |(_, _, r)| r, f64::max),
        }
    }

    pub fn risky_expect(&self, f: impl Fn(f64) -> f64) -> f64 {
        match self {
            Self::Independent { risky, .. } => risky.expect(f),
            Self::Correlated { shocks } => shocks.expect(|(_, _, r)| f(r)),
        }
    }

    pub fn worst_income_prb(&self) -> f64 {
        let joint = self.joint();
        let worst = self.perm_min() * self.tran_min();
        let tol = WORST_EVENT_TOL * (1.0 + worst.abs());
        joint
            .atoms
            .iter()
            .zip(&joint.probs)
            .filter(|&(&(p, t, _), _)| p * t <= worst + tol)
            .map(|(_, &prob)| prob)
            .sum()
    }
}

fn fold_component(
    shocks: &ShockTripleDstn,
    pick: impl Fn((f64, f64, f64)) -> f64,
    fold: impl Fn(f64, f64) -> f64,
) -> f64 {
    let mut iter = shocks.atoms.iter().map(|&a| pick(a));
    let first = iter.next().unwrap_or(f64::NAN);
    iter.fold(first, fold)
}
