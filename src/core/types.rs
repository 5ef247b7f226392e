use serde::Serialize;

use super::interp::{Curve, LinearInterp, MargValueFunc, ValueFunc};

#[derive(Debug, Clone)]
pub struct PeriodParams {
    pub liv_prb: f64,
    pub disc_fac: f64,
    pub crra: f64,
    pub rfree: f64,
    pub perm_gro_fac: f64,
    pub boro_cnst_art: f64,
    pub a_xtra_grid: Vec<f64>,
    pub vfunc_bool: bool,
    pub cubic_bool: bool,
}

#[derive(Debug, Clone)]
pub struct ShareSpec {
    pub share_grid: Vec<f64>,
    pub share_limit: f64,
}

#[derive(Debug, Clone)]
pub struct PeriodSolution {
    pub c_func: Curve,
    pub c_func_cnst: LinearInterp,
    pub v_p_func: MargValueFunc,
    pub v_func: Option<ValueFunc>,
    pub m_nrm_min: f64,
    pub h_nrm: f64,
    pub mpc_min: f64,
    pub mpc_max: f64,
    pub pat_fac: f64,
    pub share_func: Option<LinearInterp>,
    pub end_of_prd_share_func: Option<LinearInterp>,
}

impl PeriodSolution {
    pub fn terminal(crra: f64) -> Self {
        let identity =
            LinearInterp::from_sorted(vec![0.0, 1.0], vec![0.0, 1.0], None);
        let cnst = LinearInterp::from_sorted(vec![0.0, 1.0], vec![0.0, 1.0], None);
        Self {
            c_func: Curve::Interp(identity.clone()),
            c_func_cnst: cnst,
            v_p_func: MargValueFunc::new(Curve::Interp(identity.clone()), crra),
            v_func: Some(ValueFunc::new(Curve::Interp(identity), crra)),
            m_nrm_min: 0.0,
            h_nrm: 0.0,
            mpc_min: 1.0,
            mpc_max: 1.0,
            pat_fac: 1.0,
            share_func: None,
            end_of_prd_share_func: None,
        }
    }

    pub fn report(&self, m_grid: &[f64]) -> SolutionReport {
        let policy = m_grid
            .iter()
            .map(|&m| PolicyPoint {
                m_nrm: m,
                c_nrm: self.c_func.eval(m),
                share: self.share_func.as_ref().map(|f| f.eval(m)),
            })
            .collect();
        SolutionReport {
            m_nrm_min: self.m_nrm_min,
            h_nrm: self.h_nrm,
            mpc_min: self.mpc_min,
            mpc_max: self.mpc_max,
            pat_fac: self.pat_fac,
            policy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionReport {
    pub m_nrm_min: f64,
    pub h_nrm: f64,
    pub mpc_min: f64,
    pub mpc_max: f64,
    pub pat_fac: f64,
    pub policy: Vec<PolicyPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyPoint {
    pub m_nrm: f64,
    pub c_nrm: f64,
    pub share: Option<f64>,
}

pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (stop - start) / (n as f64 - 1.0);
    (0..n).map(|i| start + step * i as f64).collect()
}

pub fn make_asset_grid(min: f64, max: f64, count: usize, nest: u32) -> Vec<f64> {
    let mut lo = min;
    let mut hi = max;
    for _ in 0..nest {
        lo = (lo + 1.0).ln();
        hi = (hi + 1.0).ln();
    }
    let mut grid = linspace(lo, hi, count);
    for _ in 0..nest {
        for g in &mut grid {
            *g = g.exp() - 1.0;
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn linspace_hits_both_endpoints() {
        let g = linspace(0.5, 2.0, 4);
        assert_eq!(g.len(), 4);
        assert_approx(g[0], 0.5);
        assert_approx(g[3], 2.0);
        assert_approx(g[1], 1.0);
    }

    #[test]
    fn asset_grid_is_increasing_and_spans_the_requested_range() {
        let g = make_asset_grid(0.001, 20.0, 48, 3);
        assert_eq!(g.len(), 48);
        assert!((g[0] - 0.001).abs() < 1e-9);
        assert!((g[47] - 20.0).abs() < 1e-6);
        for w in g.windows(2) {
            assert!(w[1] > w[0]);
        }
        // Nesting packs points toward the borrowing constraint.
        assert!(g[24] < 0.5 * (g[0] + g[47]));
    }

    #[test]
    fn terminal_solution_consumes_everything() {
        let terminal = PeriodSolution::terminal(2.0);
        for m in [0.5, 1.0, 4.0, 25.0] {
            assert_approx(terminal.c_func.eval(m), m);
            assert_approx(terminal.v_p_func.eval(m), m.powf(-2.0));
        }
        assert_approx(terminal.m_nrm_min, 0.0);
        assert_approx(terminal.mpc_min, 1.0);
        assert_approx(terminal.mpc_max, 1.0);
        assert_approx(terminal.h_nrm, 0.0);
    }

    #[test]
    fn report_serializes_in_camel_case() {
        let terminal = PeriodSolution::terminal(2.0);
        let report = terminal.report(&[1.0, 2.0]);
        let json = serde_json::to_string(&report).expect("serializable");
        assert!(json.contains("mNrmMin"));
        assert!(json.contains("patFac"));
        assert!(json.contains("cNrm"));
        assert_eq!(report.policy.len(), 2);
        assert_approx(report.policy[1].c_nrm, 2.0);
    }
}
