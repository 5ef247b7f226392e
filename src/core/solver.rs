use super::dist::ScalarDstn;
use super::error::{ModelError, ModelResult};
use super::types::{ShareSpec, linspace};
use super::utility::Crra;

const INV_GOLDEN: f64 = 0.618_033_988_749_894_9;

pub fn minimize_bounded(f: impl Fn(f64) -> f64, lo: f64, hi: f64, tol: f64) -> f64 {
    let mut a = lo;
    let mut b = hi;
    let mut c = b - INV_GOLDEN * (b - a);
    let mut d = a + INV_GOLDEN * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);
    while b - a > tol {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_GOLDEN * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_GOLDEN * (b - a);
            fd = f(d);
        }
    }
    0.5 * (a + b)
}

pub fn limiting_share(risky: &ScalarDstn, rfree: f64, crra: f64) -> f64 {
    let u = Crra::new(crra);
    let objective = |s: f64| {
        if u.is_log() {
            -risky.expect(|r| (rfree + s * (r - rfree)).ln())
        } else {
            -(1.0 / (1.0 - crra)) * risky.expect(|r| (rfree + s * (r - rfree)).powf(1.0 - crra))
        }
    };
    minimize_bounded(objective, 0.0, 1.0, 1e-10)
}

impl ShareSpec {
    pub fn on_grid(risky: &ScalarDstn, rfree: f64, crra: f64, count: usize) -> ModelResult<Self> {
        if count < 2 {
            return Err(ModelError::Configuration(
                "share grid needs at least two points".to_string(),
            ));
        }
        let share_limit = limiting_share(risky, rfree, crra);
        Ok(Self {
            share_grid: linspace(share_limit, 1.0, count),
            share_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_minimizer_finds_an_interior_minimum() {
        let x = minimize_bounded(|x| (x - 0.3) * (x - 0.3), 0.0, 1.0, 1e-10);
        assert!((x - 0.3).abs() < 1e-8);
    }

    #[test]
    fn bounded_minimizer_pins_boundary_minima_to_the_bracket() {
        let x = minimize_bounded(|x| -x, 0.0, 1.0, 1e-10);
        assert!(x > 1.0 - 1e-8);
        let x = minimize_bounded(|x| x, 0.0, 1.0, 1e-10);
        assert!(x < 1e-8);
    }

    #[test]
    fn limiting_share_rises_with_the_equity_premium() {
        let modest = ScalarDstn::lognormal_from_mean_std(1.05, 0.2, 7).expect("valid");
        let generous = ScalarDstn::lognormal_from_mean_std(1.10, 0.2, 7).expect("valid");
        let s_modest = limiting_share(&modest, 1.03, 2.0);
        let s_generous = limiting_share(&generous, 1.03, 2.0);
        assert!(s_generous > s_modest);
    }

    #[test]
    fn limiting_share_falls_with_risk_aversion() {
        let risky = ScalarDstn::lognormal_from_mean_std(1.08, 0.2, 7).expect("valid");
        let bold = limiting_share(&risky, 1.03, 2.0);
        let timid = limiting_share(&risky, 1.03, 5.0);
        assert!(bold > 0.3);
        assert!(bold <= 1.0);
        assert!(timid < bold);
    }

    #[test]
    fn dominant_risky_asset_pushes_the_limit_to_full_investment() {
        let risky = ScalarDstn::degenerate(1.2);
        let s = limiting_share(&risky, 1.03, 2.0);
        assert!(s > 1.0 - 1e-6);
    }

    #[test]
    fn no_premium_means_no_risky_position() {
        let risky = ScalarDstn::lognormal_from_mean_std(1.03, 0.2, 7).expect("valid");
        let s = limiting_share(&risky, 1.03, 2.0);
        assert!(s < 1e-4);
    }

    #[test]
    fn share_grid_spans_limit_to_one() {
        let risky = ScalarDstn::lognormal_from_mean_std(1.08, 0.2, 7).expect("valid");
        let spec = ShareSpec::on_grid(&risky, 1.03, 2.0, 11).expect("valid");
        assert_eq!(spec.share_grid.len(), 11);
        assert!((spec.share_grid[0] - spec.share_limit).abs() < 1e-12);
        assert!((spec.share_grid[10] - 1.0).abs() < 1e-12);
        for w in spec.share_grid.windows(2) {
            assert!(w[1] > w[0]);
        }
    }
}
