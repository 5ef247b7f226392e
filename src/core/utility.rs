const LOG_UTILITY_TOL: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct Crra {
    pub rho: f64,
}

impl Crra {
    pub fn new(rho: f64) -> Self {
        Self { rho }
    }

    pub fn is_log(self) -> bool {
        (self.rho - 1.0).abs() < LOG_UTILITY_TOL
    }

    pub fn u(self, c: f64) -> f64 {
        if self.is_log() {
            c.ln()
        } else {
            c.powf(1.0 - self.rho) / (1.0 - self.rho)
        }
    }

    pub fn u_prime(self, c: f64) -> f64 {
        c.powf(-self.rho)
    }

    pub fn u_prime_inv(self, marg_value: f64) -> f64 {
        marg_value.powf(-1.0 / self.rho)
    }

    pub fn u_inv(self, value: f64) -> f64 {
        if self.is_log() {
            value.exp()
        } else {
            ((1.0 - self.rho) * value).powf(1.0 / (1.0 - self.rho))
        }
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
    fn marginal_utility_inverse_round_trips() {
        let u = Crra::new(2.0);
        for c in [0.3, 1.0, 2.5, 14.0] {
            assert_approx(u.u_prime_inv(u.u_prime(c)), c);
        }
    }

    #[test]
    fn utility_inverse_round_trips() {
        let u = Crra::new(3.0);
        for c in [0.3, 1.0, 2.5, 14.0] {
            assert_approx(u.u_inv(u.u(c)), c);
        }
    }

    #[test]
    fn log_branch_round_trips_and_matches_natural_log() {
        let u = Crra::new(1.0);
        assert!(u.is_log());
        assert_approx(u.u(2.0), 2.0_f64.ln());
        assert_approx(u.u_prime(2.0), 0.5);
        for c in [0.4, 1.0, 3.0] {
            assert_approx(u.u_inv(u.u(c)), c);
            assert_approx(u.u_prime_inv(u.u_prime(c)), c);
        }
    }

    #[test]
    fn curvature_orders_utility_levels() {
        let low = Crra::new(1.5);
        let high = Crra::new(4.0);
        assert!(low.u(2.0) > high.u(2.0));
        assert!(high.u_prime(0.5) > low.u_prime(0.5));
    }
}
