use super::dist::{ScalarDstn, ShockModel};
use super::error::{ModelError, ModelResult};
use super::interp::{Curve, LinearInterp, LowerEnvelope, MargValueFunc, ValueFunc};
use super::types::{PeriodParams, PeriodSolution, ShareSpec};
use super::utility::Crra;

pub fn solve_one_period(
    solution_next: &PeriodSolution,
    shocks: &ShockModel,
    params: &PeriodParams,
) -> ModelResult<PeriodSolution> {
    PeriodSolver {
        next: solution_next,
        shocks,
        params,
        choice: ShareChoice::Fixed,
        u: Crra::new(params.crra),
    }
    .solve()
}

pub fn solve_one_period_portfolio(
    solution_next: &PeriodSolution,
    shocks: &ShockModel,
    params: &PeriodParams,
    share_spec: &ShareSpec,
) -> ModelResult<PeriodSolution> {
    PeriodSolver {
        next: solution_next,
        shocks,
        params,
        choice: ShareChoice::Adjustable(share_spec),
        u: Crra::new(params.crra),
    }
    .solve()
}

enum ShareChoice<'a> {
    Fixed,
    Adjustable(&'a ShareSpec),
}

struct PatienceStats {
    disc_fac_eff: f64,
    pat_fac: f64,
    mpc_min: f64,
    h_nrm: f64,
    mpc_max: f64,
}

struct BoundaryInfo {
    boro_cnst_nat: f64,
    m_nrm_min: f64,
    mpc_max_eff: f64,
    zero_bound: bool,
    c_func_cnst: LinearInterp,
}

struct SolverGrids {
    a_nrm: Vec<f64>,
    b_nrm: Vec<f64>,
    w_nrm: Vec<f64>,
}

struct EndOfPeriod {
    v_p: Vec<f64>,
    opt_share: Option<Vec<f64>>,
}

struct EgmPoints {
    m_nrm: Vec<f64>,
    c_func: Curve,
    v_p_func: MargValueFunc,
}

struct PeriodSolver<'a> {
    next: &'a PeriodSolution,
    shocks: &'a ShockModel,
    params: &'a PeriodParams,
    choice: ShareChoice<'a>,
    u: Crra,
}

impl PeriodSolver<'_> {
    fn solve(&self) -> ModelResult<PeriodSolution> {
        self.validate()?;
        let stats = self.patience_stats();
        let bounds = self.borrowing_constraint(&stats);
        let grids = self.asset_grids(&bounds);
        let end = self.end_of_period_marg_value(&stats, &bounds, &grids)?;
        let egm = self.invert_euler(&stats, &bounds, &grids, &end)?;
        let v_func = if self.params.vfunc_bool {
            Some(self.value_function(&stats, &bounds, &grids, &end, &egm)?)
        } else {
            None
        };
        let (share_func, end_of_prd_share_func) =
            self.share_functions(&bounds, &grids, &end, &egm)?;
        Ok(PeriodSolution {
            c_func: egm.c_func,
            c_func_cnst: bounds.c_func_cnst,
            v_p_func: egm.v_p_func,
            v_func,
            m_nrm_min: bounds.m_nrm_min,
            h_nrm: stats.h_nrm,
            mpc_min: stats.mpc_min,
            mpc_max: bounds.mpc_max_eff,
            pat_fac: stats.pat_fac,
            share_func,
            end_of_prd_share_func,
        })
    }

    fn validate(&self) -> ModelResult<()> {
        let p = self.params;
        if p.boro_cnst_art != 0.0 {
            return Err(ModelError::Configuration(
                "artificial borrowing constraint must be exactly zero when savings \
                 carry unbounded risky returns"
                    .to_string(),
            ));
        }
        if p.cubic_bool {
            return Err(ModelError::Configuration(
                "cubic interpolation is not implemented for the risky-asset solver".to_string(),
            ));
        }
        if !(p.crra > 0.0 && p.crra.is_finite()) {
            return Err(ModelError::Configuration(format!(
                "relative risk aversion must be positive, got {}",
                p.crra
            )));
        }
        if !(p.disc_fac > 0.0) || !(p.liv_prb > 0.0 && p.liv_prb <= 1.0) {
            return Err(ModelError::Configuration(
                "discount factor must be positive and survival probability in (0, 1]".to_string(),
            ));
        }
        if !(p.rfree > 0.0) || !(p.perm_gro_fac > 0.0) {
            return Err(ModelError::Configuration(
                "riskless return and income growth factors must be positive".to_string(),
            ));
        }
        if p.a_xtra_grid.len() < 2
            || p.a_xtra_grid[0] <= 0.0
            || p.a_xtra_grid.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(ModelError::Configuration(
                "asset grid must be strictly increasing with a positive first point".to_string(),
            ));
        }
        if self.shocks.perm_min() <= 0.0
            || self.shocks.tran_min() < 0.0
            || self.shocks.risky_min() <= 0.0
        {
            return Err(ModelError::Configuration(
                "shock supports must be positive (transitory income may reach zero)".to_string(),
            ));
        }
        if let ShareChoice::Adjustable(spec) = &self.choice {
            if !self.shocks.is_independent() {
                return Err(ModelError::Configuration(
                    "portfolio choice requires independent income and return shocks".to_string(),
                ));
            }
            let grid = &spec.share_grid;
            if grid.len() < 2
                || grid[0] < 0.0
                || grid[grid.len() - 1] > 1.0
                || grid.windows(2).any(|w| w[1] <= w[0])
            {
                return Err(ModelError::Configuration(
                    "share grid must be strictly increasing within [0, 1]".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn patience_stats(&self) -> PatienceStats {
        let p = self.params;
        let disc_fac_eff = p.disc_fac * p.liv_prb;
        let pat_fac = self
            .shocks
            .risky_expect(|r| (r * disc_fac_eff).powf(1.0 / p.crra) / r);
        let mpc_min = 1.0 / (1.0 + pat_fac / self.next.mpc_min);
        let h_nrm_next = self.next.h_nrm;
        let perm_gro = p.perm_gro_fac;
        let h_nrm = self
            .shocks
            .joint()
            .expect(|(perm, tran, risky)| perm_gro / risky * (perm * tran + h_nrm_next));
        let worst_prb = self.shocks.worst_income_prb();
        let mpc_max =
            1.0 / (1.0 + worst_prb.powf(1.0 / p.crra) * pat_fac / self.next.mpc_max);
        PatienceStats {
            disc_fac_eff,
            pat_fac,
            mpc_min,
            h_nrm,
            mpc_max,
        }
    }

    fn borrowing_constraint(&self, stats: &PatienceStats) -> BoundaryInfo {
        let p = self.params;
        let boro_cnst_nat = (self.next.m_nrm_min - self.shocks.tran_min())
            * (p.perm_gro_fac * self.shocks.perm_min())
            / self.shocks.risky_max();
        let zero_bound = boro_cnst_nat == p.boro_cnst_art;
        let m_nrm_min = boro_cnst_nat.max(p.boro_cnst_art);
        let mpc_max_eff = if boro_cnst_nat < m_nrm_min {
            1.0
        } else {
            stats.mpc_max
        };
        let c_func_cnst = LinearInterp::from_sorted(
            vec![m_nrm_min, m_nrm_min + 1.0],
            vec![0.0, 1.0],
            None,
        );
        BoundaryInfo {
            boro_cnst_nat,
            m_nrm_min,
            mpc_max_eff,
            zero_bound,
            c_func_cnst,
        }
    }

    fn asset_grids(&self, bounds: &BoundaryInfo) -> SolverGrids {
        let p = self.params;
        let g = p.perm_gro_fac;
        let (r_min, r_max) = (self.shocks.risky_min(), self.shocks.risky_max());
        let (perm_min, perm_max) = (self.shocks.perm_min(), self.shocks.perm_max());
        if bounds.zero_bound {
            let a_nrm = p.a_xtra_grid.clone();
            let mut b_nrm = vec![a_nrm[0] * r_min];
            for &a in &a_nrm {
                push_strict(&mut b_nrm, a * r_max);
            }
            let mut w_nrm = vec![b_nrm[0] / (g * perm_max)];
            for &b in &b_nrm {
                push_strict(&mut w_nrm, b / (g * perm_min));
            }
            SolverGrids { a_nrm, b_nrm, w_nrm }
        } else {
            let mut a_nrm = Vec::with_capacity(p.a_xtra_grid.len() + 1);
            a_nrm.push(p.boro_cnst_art);
            a_nrm.extend(p.a_xtra_grid.iter().copied());
            let b_nrm: Vec<f64> = a_nrm.iter().map(|&a| a * r_max).collect();
            let w_nrm: Vec<f64> = b_nrm.iter().map(|&b| b / (g * perm_min)).collect();
            SolverGrids { a_nrm, b_nrm, w_nrm }
        }
    }

    fn exp_marg_value_func(
        &self,
        dstn: &ScalarDstn,
        grid: &[f64],
        f: impl Fn(f64, f64) -> f64,
    ) -> ModelResult<(MargValueFunc, Vec<f64>)> {
        let vals = dstn.expect_on(grid, f);
        let nvrs: Vec<f64> = vals.iter().map(|&v| self.u.u_prime_inv(v)).collect();
        let interp = LinearInterp::new(grid.to_vec(), nvrs)?;
        Ok((
            MargValueFunc::new(Curve::Interp(interp), self.params.crra),
            vals,
        ))
    }

    fn exp_value_func(
        &self,
        dstn: &ScalarDstn,
        grid: &[f64],
        f: impl Fn(f64, f64) -> f64,
    ) -> ModelResult<(ValueFunc, Vec<f64>)> {
        let vals = dstn.expect_on(grid, f);
        let nvrs: Vec<f64> = vals.iter().map(|&v| self.u.u_inv(v)).collect();
        let interp = LinearInterp::new(grid.to_vec(), nvrs)?;
        Ok((ValueFunc::new(Curve::Interp(interp), self.params.crra), vals))
    }

    fn pre_perm_marg_value(
        &self,
        grids: &SolverGrids,
        perm: &ScalarDstn,
        tran: &ScalarDstn,
    ) -> ModelResult<MargValueFunc> {
        let v_p_next = &self.next.v_p_func;
        let (pre_tran, _) =
            self.exp_marg_value_func(tran, &grids.w_nrm, |tran_shk, w| v_p_next.eval(w + tran_shk))?;
        let g = self.params.perm_gro_fac;
        let rho = self.params.crra;
        let (pre_perm, _) = self.exp_marg_value_func(perm, &grids.b_nrm, move |perm_shk, b| {
            let shk = perm_shk * g;
            shk.powf(-rho) * pre_tran.eval(b / shk)
        })?;
        Ok(pre_perm)
    }

    fn end_of_period_marg_value(
        &self,
        stats: &PatienceStats,
        bounds: &BoundaryInfo,
        grids: &SolverGrids,
    ) -> ModelResult<EndOfPeriod> {
        match (&self.choice, self.shocks) {
            (ShareChoice::Fixed, ShockModel::Independent { perm, tran, risky }) => {
                let pre_perm = self.pre_perm_marg_value(grids, perm, tran)?;
                let beta = stats.disc_fac_eff;
                let v_p = risky.expect_on(&grids.a_nrm, |r, a| beta * r * pre_perm.eval(a * r));
                Ok(EndOfPeriod {
                    v_p,
                    opt_share: None,
                })
            }
            (ShareChoice::Fixed, ShockModel::Correlated { .. }) => {
                let joint = self.shocks.joint();
                let v_p_next = &self.next.v_p_func;
                let g = self.params.perm_gro_fac;
                let rho = self.params.crra;
                let beta = stats.disc_fac_eff;
                let v_p = joint.expect_on(&grids.a_nrm, |(perm_shk, tran_shk, r), a| {
                    let perm = perm_shk * g;
                    let m_next = a * r / perm + tran_shk;
                    beta * r * perm.powf(-rho) * v_p_next.eval(m_next)
                });
                Ok(EndOfPeriod {
                    v_p,
                    opt_share: None,
                })
            }
            (ShareChoice::Adjustable(spec), ShockModel::Independent { .. }) => {
                self.end_vp_with_share_choice(stats, bounds, grids, spec)
            }
            (ShareChoice::Adjustable(_), ShockModel::Correlated { .. }) => {
                Err(ModelError::Configuration(
                    "portfolio choice requires independent income and return shocks".to_string(),
                ))
            }
        }
    }

    fn end_vp_with_share_choice(
        &self,
        stats: &PatienceStats,
        bounds: &BoundaryInfo,
        grids: &SolverGrids,
        spec: &ShareSpec,
    ) -> ModelResult<EndOfPeriod> {
        let ShockModel::Independent { perm, tran, risky } = self.shocks else {
            return Err(ModelError::Configuration(
                "portfolio choice requires independent income and return shocks".to_string(),
            ));
        };
        let pre_perm = self.pre_perm_marg_value(grids, perm, tran)?;
        let rfree = self.params.rfree;
        let share_grid = &spec.share_grid;

        let mut opt_share = Vec::with_capacity(grids.a_nrm.len());
        for &a in &grids.a_nrm {
            let foc: Vec<f64> = share_grid
                .iter()
                .map(|&s| {
                    risky.expect(|r| {
                        let r_diff = r - rfree;
                        a * r_diff * pre_perm.eval(a * (rfree + r_diff * s))
                    })
                })
                .collect();
            opt_share.push(optimal_share_from_foc(&foc, share_grid));
        }
        if !bounds.zero_bound {
            // The grid bottom is the constraint itself; nothing to diversify.
            opt_share[0] = 1.0;
        }

        let beta = stats.disc_fac_eff;
        let v_p = risky
            .expect_zip(&grids.a_nrm, &opt_share, |r, a, s| {
                let r_port = rfree + (r - rfree) * s;
                r_port * pre_perm.eval(a * r_port)
            })?
            .into_iter()
            .map(|v| beta * v)
            .collect();
        Ok(EndOfPeriod {
            v_p,
            opt_share: Some(opt_share),
        })
    }

    fn invert_euler(
        &self,
        stats: &PatienceStats,
        bounds: &BoundaryInfo,
        grids: &SolverGrids,
        end: &EndOfPeriod,
    ) -> ModelResult<EgmPoints> {
        let c_nrm: Vec<f64> = end.v_p.iter().map(|&vp| self.u.u_prime_inv(vp)).collect();
        let m_nrm: Vec<f64> = grids
            .a_nrm
            .iter()
            .zip(&c_nrm)
            .map(|(&a, &c)| a + c)
            .collect();

        let mut m_pts = Vec::with_capacity(m_nrm.len() + 1);
        m_pts.push(bounds.boro_cnst_nat);
        m_pts.extend(&m_nrm);
        let mut c_pts = Vec::with_capacity(c_nrm.len() + 1);
        c_pts.push(0.0);
        c_pts.extend(&c_nrm);

        let c_unc = LinearInterp::with_limit(
            m_pts,
            c_pts,
            stats.mpc_min * stats.h_nrm,
            stats.mpc_min,
        )?;
        let c_func = Curve::Envelope(LowerEnvelope::new(c_unc, bounds.c_func_cnst.clone()));
        let v_p_func = MargValueFunc::new(c_func.clone(), self.params.crra);
        Ok(EgmPoints {
            m_nrm,
            c_func,
            v_p_func,
        })
    }

    fn pre_perm_value(
        &self,
        grids: &SolverGrids,
        perm: &ScalarDstn,
        tran: &ScalarDstn,
        v_next: &ValueFunc,
    ) -> ModelResult<ValueFunc> {
        let (pre_tran_v, _) =
            self.exp_value_func(tran, &grids.w_nrm, |tran_shk, w| v_next.eval(w + tran_shk))?;
        let g = self.params.perm_gro_fac;
        let rho = self.params.crra;
        let (pre_perm_v, _) = self.exp_value_func(perm, &grids.b_nrm, move |perm_shk, b| {
            let shk = perm_shk * g;
            shk.powf(1.0 - rho) * pre_tran_v.eval(b / shk)
        })?;
        Ok(pre_perm_v)
    }

    fn end_of_period_value(
        &self,
        stats: &PatienceStats,
        grids: &SolverGrids,
        end: &EndOfPeriod,
        v_next: &ValueFunc,
    ) -> ModelResult<ValueFunc> {
        let beta = stats.disc_fac_eff;
        if let Some(shares) = &end.opt_share {
            let ShockModel::Independent { perm, tran, risky } = self.shocks else {
                return Err(ModelError::Configuration(
                    "portfolio choice requires independent income and return shocks".to_string(),
                ));
            };
            let pre_perm_v = self.pre_perm_value(grids, perm, tran, v_next)?;
            let rfree = self.params.rfree;
            let vals = risky.expect_zip(&grids.a_nrm, shares, |r, a, s| {
                let r_port = rfree + (r - rfree) * s;
                beta * pre_perm_v.eval(a * r_port)
            })?;
            return self.wrap_value(&grids.a_nrm, vals);
        }
        match self.shocks {
            ShockModel::Independent { perm, tran, risky } => {
                let pre_perm_v = self.pre_perm_value(grids, perm, tran, v_next)?;
                let vals =
                    risky.expect_on(&grids.a_nrm, |r, a| beta * pre_perm_v.eval(a * r));
                self.wrap_value(&grids.a_nrm, vals)
            }
            ShockModel::Correlated { .. } => {
                let joint = self.shocks.joint();
                let g = self.params.perm_gro_fac;
                let rho = self.params.crra;
                let vals = joint.expect_on(&grids.a_nrm, |(perm_shk, tran_shk, r), a| {
                    let perm = perm_shk * g;
                    beta * perm.powf(1.0 - rho) * v_next.eval(a * r / perm + tran_shk)
                });
                self.wrap_value(&grids.a_nrm, vals)
            }
        }
    }

    fn wrap_value(&self, grid: &[f64], vals: Vec<f64>) -> ModelResult<ValueFunc> {
        let nvrs: Vec<f64> = vals.iter().map(|&v| self.u.u_inv(v)).collect();
        let interp = LinearInterp::new(grid.to_vec(), nvrs)?;
        Ok(ValueFunc::new(Curve::Interp(interp), self.params.crra))
    }

    fn value_function(
        &self,
        stats: &PatienceStats,
        bounds: &BoundaryInfo,
        grids: &SolverGrids,
        end: &EndOfPeriod,
        egm: &EgmPoints,
    ) -> ModelResult<ValueFunc> {
        let v_next = self.next.v_func.as_ref().ok_or_else(|| {
            ModelError::Configuration(
                "value function requested but next-period solution lacks one".to_string(),
            )
        })?;
        let end_v_func = self.end_of_period_value(stats, grids, end, v_next)?;
        let p = self.params;
        let m_grid: Vec<f64> = p
            .a_xtra_grid
            .iter()
            .map(|&a| bounds.m_nrm_min + a)
            .collect();
        let mut v_nvrs = Vec::with_capacity(m_grid.len());
        for &m in &m_grid {
            let c = egm.c_func.eval(m);
            let v = self.u.u(c) + end_v_func.eval(m - c);
            v_nvrs.push(self.u.u_inv(v));
        }
        let interp = if self.u.is_log() {
            LinearInterp::new(m_grid, v_nvrs)?
        } else {
            let rho = p.crra;
            let mpc_min_nvrs = stats.mpc_min.powf(-rho / (1.0 - rho));
            LinearInterp::with_limit(
                m_grid,
                v_nvrs,
                mpc_min_nvrs * stats.h_nrm,
                mpc_min_nvrs,
            )?
        };
        Ok(ValueFunc::new(Curve::Interp(interp), p.crra))
    }

    fn share_functions(
        &self,
        bounds: &BoundaryInfo,
        grids: &SolverGrids,
        end: &EndOfPeriod,
        egm: &EgmPoints,
    ) -> ModelResult<(Option<LinearInterp>, Option<LinearInterp>)> {
        let ShareChoice::Adjustable(spec) = &self.choice else {
            return Ok((None, None));
        };
        let Some(shares) = &end.opt_share else {
            return Ok((None, None));
        };
        let limit = spec.share_limit;
        let (a_pts, s_pts) = if bounds.zero_bound {
            (prepend(0.0, &grids.a_nrm), prepend(1.0, shares))
        } else {
            (grids.a_nrm.clone(), shares.clone())
        };
        let end_share = LinearInterp::with_limit(a_pts, s_pts, limit, 0.0)?;
        let share_func = LinearInterp::with_limit(
            prepend(0.0, &egm.m_nrm),
            prepend(1.0, shares),
            limit,
            0.0,
        )?;
        Ok((Some(share_func), Some(end_share)))
    }
}

fn optimal_share_from_foc(foc: &[f64], share_grid: &[f64]) -> f64 {
    let n = foc.len();
    if foc[n - 1] > 0.0 {
        return 1.0;
    }
    if foc[0] < 0.0 {
        return share_grid[0];
    }
    for j in 0..n - 1 {
        let (bot, top) = (foc[j], foc[j + 1]);
        if bot >= 0.0 && top <= 0.0 {
            if bot - top > 0.0 {
                return share_grid[j] + (share_grid[j + 1] - share_grid[j]) * bot / (bot - top);
            }
            return share_grid[j];
        }
    }
    share_grid[n - 1]
}

fn push_strict(grid: &mut Vec<f64>, v: f64) {
    if grid.last().is_none_or(|&last| v > last) {
        grid.push(v);
    }
}

fn prepend(v: f64, rest: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(rest.len() + 1);
    out.push(v);
    out.extend_from_slice(rest);
    out
}
