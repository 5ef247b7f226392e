mod dist;
mod engine;
mod error;
mod interp;
mod solver;
mod types;
mod utility;

pub use dist::{
    DiscreteDistribution, ScalarDstn, ShockModel, ShockTripleDstn, combine_indep, income_process,
};
pub use engine::{solve_one_period, solve_one_period_portfolio};
pub use error::{ModelError, ModelResult};
pub use interp::{AsymptoticLimit, Curve, LinearInterp, LowerEnvelope, MargValueFunc, ValueFunc};
pub use solver::{limiting_share, minimize_bounded};
pub use types::{
    PeriodParams, PeriodSolution, PolicyPoint, ShareSpec, SolutionReport, linspace,
    make_asset_grid,
};
pub use utility::Crra;
