use clap::Parser;

use consav::core::{
    PeriodParams, PeriodSolution, ScalarDstn, ShareSpec, ShockModel, linspace, make_asset_grid,
    solve_one_period, solve_one_period_portfolio,
};

#[derive(Parser, Debug)]
#[command(
    about = "Solve one period of a risky-asset consumption problem from a terminal continuation"
)]
struct Args {
    #[arg(long, default_value_t = 2.0)]
    crra: f64,
    #[arg(long, default_value_t = 1.03)]
    rfree: f64,
    #[arg(long, default_value_t = 0.96)]
    disc_fac: f64,
    #[arg(long, default_value_t = 1.0)]
    liv_prb: f64,
    #[arg(long, default_value_t = 1.0)]
    perm_gro_fac: f64,
    #[arg(long, default_value_t = 1.08)]
    risky_avg: f64,
    #[arg(long, default_value_t = 0.20)]
    risky_std: f64,
    #[arg(long, default_value_t = 7)]
    risky_count: usize,
    #[arg(long, default_value_t = 48)]
    grid_count: usize,
    #[arg(long, default_value_t = 20.0)]
    grid_max: f64,
    #[arg(long, default_value_t = 25)]
    share_count: usize,
    #[arg(long)]
    portfolio: bool,
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let risky =
        ScalarDstn::lognormal_from_mean_std(args.risky_avg, args.risky_std, args.risky_count)?;
    let shocks = ShockModel::independent(
        ScalarDstn::degenerate(1.0),
        ScalarDstn::degenerate(1.0),
        risky.clone(),
    );
    let params = PeriodParams {
        liv_prb: args.liv_prb,
        disc_fac: args.disc_fac,
        crra: args.crra,
        rfree: args.rfree,
        perm_gro_fac: args.perm_gro_fac,
        boro_cnst_art: 0.0,
        a_xtra_grid: make_asset_grid(0.001, args.grid_max, args.grid_count, 3),
        vfunc_bool: false,
        cubic_bool: false,
    };
    let terminal = PeriodSolution::terminal(args.crra);
    let solution = if args.portfolio {
        let spec = ShareSpec::on_grid(&risky, args.rfree, args.crra, args.share_count)?;
        solve_one_period_portfolio(&terminal, &shocks, &params, &spec)?
    } else {
        solve_one_period(&terminal, &shocks, &params)?
    };
    let report = solution.report(&linspace(0.5, args.grid_max, 40));
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
