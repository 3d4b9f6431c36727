use std::path::PathBuf;

use clap::Parser;

use crate::{
    api::tibber::PriceAttributes,
    cli::{state::StateArgs, tracker::TrackerArgs},
    core::timer::ReplayTimer,
    prelude::*,
    profile::Profile,
    tables::{build_curve_table, build_start_costs_table},
};

#[derive(Parser)]
pub struct PlanArgs {
    /// Attributes of the price entity, with the `today` and `tomorrow` lists.
    #[clap(long = "prices", env = "PRICES_FILE")]
    pub prices: PathBuf,

    /// Print the full report as JSON instead of the tables.
    #[clap(long)]
    pub json: bool,

    #[clap(flatten)]
    pub tracker: TrackerArgs,

    #[clap(flatten)]
    pub state: StateArgs,
}

#[instrument(skip_all, fields(prices = %args.prices.display()))]
pub async fn plan(args: &PlanArgs) -> Result {
    let attributes = tokio::fs::read(&args.prices)
        .await
        .with_context(|| format!("failed to read `{}`", args.prices.display()))?;
    let attributes = PriceAttributes::from_attributes(
        serde_json::from_slice(&attributes).context("the prices file is not JSON")?,
    );

    let mut profile =
        Profile::load(args.tracker.settings(), args.state.store(), ReplayTimer::default()).await?;
    if profile.curve().is_empty() {
        warn!("nothing is learned yet, every start costs nothing");
    }
    profile.on_prices(&attributes);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&profile.report())?);
    } else {
        println!("{}", build_curve_table(profile.curve()));
        if let Some(plan) = profile.plan() {
            println!("{}", build_start_costs_table(plan));
        }
    }
    Ok(())
}
