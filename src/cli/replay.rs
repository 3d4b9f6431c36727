use std::path::PathBuf;

use clap::Parser;

use crate::{
    api::home_assistant::EntitiesHistory,
    cli::{state::StateArgs, tracker::TrackerArgs},
    core::timer::ReplayTimer,
    prelude::*,
    profile::Profile,
    tables::build_curve_table,
};

#[derive(Parser)]
pub struct ReplayArgs {
    /// Response of the Home Assistant `/api/history/period` endpoint.
    #[clap(env = "HISTORY_FILE")]
    pub history: PathBuf,

    /// Entity to pick from the history, the first one by default.
    #[clap(long, env = "POWER_ENTITY_ID")]
    pub power_entity_id: Option<String>,

    #[clap(flatten)]
    pub tracker: TrackerArgs,

    #[clap(flatten)]
    pub state: StateArgs,
}

#[instrument(skip_all, fields(path = %args.history.display()))]
pub async fn replay(args: &ReplayArgs) -> Result {
    let history = tokio::fs::read(&args.history)
        .await
        .with_context(|| format!("failed to read `{}`", args.history.display()))?;
    let samples = serde_json::from_slice::<EntitiesHistory>(&history)
        .context("failed to parse the history")?
        .into_samples(args.power_entity_id.as_deref());
    ensure!(!samples.is_empty(), "the history has no samples");
    info!(n_samples = samples.len(), "loaded the history");

    let mut profile =
        Profile::load(args.tracker.settings(), args.state.store(), ReplayTimer::default()).await?;
    profile.replay(samples).await?;
    if profile.tracker().is_running() {
        warn!(
            n_buckets = profile.tracker().current_buckets().len(),
            "the history ends in the middle of a run, which is not counted"
        );
    }
    profile.shutdown();

    println!("{}", build_curve_table(profile.curve()));
    Ok(())
}
