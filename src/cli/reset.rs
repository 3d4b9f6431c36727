use clap::Parser;

use crate::{
    cli::state::StateArgs,
    core::{timer::ReplayTimer, tracker::TrackerSettings},
    prelude::*,
    profile::Profile,
};

#[derive(Parser)]
pub struct ResetArgs {
    #[clap(flatten)]
    pub state: StateArgs,
}

#[instrument(skip_all, fields(path = %args.state.path.display()))]
pub async fn reset(args: &ResetArgs) -> Result {
    let settings = TrackerSettings::builder().build();
    let mut profile = Profile::load(settings, args.state.store(), ReplayTimer::default()).await?;
    let runs = profile.curve().runs;
    profile.reset().await?;
    info!(runs, "forgot the learned runs");
    Ok(())
}
