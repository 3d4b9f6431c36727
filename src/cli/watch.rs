use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    api::{home_assistant::StateChangedEvent, tibber::PriceAttributes},
    cli::{state::StateArgs, tracker::TrackerArgs},
    core::timer::{Timer, TimerId, TokioTimer},
    prelude::*,
    profile::Profile,
    store::Store,
};

#[derive(Parser)]
pub struct WatchArgs {
    /// Power sensor of the appliance.
    #[clap(long, env = "POWER_ENTITY_ID")]
    pub power_entity_id: String,

    /// Price entity with the `today` and `tomorrow` attributes.
    #[clap(long, env = "PRICE_ENTITY_ID")]
    pub price_entity_id: Option<String>,

    #[clap(flatten)]
    pub tracker: TrackerArgs,

    #[clap(flatten)]
    pub state: StateArgs,
}

enum Event {
    Line(String),
    Cutoff(TimerId),
}

/// Follow the events until the standard input is closed.
///
/// Every change of the report is printed as a single JSON line.
#[instrument(skip_all, fields(power_entity_id = %args.power_entity_id))]
pub async fn watch(args: &WatchArgs) -> Result {
    let (timer, mut fired) = TokioTimer::new();
    let mut profile = Profile::load(args.tracker.settings(), args.state.store(), timer).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("watching…");

    loop {
        // Cutoffs go first, so that a reading cannot stretch the run past its cutoff:
        let event = tokio::select! {
            biased;
            Some(id) = fired.recv() => Event::Cutoff(id),
            line = lines.next_line() => match line.context("failed to read the standard input")? {
                Some(line) => Event::Line(line),
                None => break,
            },
        };
        let is_updated = match event {
            Event::Line(line) => on_line(&mut profile, args, &line).await?,
            Event::Cutoff(id) => profile.on_cutoff(id).await?.is_some(),
        };
        if is_updated {
            println!("{}", serde_json::to_string(&profile.report())?);
        }
    }

    profile.shutdown();
    info!("the input is closed");
    Ok(())
}

/// Route the event to the profile, returns whether the report has changed.
async fn on_line<S: Store, T: Timer>(
    profile: &mut Profile<S, T>,
    args: &WatchArgs,
    line: &str,
) -> Result<bool> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }
    let event = match serde_json::from_str::<StateChangedEvent>(line) {
        Ok(event) => event,
        Err(error) => {
            warn!("skipping the malformed event: {error:#}");
            return Ok(false);
        }
    };

    if event.entity_id == args.power_entity_id {
        let Some(new_state) = event.new_state else {
            debug!("the power entity is removed, ignoring");
            return Ok(false);
        };
        let finished = profile
            .on_power_changed(
                event.old_state.as_ref().map(|state| state.value.as_str()),
                Some(new_state.value.as_str()),
                new_state.last_updated_at,
            )
            .await?;
        Ok(finished.is_some())
    } else if args.price_entity_id.as_ref() == Some(&event.entity_id) {
        let Some(new_state) = event.new_state else {
            return Ok(false);
        };
        profile.on_prices(&PriceAttributes::from_attributes(new_state.attributes));
        Ok(true)
    } else {
        trace!(entity_id = %event.entity_id, "ignoring");
        Ok(false)
    }
}
