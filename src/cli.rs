mod plan;
mod replay;
mod reset;
mod state;
mod tracker;
mod watch;

use clap::{Parser, Subcommand};

pub use self::{plan::plan, replay::replay, reset::reset, watch::watch};
use crate::cli::{plan::PlanArgs, replay::ReplayArgs, reset::ResetArgs, watch::WatchArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Feed the recorded power history through the run tracker and update the curve.
    #[clap(name = "replay")]
    Replay(Box<ReplayArgs>),

    /// Follow `state_changed` events on the standard input, one JSON object per line.
    #[clap(name = "watch")]
    Watch(Box<WatchArgs>),

    /// Show the learned curve and the start costs for the given prices.
    #[clap(name = "plan")]
    Plan(Box<PlanArgs>),

    /// Forget all the learned runs.
    #[clap(name = "reset")]
    Reset(Box<ResetArgs>),
}
