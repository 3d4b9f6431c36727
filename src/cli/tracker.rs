use chrono::TimeDelta;
use clap::Parser;

use crate::{core::tracker::TrackerSettings, quantity::power::Watts};

#[derive(Copy, Clone, Parser)]
pub struct TrackerArgs {
    /// Power level in watts which separates a run from the stand-by.
    #[clap(long = "standby-watts", env = "STANDBY_WATTS", default_value = "20")]
    pub standby: Watts,

    /// How long the power has to stay below the stand-by level to finish the run.
    #[clap(long, env = "WAIT_TIME_SECS", default_value = "300")]
    pub wait_time_secs: u32,

    /// Hard cutoff of a run, `0` disables it.
    #[clap(long, env = "EXPECTED_RUNTIME_SECS", default_value = "0")]
    pub expected_runtime_secs: u32,
}

impl TrackerArgs {
    pub fn settings(self) -> TrackerSettings {
        TrackerSettings::builder()
            .standby(self.standby)
            .wait_time(TimeDelta::seconds(self.wait_time_secs.into()))
            .maybe_expected_runtime(
                (self.expected_runtime_secs != 0)
                    .then(|| TimeDelta::seconds(self.expected_runtime_secs.into())),
            )
            .build()
    }
}
