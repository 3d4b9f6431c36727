use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    core::{
        curve::CurveState,
        sample::Sample,
        slicer,
        timer::{Timer, TimerId},
    },
    prelude::*,
    quantity::{energy::KilowattHours, power::Watts},
};

#[must_use]
#[derive(Copy, Clone, Debug, bon::Builder)]
pub struct TrackerSettings {
    /// A run starts when the power rises above this level, and ends after it has stayed below
    /// for [`TrackerSettings::wait_time`].
    #[builder(default = Watts(20.0))]
    pub standby: Watts,

    #[builder(default = TimeDelta::minutes(5))]
    pub wait_time: TimeDelta,

    /// Hard cutoff: a run never lasts longer than this.
    pub expected_runtime: Option<TimeDelta>,
}

/// Run which has just been completed.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct FinishedRun {
    pub buckets: Vec<KilowattHours>,
    pub total: KilowattHours,
    pub duration_minutes: u32,
    pub finished_at: DateTime<Utc>,
}

/// Run in progress.
struct Run {
    start: DateTime<Utc>,
    below_standby_since: Option<DateTime<Utc>>,
    buckets: Vec<KilowattHours>,
}

impl Run {
    const fn new(start: DateTime<Utc>) -> Self {
        Self { start, below_standby_since: None, buckets: Vec::new() }
    }
}

/// Detects runs in the power signal and accumulates their energy.
#[must_use]
pub struct RunTracker {
    settings: TrackerSettings,

    /// [`None`] while idle.
    run: Option<Run>,

    /// Last known sample, its power holds until the next one.
    last: Option<Sample>,

    /// Outstanding hard cutoff of the current run.
    cutoff: Option<TimerId>,
}

impl RunTracker {
    pub const fn new(settings: TrackerSettings) -> Self {
        Self { settings, run: None, last: None, cutoff: None }
    }

    pub const fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub const fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Start of the run in progress.
    pub fn run_start(&self) -> Option<DateTime<Utc>> {
        self.run.as_ref().map(|run| run.start)
    }

    /// Energy accumulated by the run in progress.
    pub fn current_buckets(&self) -> &[KilowattHours] {
        self.run.as_ref().map(|run| run.buckets.as_slice()).unwrap_or_default()
    }

    /// Hard cutoff, if enabled.
    fn expected_runtime(&self) -> Option<TimeDelta> {
        self.settings.expected_runtime.filter(|runtime| *runtime > TimeDelta::zero())
    }

    /// Moment at which the run in progress gets cut off.
    fn cutoff_at(&self) -> Option<DateTime<Utc>> {
        self.run.as_ref().zip(self.expected_runtime()).map(|(run, runtime)| run.start + runtime)
    }

    /// Handle the new power reading.
    ///
    /// A reading at or past the cutoff finishes the run at the cutoff first, whether the timer
    /// has fired yet or not. Returns the run if the reading has completed it.
    pub fn on_sample(
        &mut self,
        sample: Sample,
        curve: &mut CurveState,
        timer: &mut impl Timer,
    ) -> Option<FinishedRun> {
        let cut_off = match self.cutoff_at() {
            Some(cutoff_at) if sample.timestamp >= cutoff_at => {
                debug!(%cutoff_at, "the reading is past the cutoff");
                self.cut_off(curve, timer)
            }
            _ => None,
        };
        let finished = self.advance(sample, curve, timer);
        cut_off.or(finished)
    }

    fn advance(
        &mut self,
        sample: Sample,
        curve: &mut CurveState,
        timer: &mut impl Timer,
    ) -> Option<FinishedRun> {
        if let (Some(run), Some(Sample { timestamp, power: Some(power) })) =
            (&mut self.run, self.last)
        {
            slicer::distribute(run.start, &mut run.buckets, timestamp, sample.timestamp, power);
        }
        self.last = Some(sample);

        let power = sample.power?;
        let now = sample.timestamp;

        let Some(run) = &mut self.run else {
            if power > self.settings.standby {
                self.start_run(now, timer);
            }
            return None;
        };

        if power < self.settings.standby {
            let since = *run.below_standby_since.get_or_insert(now);
            if now - since >= self.settings.wait_time {
                debug!(%now, %since, "stayed below stand-by long enough");
                return Some(self.finish_run(now, curve, timer));
            }
        } else {
            run.below_standby_since = None;
        }
        None
    }

    /// Handle the fired hard cutoff timer.
    ///
    /// Fires of cancelled or stale timers are ignored.
    #[instrument(skip_all, fields(%id))]
    pub fn on_cutoff(
        &mut self,
        id: TimerId,
        curve: &mut CurveState,
        timer: &mut impl Timer,
    ) -> Option<FinishedRun> {
        if self.cutoff != Some(id) {
            debug!("stale cutoff, ignoring");
            return None;
        }
        self.cutoff = None;
        self.cut_off(curve, timer)
    }

    /// Finish the run at its cutoff, slicing the held power up to it.
    fn cut_off(&mut self, curve: &mut CurveState, timer: &mut impl Timer) -> Option<FinishedRun> {
        let cutoff_at = self.cutoff_at()?;
        let run = self.run.as_mut()?;

        if let Some(last) = &mut self.last
            && cutoff_at > last.timestamp
        {
            if let Some(power) = last.power {
                slicer::distribute(run.start, &mut run.buckets, last.timestamp, cutoff_at, power);
            }
            last.timestamp = cutoff_at;
        }

        info!(%cutoff_at, "hard cutoff");
        Some(self.finish_run(cutoff_at, curve, timer))
    }

    /// Cancel the outstanding cutoff, if any.
    pub fn shutdown(&mut self, timer: &mut impl Timer) {
        if let Some(id) = self.cutoff.take() {
            timer.cancel(id);
        }
    }

    fn start_run(&mut self, now: DateTime<Utc>, timer: &mut impl Timer) {
        info!(%now, "run started");
        self.shutdown(timer);
        self.run = Some(Run::new(now));
        if let Some(expected_runtime) = self.expected_runtime() {
            self.cutoff = Some(timer.schedule(now + expected_runtime));
        }
    }

    fn finish_run(
        &mut self,
        now: DateTime<Utc>,
        curve: &mut CurveState,
        timer: &mut impl Timer,
    ) -> FinishedRun {
        self.shutdown(timer);
        let run = self.run.take().unwrap_or_else(|| Run::new(now));
        let total = run.buckets.iter().fold(KilowattHours::ZERO, |total, energy| total + *energy);
        let duration_minutes = u32::try_from((now - run.start).num_minutes()).unwrap_or_default();
        let finished = FinishedRun { buckets: run.buckets, total, duration_minutes, finished_at: now };
        curve.record(&finished);
        info!(
            total = %finished.total,
            duration_minutes = finished.duration_minutes,
            n_buckets = finished.buckets.len(),
            runs = curve.runs,
            "run finished"
        );
        finished
    }
}
