use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    api::tibber::PriceAttributes,
    core::{
        curve::{CurveState, VERSION},
        optimizer::Plan,
        price::PriceTimeline,
        sample::Sample,
        slicer::BUCKET_WIDTH,
        timer::{ReplayTimer, Timer, TimerId},
        tracker::{FinishedRun, RunTracker, TrackerSettings},
    },
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours},
    store::Store,
};

/// Learned energy profile of a single appliance, tied to its store and timer.
pub struct Profile<S, T> {
    tracker: RunTracker,
    curve: CurveState,
    store: S,
    timer: T,
    prices: Option<PriceTimeline>,
    plan: Option<Plan>,
}

impl<S: Store, T: Timer> Profile<S, T> {
    #[instrument(skip_all)]
    pub async fn load(settings: TrackerSettings, store: S, timer: T) -> Result<Self> {
        let curve = store.load().await?;
        info!(runs = curve.runs, n_buckets = curve.mean_kwh_per_interval.len(), "loaded");
        Ok(Self { tracker: RunTracker::new(settings), curve, store, timer, prices: None, plan: None })
    }

    pub const fn curve(&self) -> &CurveState {
        &self.curve
    }

    pub const fn tracker(&self) -> &RunTracker {
        &self.tracker
    }

    pub const fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Handle the power entity state change.
    ///
    /// The old state is not needed, since the tracker remembers the last sample itself.
    pub async fn on_power_changed(
        &mut self,
        _old_state: Option<&str>,
        new_state: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<FinishedRun>> {
        self.on_sample(Sample::parse(timestamp, new_state)).await
    }

    pub async fn on_sample(&mut self, sample: Sample) -> Result<Option<FinishedRun>> {
        let finished = self.tracker.on_sample(sample, &mut self.curve, &mut self.timer);
        self.on_finished(finished).await
    }

    pub async fn on_cutoff(&mut self, id: TimerId) -> Result<Option<FinishedRun>> {
        let finished = self.tracker.on_cutoff(id, &mut self.curve, &mut self.timer);
        self.on_finished(finished).await
    }

    /// Replace the price timeline and recalculate the plan.
    pub fn on_prices(&mut self, attributes: &PriceAttributes) {
        self.prices = Some(attributes.to_timeline());
        self.update_plan();
    }

    /// Start over with the empty curve.
    ///
    /// The run in progress, if any, goes on and lands in the fresh curve.
    #[instrument(skip_all)]
    pub async fn reset(&mut self) -> Result {
        let curve = CurveState::default();
        self.store.save(&curve).await?;
        self.curve = curve;
        self.update_plan();
        info!(running = self.tracker.is_running(), "reset");
        Ok(())
    }

    /// Cancel the pending cutoff, the profile is not usable afterwards.
    pub fn shutdown(&mut self) {
        self.tracker.shutdown(&mut self.timer);
    }

    async fn on_finished(&mut self, finished: Option<FinishedRun>) -> Result<Option<FinishedRun>> {
        if finished.is_some() {
            self.store.save(&self.curve).await?;
            self.update_plan();
            info!(runs = self.curve.runs, "state updated");
        }
        Ok(finished)
    }

    fn update_plan(&mut self) {
        self.plan =
            self.prices.as_ref().map(|prices| Plan::new(&self.curve.mean_kwh_per_interval, prices));
    }

    #[must_use]
    pub fn report(&self) -> Report {
        let settings = self.tracker.settings();
        let today = self.plan.as_ref().map(|plan| &plan.today);
        let tomorrow = self.plan.as_ref().map(|plan| &plan.tomorrow);
        Report {
            version: VERSION,
            interval_minutes: BUCKET_WIDTH.num_minutes(),
            standby_w: settings.standby.0,
            wait_time_s: settings.wait_time.num_seconds(),
            expected_runtime_s: settings.expected_runtime.map_or(0, |runtime| runtime.num_seconds()),
            runs: self.curve.runs,
            mean_kwh_per_interval: self.curve.mean_kwh_per_interval.clone(),
            bucket_counts: self.curve.bucket_counts.clone(),
            last_run_kwh_per_interval: self.curve.last_run_kwh_per_interval.clone(),
            last_run_total_kwh: self.curve.last_run_total_kwh,
            last_run_duration_minutes: self.curve.last_run_duration_minutes,
            last_updated: self.curve.last_updated,
            running: self.tracker.is_running(),
            price_resolution_minutes: self.prices.as_ref().map(|prices| prices.resolution.minutes()),
            start_cost_today: today.map(|costs| costs.costs.clone()),
            start_cost_tomorrow: tomorrow.map(|costs| costs.costs.clone()),
            best_start_today_quarter_index: today.and_then(|costs| costs.best).map(|(index, _)| index),
            best_start_today_cost: today.and_then(|costs| costs.best).map(|(_, cost)| cost),
            best_start_tomorrow_quarter_index: tomorrow
                .and_then(|costs| costs.best)
                .map(|(index, _)| index),
            best_start_tomorrow_cost: tomorrow.and_then(|costs| costs.best).map(|(_, cost)| cost),
        }
    }
}

impl<S: Store> Profile<S, ReplayTimer> {
    /// Feed the recorded samples, firing the cutoffs which are due before each of them.
    ///
    /// Returns the number of finished runs.
    #[instrument(skip_all)]
    pub async fn replay(&mut self, samples: impl IntoIterator<Item = Sample>) -> Result<usize> {
        let mut n_finished = 0;
        let mut n_samples = 0_usize;
        for sample in samples {
            while let Some(id) = self.timer.pop_due(sample.timestamp) {
                n_finished += usize::from(self.on_cutoff(id).await?.is_some());
            }
            n_finished += usize::from(self.on_sample(sample).await?.is_some());
            n_samples += 1;
        }
        info!(
            n_samples,
            n_finished,
            running = self.tracker.is_running(),
            has_cutoff = !self.timer.is_empty(),
            "replayed"
        );
        Ok(n_finished)
    }
}

/// Everything the profile exposes to the outside world.
#[must_use]
#[derive(Debug, Serialize)]
pub struct Report {
    pub version: u32,
    pub interval_minutes: i64,
    pub standby_w: f64,
    pub wait_time_s: i64,
    pub expected_runtime_s: i64,

    pub runs: u32,
    pub mean_kwh_per_interval: Vec<KilowattHours>,
    pub bucket_counts: Vec<u32>,
    pub last_run_kwh_per_interval: Vec<KilowattHours>,
    pub last_run_total_kwh: KilowattHours,
    pub last_run_duration_minutes: u32,
    pub last_updated: Option<DateTime<Utc>>,
    pub running: bool,

    pub price_resolution_minutes: Option<u32>,
    pub start_cost_today: Option<Vec<Option<Cost>>>,
    pub start_cost_tomorrow: Option<Vec<Option<Cost>>>,
    pub best_start_today_quarter_index: Option<usize>,
    pub best_start_today_cost: Option<Cost>,
    pub best_start_tomorrow_quarter_index: Option<usize>,
    pub best_start_tomorrow_cost: Option<Cost>,
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeDelta;

    use super::*;
    use crate::{quantity::power::Watts, store::MemoryStore};

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + TimeDelta::seconds(seconds)
    }

    fn sample(seconds: i64, watts: f64) -> Sample {
        Sample::new(at(seconds), Some(Watts(watts)))
    }

    async fn profile(settings: TrackerSettings) -> Result<Profile<MemoryStore, ReplayTimer>> {
        Profile::load(settings, MemoryStore::default(), ReplayTimer::default()).await
    }

    fn prices() -> PriceAttributes {
        // language=JSON
        const ATTRIBUTES: &str = r#"
            {
                "today": [
                    {"startsAt": "2026-01-22T00:00:00+01:00", "total": 0.30},
                    {"startsAt": "2026-01-22T01:00:00+01:00", "total": 0.10},
                    {"startsAt": "2026-01-22T02:00:00+01:00", "total": 0.20}
                ]
            }
        "#;
        serde_json::from_str(ATTRIBUTES).unwrap()
    }

    #[tokio::test]
    async fn test_replay_with_cutoff() -> Result {
        let mut profile = profile(
            TrackerSettings::builder().expected_runtime(TimeDelta::seconds(300)).build(),
        )
        .await?;
        let n_finished = profile
            .replay([sample(0, 100.0), sample(100, 100.0), sample(1000, 100.0), sample(1100, 0.0)])
            .await?;
        assert_eq!(n_finished, 1);
        assert_eq!(profile.curve().runs, 1);
        assert_eq!(profile.curve().last_run_duration_minutes, 5);
        assert_abs_diff_eq!(profile.curve().last_run_total_kwh.0, 0.008_333, epsilon = 1e-6);

        // The sample after the cutoff starts a new run:
        assert!(profile.tracker().is_running());
        assert_eq!(profile.tracker().run_start(), Some(at(1000)));

        // The finished run is persisted:
        assert_eq!(profile.store.load().await?, *profile.curve());
        Ok(())
    }

    #[tokio::test]
    async fn test_power_changes() -> Result {
        let mut profile = profile(TrackerSettings::builder().build()).await?;
        assert!(profile.on_power_changed(None, Some("unknown"), at(0)).await?.is_none());
        assert!(profile.on_power_changed(Some("unknown"), Some("1200"), at(10)).await?.is_none());
        assert!(profile.on_power_changed(Some("1200"), Some("0"), at(610)).await?.is_none());
        let finished = profile.on_power_changed(Some("0"), Some("0.5"), at(910)).await?.unwrap();
        assert_eq!(finished.buckets.len(), 3);
        assert_abs_diff_eq!(finished.total.0, 0.2, epsilon = 1e-12);
        Ok(())
    }

    #[tokio::test]
    async fn test_plan_follows_curve() -> Result {
        let mut profile = profile(TrackerSettings::builder().build()).await?;
        profile.on_prices(&prices());
        let plan = profile.plan().unwrap();
        assert_eq!(plan.today.best, Some((0, Cost::ZERO)));

        profile.replay([sample(0, 3600.0), sample(600, 0.0), sample(900, 0.0)]).await?;
        let report = profile.report();
        assert_eq!(report.runs, 1);
        assert_eq!(report.price_resolution_minutes, Some(60));
        assert_eq!(report.best_start_today_quarter_index, Some(4));
        assert_abs_diff_eq!(report.best_start_today_cost.unwrap().0, 0.06, epsilon = 1e-12);
        assert_eq!(report.start_cost_today.unwrap().iter().flatten().count(), 12);
        assert!(report.start_cost_tomorrow.unwrap().iter().all(Option::is_none));
        assert_eq!(report.best_start_tomorrow_quarter_index, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_keeps_run_in_progress() -> Result {
        let mut profile = profile(TrackerSettings::builder().build()).await?;
        profile.replay([sample(0, 1000.0), sample(300, 0.0), sample(600, 0.0)]).await?;
        assert_eq!(profile.curve().runs, 1);

        profile.replay([sample(700, 1000.0), sample(1000, 1000.0)]).await?;
        profile.reset().await?;
        assert_eq!(*profile.curve(), CurveState::default());
        assert_eq!(profile.store.load().await?, CurveState::default());
        assert!(profile.tracker().is_running());

        profile.replay([sample(1300, 0.0), sample(1600, 0.0)]).await?;
        assert_eq!(profile.curve().runs, 1);
        assert_eq!(profile.curve().mean_kwh_per_interval.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_report_without_prices() -> Result {
        let profile = profile(TrackerSettings::builder().build()).await?;
        let report = profile.report();
        assert_eq!(report.version, 2);
        assert_eq!(report.interval_minutes, 5);
        assert_eq!(report.price_resolution_minutes, None);
        assert!(report.start_cost_today.is_none());
        let json = serde_json::to_value(&report)?;
        assert_eq!(json["standby_w"], 20.0);
        assert_eq!(json["best_start_today_cost"], serde_json::Value::Null);
        Ok(())
    }
}
