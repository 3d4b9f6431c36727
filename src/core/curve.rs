use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnError, serde_as};

use crate::{core::tracker::FinishedRun, quantity::energy::KilowattHours};

/// Schema version of the serialized [`CurveState`].
pub const VERSION: u32 = 2;

/// Average energy curve over all observed runs, plus the most recent run.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCurveState")]
pub struct CurveState {
    pub runs: u32,

    /// Running mean energy per bucket.
    pub mean_kwh_per_interval: Vec<KilowattHours>,

    /// Number of runs which reached the bucket, parallel to [`CurveState::mean_kwh_per_interval`].
    pub bucket_counts: Vec<u32>,

    pub last_run_kwh_per_interval: Vec<KilowattHours>,
    pub last_run_total_kwh: KilowattHours,
    pub last_run_duration_minutes: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CurveState {
    /// Fold the finished run into the running mean.
    ///
    /// Buckets beyond the run length keep both their mean and count.
    pub fn fold(&mut self, buckets: &[KilowattHours]) {
        if self.mean_kwh_per_interval.len() < buckets.len() {
            self.mean_kwh_per_interval.resize(buckets.len(), KilowattHours::ZERO);
        }
        if self.bucket_counts.len() < buckets.len() {
            self.bucket_counts.resize(buckets.len(), 0);
        }
        for ((mean, count), value) in
            self.mean_kwh_per_interval.iter_mut().zip(&mut self.bucket_counts).zip(buckets)
        {
            *count += 1;
            *mean += (*value - *mean) / f64::from(*count);
        }
        self.runs += 1;
    }

    /// Fold the run and remember it as the last one.
    pub fn record(&mut self, run: &FinishedRun) {
        self.fold(&run.buckets);
        self.last_run_kwh_per_interval.clone_from(&run.buckets);
        self.last_run_total_kwh = run.total;
        self.last_run_duration_minutes = run.duration_minutes;
        self.last_updated = Some(run.finished_at);
    }

    pub fn is_empty(&self) -> bool {
        self.runs == 0 && self.mean_kwh_per_interval.is_empty()
    }
}

/// Serialized form tagged with the schema version.
#[derive(Serialize)]
pub struct Versioned<'a> {
    version: u32,

    #[serde(flatten)]
    state: &'a CurveState,
}

impl<'a> From<&'a CurveState> for Versioned<'a> {
    fn from(state: &'a CurveState) -> Self {
        Self { version: VERSION, state }
    }
}

/// Lenient form of [`CurveState`]: anything missing or malformed falls back to the default.
#[serde_as]
#[derive(Deserialize)]
struct RawCurveState {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    runs: u32,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    mean_kwh_per_interval: Vec<KilowattHours>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    bucket_counts: Vec<u32>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    last_run_kwh_per_interval: Vec<KilowattHours>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    last_run_total_kwh: KilowattHours,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    last_run_duration_minutes: u32,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,

    /// Older name of `last_updated`.
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    last_updated_iso: Option<DateTime<Utc>>,
}

impl From<RawCurveState> for CurveState {
    fn from(raw: RawCurveState) -> Self {
        let n_buckets = raw.mean_kwh_per_interval.len();
        let mut bucket_counts = raw.bucket_counts;
        if bucket_counts.is_empty() {
            // Older states only tracked the total number of runs:
            bucket_counts = vec![raw.runs; n_buckets];
        } else {
            bucket_counts.resize(n_buckets, raw.runs);
        }
        Self {
            runs: raw.runs,
            mean_kwh_per_interval: raw.mean_kwh_per_interval,
            bucket_counts,
            last_run_kwh_per_interval: raw.last_run_kwh_per_interval,
            last_run_total_kwh: raw.last_run_total_kwh,
            last_run_duration_minutes: raw.last_run_duration_minutes,
            last_updated: raw.last_updated.or(raw.last_updated_iso),
        }
    }
}
