use chrono::{DateTime, TimeDelta, Utc};

use crate::quantity::{energy::KilowattHours, power::Watts};

/// Width of a single energy bucket.
pub const BUCKET_WIDTH: TimeDelta = TimeDelta::minutes(5);

/// Distribute the energy of `power` held constant over `start..end` across buckets aligned
/// to `run_start`.
///
/// An interval crossing a bucket boundary is split at the boundary. The bucket sequence
/// grows with zeros as needed. Empty or reversed intervals are ignored.
/// Time before `run_start` is attributed to the first bucket.
pub fn distribute(
    run_start: DateTime<Utc>,
    buckets: &mut Vec<KilowattHours>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    power: Watts,
) {
    if end <= start {
        return;
    }
    if start < run_start {
        distribute_segment(buckets, 0, power * (end.min(run_start) - start));
    }

    let mut cursor = start.max(run_start);
    while cursor < end {
        let index = bucket_index(cursor - run_start);
        let bucket_end = run_start + BUCKET_WIDTH * (i32::try_from(index + 1).unwrap_or(i32::MAX));
        let segment_end = bucket_end.min(end);
        distribute_segment(buckets, index, power * (segment_end - cursor));
        cursor = segment_end;
    }
}

fn bucket_index(elapsed: TimeDelta) -> usize {
    usize::try_from(elapsed.num_milliseconds() / BUCKET_WIDTH.num_milliseconds()).unwrap_or(0)
}

fn distribute_segment(buckets: &mut Vec<KilowattHours>, index: usize, energy: KilowattHours) {
    if buckets.len() <= index {
        buckets.resize(index + 1, KilowattHours::ZERO);
    }
    buckets[index] += energy;
}
