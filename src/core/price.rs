use chrono::{DateTime, FixedOffset};
use itertools::Itertools;

use crate::{prelude::*, quantity::rate::KilowattHourRate};

/// Number of quarter-hours in a day.
pub const N_QUARTERS: usize = 96;

/// Raw price point as reported by the price source.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PricePoint {
    pub starts_at: Option<DateTime<FixedOffset>>,

    /// [`None`] when the source value is missing or not a number.
    pub total: Option<KilowattHourRate>,
}

/// Sampling resolution of the price source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Resolution {
    #[display("15 min")]
    Quarterly,

    #[display("60 min")]
    Hourly,
}

impl Resolution {
    /// Infer the resolution from the distance between the first two points.
    ///
    /// Anything that cannot be inferred is considered hourly.
    pub fn infer(points: &[PricePoint]) -> Self {
        let [first, second, ..] = points else {
            return Self::Hourly;
        };
        let (Some(first), Some(second)) = (first.starts_at, second.starts_at) else {
            return Self::Hourly;
        };
        let delta = (second - first).num_seconds();
        if delta > 0 && delta <= 900 { Self::Quarterly } else { Self::Hourly }
    }

    pub const fn minutes(self) -> u32 {
        match self {
            Self::Quarterly => 15,
            Self::Hourly => 60,
        }
    }

    /// Number of quarter-hour slots covered by a single source point.
    pub fn n_quarters(self) -> usize {
        let n_quarters = (f64::from(self.minutes()) / 15.0).round();
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n_quarters = n_quarters as usize;
        n_quarters.max(1)
    }
}

/// Prices on the quarter-hour grid for today and tomorrow.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct PriceTimeline {
    /// At most [`N_QUARTERS`] entries, shorter when the source is incomplete.
    pub today: Vec<KilowattHourRate>,

    /// At most [`N_QUARTERS`] entries, empty until the next day prices are published.
    pub tomorrow: Vec<KilowattHourRate>,

    pub resolution: Resolution,
}

impl PriceTimeline {
    /// Normalize the source points into quarter-hours.
    ///
    /// The resolution is inferred from today, or from tomorrow if today is empty.
    /// Points without a price are dropped, which shifts the following ones.
    #[instrument(skip_all, fields(n_today = today.len(), n_tomorrow = tomorrow.len()))]
    pub fn build(today: &[PricePoint], tomorrow: &[PricePoint]) -> Self {
        let resolution =
            if today.is_empty() { Resolution::infer(tomorrow) } else { Resolution::infer(today) };
        let this = Self {
            today: expand(today, resolution),
            tomorrow: expand(tomorrow, resolution),
            resolution,
        };
        debug!(
            %resolution,
            n_today = this.today.len(),
            n_tomorrow = this.tomorrow.len(),
            "built the price timeline"
        );
        this
    }

    /// Today followed by tomorrow, for windows that cross midnight.
    pub fn concatenated(&self) -> Vec<KilowattHourRate> {
        self.today.iter().chain(&self.tomorrow).copied().collect()
    }
}

fn expand(points: &[PricePoint], resolution: Resolution) -> Vec<KilowattHourRate> {
    let n_dropped = points.iter().filter(|point| point.total.is_none()).count();
    if n_dropped != 0 {
        warn!(n_dropped, "dropped price points without a price");
    }
    points
        .iter()
        .filter_map(|point| point.total)
        .flat_map(|total| std::iter::repeat_n(total, resolution.n_quarters()))
        .take(N_QUARTERS)
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;

    fn points(step_minutes: i64, totals: &[Option<f64>]) -> Vec<PricePoint> {
        let start =
            FixedOffset::east_opt(3600).unwrap().with_ymd_and_hms(2026, 1, 22, 0, 0, 0).unwrap();
        totals
            .iter()
            .zip(0..)
            .map(|(total, index)| PricePoint {
                starts_at: Some(start + TimeDelta::minutes(step_minutes * index)),
                total: total.map(KilowattHourRate),
            })
            .collect()
    }

    fn hourly(n: usize) -> Vec<PricePoint> {
        #[allow(clippy::cast_precision_loss)]
        let totals = (0..n).map(|hour| Some(hour as f64 / 100.0)).collect_vec();
        points(60, &totals)
    }

    #[test]
    fn test_hourly_expands_to_quarters() {
        let timeline = PriceTimeline::build(&hourly(24), &[]);
        assert_eq!(timeline.resolution, Resolution::Hourly);
        assert_eq!(timeline.resolution.minutes(), 60);
        assert_eq!(timeline.today.len(), N_QUARTERS);
        for (index, rate) in timeline.today.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let expected = KilowattHourRate((index / 4) as f64 / 100.0);
            assert_eq!(*rate, expected);
        }
        assert!(timeline.tomorrow.is_empty());
        assert_eq!(timeline.concatenated().len(), N_QUARTERS);
    }

    #[test]
    fn test_quarterly_passes_through() {
        let totals = (0..N_QUARTERS).map(|_| Some(0.25)).collect_vec();
        let timeline = PriceTimeline::build(&points(15, &totals), &points(15, &totals));
        assert_eq!(timeline.resolution, Resolution::Quarterly);
        assert_eq!(timeline.today.len(), N_QUARTERS);
        assert_eq!(timeline.concatenated().len(), 2 * N_QUARTERS);
    }

    #[test]
    fn test_truncates_long_days() {
        let timeline = PriceTimeline::build(&hourly(25), &hourly(30));
        assert_eq!(timeline.today.len(), N_QUARTERS);
        assert_eq!(timeline.tomorrow.len(), N_QUARTERS);
    }

    #[test]
    fn test_short_days_are_not_padded() {
        let timeline = PriceTimeline::build(&hourly(23), &[]);
        assert_eq!(timeline.today.len(), 92);
    }

    #[test]
    fn test_drops_points_without_price() {
        let timeline = PriceTimeline::build(&points(60, &[Some(0.1), None, Some(0.3)]), &[]);
        assert_eq!(timeline.today.len(), 8);
        assert_eq!(timeline.today[4], KilowattHourRate(0.3));
    }

    #[test]
    fn test_infers_from_tomorrow_when_today_is_empty() {
        let timeline = PriceTimeline::build(&[], &points(15, &[Some(0.1), Some(0.2)]));
        assert_eq!(timeline.resolution, Resolution::Quarterly);
        assert_eq!(timeline.tomorrow, [KilowattHourRate(0.1), KilowattHourRate(0.2)]);
    }

    #[test]
    fn test_infer_defaults_to_hourly() {
        assert_eq!(Resolution::infer(&[]), Resolution::Hourly);
        assert_eq!(Resolution::infer(&points(15, &[Some(0.1)])), Resolution::Hourly);
        assert_eq!(Resolution::infer(&points(0, &[Some(0.1), Some(0.2)])), Resolution::Hourly);
        let unparsed = [PricePoint { starts_at: None, total: None }; 2];
        assert_eq!(Resolution::infer(&unparsed), Resolution::Hourly);
    }

    #[test]
    fn test_n_quarters() {
        assert_eq!(Resolution::Quarterly.n_quarters(), 1);
        assert_eq!(Resolution::Hourly.n_quarters(), 4);
    }
}
