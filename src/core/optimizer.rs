use serde::Serialize;

use crate::{
    core::price::{N_QUARTERS, PriceTimeline},
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, rate::KilowattHourRate},
};

/// Number of energy buckets per quarter-hour price.
const BUCKETS_PER_QUARTER: usize = 3;

/// Cost of running the curve from every candidate start quarter.
///
/// Bucket `i` is charged at quarter `day_offset + start + i / 3`. A candidate is [`None`]
/// when its quarters are not fully covered by the prices.
pub fn start_costs(
    curve: &[KilowattHours],
    quarters: &[KilowattHourRate],
    day_offset: isize,
    n_starts: usize,
) -> Vec<Option<Cost>> {
    if curve.is_empty() {
        return vec![Some(Cost::ZERO); n_starts];
    }
    let n_required = curve.len().div_ceil(BUCKETS_PER_QUARTER);
    (0..n_starts)
        .map(|start| {
            let base = day_offset.checked_add_unsigned(start)?;
            let base = usize::try_from(base).ok()?;
            let window = quarters.get(base..base.checked_add(n_required)?)?;
            Some(
                curve
                    .iter()
                    .enumerate()
                    .map(|(index, energy)| *energy * window[index / BUCKETS_PER_QUARTER])
                    .sum(),
            )
        })
        .collect()
}

/// Cheapest feasible candidate, the earliest one on a tie.
pub fn best_start(costs: &[Option<Cost>]) -> Option<(usize, Cost)> {
    costs.iter().enumerate().fold(None, |best, (index, cost)| match (best, cost) {
        (_, None) => best,
        (Some((_, best_cost)), Some(cost)) if *cost >= best_cost => best,
        (_, Some(cost)) => Some((index, *cost)),
    })
}

/// Start costs for a single day.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StartCosts {
    /// Indexed by the start quarter of the day.
    pub costs: Vec<Option<Cost>>,

    pub best: Option<(usize, Cost)>,
}

impl StartCosts {
    pub fn new(curve: &[KilowattHours], quarters: &[KilowattHourRate], day_offset: isize) -> Self {
        let costs = start_costs(curve, quarters, day_offset, N_QUARTERS);
        let best = best_start(&costs);
        Self { costs, best }
    }
}

/// Start costs for today and tomorrow.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub today: StartCosts,
    pub tomorrow: StartCosts,
}

impl Plan {
    #[instrument(skip_all, fields(n_buckets = curve.len()))]
    pub fn new(curve: &[KilowattHours], timeline: &PriceTimeline) -> Self {
        let quarters = timeline.concatenated();
        let this = Self {
            today: StartCosts::new(curve, &quarters, 0),
            tomorrow: StartCosts::new(curve, &quarters, N_QUARTERS.cast_signed()),
        };
        debug!(today = ?this.today.best, tomorrow = ?this.tomorrow.best, "planned");
        this
    }
}
