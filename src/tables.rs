use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{curve::CurveState, optimizer::Plan, price::N_QUARTERS, slicer::BUCKET_WIDTH},
    quantity::{cost::Cost, energy::KilowattHours},
};

pub fn build_curve_table(curve: &CurveState) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec!["#", "Offset", "Mean", "Runs", "Last run"]);
    for (index, mean) in curve.mean_kwh_per_interval.iter().enumerate() {
        let offset = BUCKET_WIDTH * i32::try_from(index).unwrap_or(i32::MAX);
        let count = curve.bucket_counts.get(index).copied().unwrap_or_default();
        table.add_row(vec![
            Cell::new(index).add_attribute(Attribute::Dim),
            Cell::new(format!("+{}:{:02}", offset.num_hours(), offset.num_minutes() % 60)),
            Cell::new(mean).set_alignment(CellAlignment::Right).fg(if *mean > KilowattHours::ZERO {
                Color::Reset
            } else {
                Color::DarkGrey
            }),
            Cell::new(count).set_alignment(CellAlignment::Right).fg(if count < curve.runs {
                Color::DarkYellow
            } else {
                Color::Reset
            }),
            match curve.last_run_kwh_per_interval.get(index) {
                Some(energy) => Cell::new(energy).set_alignment(CellAlignment::Right),
                None => Cell::new("-").add_attribute(Attribute::Dim),
            },
        ]);
    }
    table
}

/// Start costs by the quarter of the day, the cheapest start of each day is highlighted.
///
/// Quarters where neither day has a feasible start are omitted.
pub fn build_start_costs_table(plan: &Plan) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec!["Start", "Today", "Tomorrow"]);
    for quarter in 0..N_QUARTERS {
        let today = plan.today.costs.get(quarter).copied().flatten();
        let tomorrow = plan.tomorrow.costs.get(quarter).copied().flatten();
        if today.is_none() && tomorrow.is_none() {
            continue;
        }
        table.add_row(vec![
            Cell::new(format!("{:02}:{:02}", quarter / 4, quarter % 4 * 15)),
            build_cost_cell(today, plan.today.best.is_some_and(|(best, _)| best == quarter)),
            build_cost_cell(tomorrow, plan.tomorrow.best.is_some_and(|(best, _)| best == quarter)),
        ]);
    }
    table
}

fn build_cost_cell(cost: Option<Cost>, is_best: bool) -> Cell {
    match cost {
        Some(cost) if is_best => Cell::new(cost)
            .set_alignment(CellAlignment::Right)
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
        Some(cost) => Cell::new(cost).set_alignment(CellAlignment::Right),
        None => Cell::new("-").set_alignment(CellAlignment::Right).add_attribute(Attribute::Dim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::optimizer::StartCosts;

    #[test]
    fn test_curve_table() {
        let curve = CurveState {
            runs: 2,
            mean_kwh_per_interval: vec![KilowattHours(0.1), KilowattHours(0.0), KilowattHours(0.3)],
            bucket_counts: vec![2, 2, 1],
            last_run_kwh_per_interval: vec![KilowattHours(0.2)],
            ..CurveState::default()
        };
        let table = build_curve_table(&curve);
        assert_eq!(table.row_count(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("+0:10"));
        assert!(rendered.contains("0.3000 kWh"));
    }

    #[test]
    fn test_start_costs_table() {
        let mut today = vec![None; N_QUARTERS];
        today[1] = Some(Cost(0.5));
        today[2] = Some(Cost(0.25));
        let plan = Plan {
            today: StartCosts { costs: today, best: Some((2, Cost(0.25))) },
            tomorrow: StartCosts { costs: vec![None; N_QUARTERS], best: None },
        };
        let table = build_start_costs_table(&plan);
        assert_eq!(table.row_count(), 2);
        assert!(table.to_string().contains("00:30"));
    }
}
