// Progress and deficit against the policy goals.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::Goals;
use crate::error::DashboardError;
use crate::trend::Projection;
use crate::types::{Category, UnitCounts};

/// Units that must be added each remaining year to close the current
/// deficit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "units")]
pub enum PerYearRate {
    Needed(f64),
    /// Target year is the current year or already behind us.
    HorizonPassed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalStatus {
    pub category: Category,
    pub goal: f64,
    pub current: f64,
    pub progress_pct: f64,
    /// `goal - current`; negative once the goal is exceeded.
    pub deficit: f64,
    pub projected: f64,
    /// Never negative.
    pub projected_deficit: f64,
    /// False when the projection fell back to the current value.
    pub trend_available: bool,
    pub per_year_rate: PerYearRate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalReport {
    pub rental: GoalStatus,
    pub owner: GoalStatus,
    pub total: GoalStatus,
}

impl GoalReport {
    pub fn rows(&self) -> [&GoalStatus; 3] {
        [&self.rental, &self.owner, &self.total]
    }
}

fn per_year_rate(deficit: f64, current_year: i32, target_year: i32) -> PerYearRate {
    if target_year > current_year {
        PerYearRate::Needed(deficit / f64::from(target_year - current_year))
    } else {
        PerYearRate::HorizonPassed
    }
}

fn category_status(
    category: Category,
    goal: f64,
    current: f64,
    projection: Option<&Projection>,
    current_year: i32,
    target_year: i32,
) -> Result<GoalStatus, DashboardError> {
    if goal.is_nan() || goal <= 0.0 {
        return Err(DashboardError::InvalidGoal { category, goal });
    }
    let deficit = goal - current;
    let (projected, trend_available) = match projection {
        Some(p) => (p.projected_at_horizon(), p.model.is_some()),
        None => (current, false),
    };
    // Built units don't disappear, so a goal met today stays met.
    let projected_deficit = if deficit <= 0.0 {
        0.0
    } else {
        (goal - projected).max(0.0)
    };

    Ok(GoalStatus {
        category,
        goal,
        current,
        progress_pct: current / goal * 100.0,
        deficit,
        projected,
        projected_deficit,
        trend_available,
        per_year_rate: per_year_rate(deficit, current_year, target_year),
    })
}

/// Evaluate rental and owner progress, then the combined total built from
/// the sum of both goals and both current values.
pub fn evaluate(
    current_totals: &UnitCounts,
    projections: &BTreeMap<Category, Projection>,
    goals: &Goals,
    current_year: i32,
    target_year: i32,
) -> Result<GoalReport, DashboardError> {
    let rental = category_status(
        Category::Rental,
        goals.rental,
        current_totals.rental as f64,
        projections.get(&Category::Rental),
        current_year,
        target_year,
    )?;
    let owner = category_status(
        Category::Owner,
        goals.owner,
        current_totals.owner as f64,
        projections.get(&Category::Owner),
        current_year,
        target_year,
    )?;

    let goal = rental.goal + owner.goal;
    let current = rental.current + owner.current;
    let deficit = goal - current;
    let total = GoalStatus {
        category: Category::Total,
        goal,
        current,
        progress_pct: current / goal * 100.0,
        deficit,
        projected: rental.projected + owner.projected,
        projected_deficit: rental.projected_deficit + owner.projected_deficit,
        trend_available: rental.trend_available && owner.trend_available,
        per_year_rate: per_year_rate(deficit, current_year, target_year),
    };

    Ok(GoalReport {
        rental,
        owner,
        total,
    })
}
