// One full analytical pass: normalize → aggregate → fit → evaluate.
use std::collections::BTreeMap;

use crate::aggregate::{aggregate, current_totals};
use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::goals::{evaluate, GoalReport};
use crate::loader::{load_and_clean, LoadReport};
use crate::trend::{fit_and_project, Projection};
use crate::types::{Category, ProjectRecord, YearBucket};

#[derive(Debug)]
pub struct Dashboard {
    pub records: Vec<ProjectRecord>,
    pub load_report: LoadReport,
    pub buckets: Vec<YearBucket>,
    pub projections: BTreeMap<Category, Projection>,
    pub goals: GoalReport,
}

impl Dashboard {
    pub fn from_csv(text: &str, config: &DashboardConfig) -> Result<Self, DashboardError> {
        let (records, load_report) = load_and_clean(text)?;
        Self::from_records(records, load_report, config)
    }

    /// Any failure aborts the whole pass; there is no partial dashboard.
    pub fn from_records(
        records: Vec<ProjectRecord>,
        load_report: LoadReport,
        config: &DashboardConfig,
    ) -> Result<Self, DashboardError> {
        config.validate()?;
        let buckets = aggregate(&records, config.target_year)?;
        let projections = fit_and_project(&buckets, &Category::ALL, config.target_year);
        let goals = evaluate(
            &current_totals(&buckets),
            &projections,
            &config.goals,
            config.current_year,
            config.target_year,
        )?;
        Ok(Dashboard {
            records,
            load_report,
            buckets,
            projections,
            goals,
        })
    }
}
