use crate::aggregate::last_observed_year;
use crate::config::DashboardConfig;
use crate::goals::{GoalReport, GoalStatus, PerYearRate};
use crate::loader::LoadReport;
use crate::trend::Projection;
use crate::types::{
    Category, DashboardSummary, GoalDeficitRow, MarkerRow, ProjectRecord, ProjectStatus,
    StatusRow, TrendSummary, YearBucket, YearProgressRow,
};
use crate::util::{format_int, format_number, format_truncated};
use std::collections::{BTreeMap, HashMap};

const NOT_AVAILABLE: &str = "N/A";
const INSUFFICIENT_DATA: &str = "insufficient data";
const HORIZON_PASSED: &str = "goal horizon has passed";

/// On-track reference: a straight line from zero in the first year to the
/// goal in the target year.
pub fn goal_line(goal: f64, first_year: i32, target_year: i32, year: i32) -> f64 {
    if target_year <= first_year {
        return goal;
    }
    goal * f64::from(year - first_year) / f64::from(target_year - first_year)
}

pub fn generate_year_progress(
    buckets: &[YearBucket],
    projections: &BTreeMap<Category, Projection>,
    config: &DashboardConfig,
) -> Vec<YearProgressRow> {
    let Some(first_year) = buckets.first().map(|b| b.year) else {
        return Vec::new();
    };
    let projected = |category: Category| -> HashMap<i32, f64> {
        projections
            .get(&category)
            .map(|p| p.future_points().into_iter().collect())
            .unwrap_or_default()
    };
    let rental_proj = projected(Category::Rental);
    let owner_proj = projected(Category::Owner);
    let cell = |m: &HashMap<i32, f64>, year: i32| {
        m.get(&year)
            .map(|v| format_truncated(*v))
            .unwrap_or_default()
    };

    buckets
        .iter()
        .map(|b| YearProgressRow {
            year: b.year,
            new_rental: format_int(b.added.rental),
            new_owner: format_int(b.added.owner),
            cumulative_rental: format_int(b.cumulative.rental),
            cumulative_owner: format_int(b.cumulative.owner),
            cumulative_affordable: format_int(b.cumulative.affordable),
            cumulative_total: format_int(b.cumulative.total),
            rental_goal_line: format_truncated(goal_line(
                config.goals.rental,
                first_year,
                config.target_year,
                b.year,
            )),
            owner_goal_line: format_truncated(goal_line(
                config.goals.owner,
                first_year,
                config.target_year,
                b.year,
            )),
            projected_rental: cell(&rental_proj, b.year),
            projected_owner: cell(&owner_proj, b.year),
        })
        .collect()
}

fn deficit_row(status: &GoalStatus) -> GoalDeficitRow {
    let (projected, projected_deficit) = if status.trend_available {
        (
            format_truncated(status.projected),
            format_truncated(status.projected_deficit),
        )
    } else {
        (INSUFFICIENT_DATA.to_string(), INSUFFICIENT_DATA.to_string())
    };
    GoalDeficitRow {
        housing_type: status.category.label().to_string(),
        goal: format_truncated(status.goal),
        current_planned: format_truncated(status.current),
        progress: format!("{}%", format_number(status.progress_pct, 1)),
        current_deficit: format_truncated(status.deficit),
        projected,
        projected_deficit,
        needed_per_year: match status.per_year_rate {
            PerYearRate::Needed(units) => format_truncated(units),
            PerYearRate::HorizonPassed => HORIZON_PASSED.to_string(),
        },
    }
}

pub fn generate_goal_deficits(report: &GoalReport) -> Vec<GoalDeficitRow> {
    report.rows().into_iter().map(deficit_row).collect()
}

fn or_na(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Map marker for every project that has coordinates, coloured by whether
/// rental or owner units dominate.
pub fn generate_markers(records: &[ProjectRecord]) -> Vec<MarkerRow> {
    records
        .iter()
        .filter_map(|r| {
            let (lat, lon) = (r.lat?, r.lon?);
            let (color, dominance) = if r.units.rental > r.units.owner {
                ("blue", "Rental-dominant")
            } else if r.units.owner > r.units.rental {
                ("green", "Owner-dominant")
            } else {
                ("purple", "Mixed")
            };
            Some(MarkerRow {
                project: r.name.clone(),
                latitude: lat,
                longitude: lon,
                color: color.to_string(),
                dominance: dominance.to_string(),
                address: or_na(&r.address),
                status: r.status.to_string(),
                move_in: or_na(&r.move_in_text),
                rental_units: r.units.rental,
                owner_units: r.units.owner,
                total_units: r.units.total,
                market_rate: or_na(&r.market_rate_note),
                city_project_info: or_na(&r.project_info_url),
                media: or_na(&r.media_url),
                notes: or_na(&r.notes),
            })
        })
        .collect()
}

pub fn generate_status_breakdown(records: &[ProjectRecord]) -> Vec<StatusRow> {
    let mut map: BTreeMap<ProjectStatus, (usize, u64)> = BTreeMap::new();
    for r in records {
        let e = map.entry(r.status.clone()).or_default();
        e.0 += 1;
        e.1 += r.units.total;
    }
    map.into_iter()
        .map(|(status, (projects, units))| StatusRow {
            status: status.to_string(),
            projects,
            total_units: format_int(units),
        })
        .collect()
}

pub fn generate_summary(
    records: &[ProjectRecord],
    load_report: &LoadReport,
    buckets: &[YearBucket],
    projections: &BTreeMap<Category, Projection>,
    goal_report: &GoalReport,
    config: &DashboardConfig,
) -> DashboardSummary {
    let first_year = buckets.first().map(|b| b.year).unwrap_or(config.target_year);
    let trends = projections
        .values()
        .map(|p| TrendSummary {
            category: p.category,
            slope: p.model.map(|m| m.slope),
            intercept: p.model.map(|m| m.intercept),
            projected_at_target: p.projected_at_horizon(),
        })
        .collect();

    DashboardSummary {
        rental_goal: config.goals.rental.trunc() as u64,
        owner_goal: config.goals.owner.trunc() as u64,
        target_year: config.target_year,
        current_year: config.current_year,
        total_projects: records.len(),
        rows_without_year: load_report.rows_without_year,
        undated_units: load_report.undated_units,
        mismatched_totals: load_report.mismatched_totals,
        first_year,
        last_observed_year: last_observed_year(buckets).unwrap_or(first_year),
        goals: goal_report.rows().into_iter().cloned().collect(),
        trends,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Goals;
    use crate::goals::evaluate;
    use crate::trend::TrendModel;
    use crate::types::UnitCounts;

    fn record(name: &str, rental: u64, owner: u64, coords: Option<(f64, f64)>) -> ProjectRecord {
        ProjectRecord {
            name: name.to_string(),
            status: ProjectStatus::Permitting,
            completion_year: Some(2026),
            move_in_text: None,
            units: UnitCounts::from_breakdown(rental, 0, owner, 0),
            listed_total: None,
            lat: coords.map(|c| c.0),
            lon: coords.map(|c| c.1),
            address: Some("10 Market St".to_string()),
            market_rate_note: None,
            project_info_url: None,
            media_url: None,
            notes: None,
        }
    }

    #[test]
    fn markers_are_coloured_by_dominant_tenure() {
        let records = vec![
            record("Rentals", 30, 2, Some((43.07, -70.76))),
            record("Condos", 0, 12, Some((43.08, -70.77))),
            record("Even", 4, 4, Some((43.09, -70.78))),
            record("Nowhere", 9, 0, None),
        ];
        let markers = generate_markers(&records);
        let colors: Vec<&str> = markers.iter().map(|m| m.color.as_str()).collect();
        assert_eq!(colors, vec!["blue", "green", "purple"]);
        assert_eq!(markers[0].move_in, "N/A");
        assert_eq!(markers[0].notes, "N/A");
        assert_eq!(markers[0].address, "10 Market St");
    }

    #[test]
    fn goal_line_runs_from_zero_to_goal() {
        assert_eq!(goal_line(2700.0, 2020, 2030, 2020), 0.0);
        assert_eq!(goal_line(2700.0, 2020, 2030, 2025), 1350.0);
        assert_eq!(goal_line(2700.0, 2020, 2030, 2030), 2700.0);
        assert_eq!(goal_line(220.0, 2030, 2030, 2030), 220.0);
    }

    #[test]
    fn deficit_table_marks_missing_trends() {
        let mut projections = BTreeMap::new();
        projections.insert(
            Category::Rental,
            Projection {
                category: Category::Rental,
                model: Some(TrendModel {
                    slope: 100.0,
                    intercept: -100.0 * 2020.0,
                }),
                current: 600.0,
                last_observed_year: 2025,
                horizon_year: 2030,
            },
        );
        projections.insert(
            Category::Owner,
            Projection {
                category: Category::Owner,
                model: None,
                current: 20.0,
                last_observed_year: 2025,
                horizon_year: 2030,
            },
        );
        let totals = UnitCounts::from_breakdown(600, 0, 20, 0);
        let report = evaluate(&totals, &projections, &Goals::default(), 2030, 2030).unwrap();
        let rows = generate_goal_deficits(&report);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].projected, "1,000");
        assert_eq!(rows[0].projected_deficit, "1,700");
        assert_eq!(rows[0].progress, "22.2%");
        assert_eq!(rows[1].projected, INSUFFICIENT_DATA);
        assert_eq!(rows[2].housing_type, "Total");
        assert_eq!(rows[2].needed_per_year, HORIZON_PASSED);
    }

    #[test]
    fn status_breakdown_counts_projects_and_units() {
        let mut records = vec![record("A", 10, 0, None), record("B", 5, 5, None)];
        records[1].status = ProjectStatus::Approved;
        let rows = generate_status_breakdown(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, "Permitting");
        assert_eq!(rows[0].projects, 1);
        assert_eq!(rows[1].status, "Approved");
        assert_eq!(rows[1].total_units, "10");
    }
}
