// Year aggregation: turns per-project records into a contiguous year axis
// with running totals.
use std::collections::BTreeMap;

use crate::error::DashboardError;
use crate::types::{ProjectRecord, UnitCounts, YearBucket};

/// Group records by completion year and lay them out on every year from
/// the earliest completion year through `target_year`, inclusive.
///
/// Years without completions get zero additions but still carry the
/// cumulative totals forward. Records without a year do not take part.
pub fn aggregate(
    records: &[ProjectRecord],
    target_year: i32,
) -> Result<Vec<YearBucket>, DashboardError> {
    let mut by_year: BTreeMap<i32, UnitCounts> = BTreeMap::new();
    for r in records {
        if let Some(year) = r.completion_year {
            by_year.entry(year).or_default().add(&r.units);
        }
    }

    let Some(&first_year) = by_year.keys().next() else {
        return Err(DashboardError::EmptySeries);
    };
    if first_year > target_year {
        return Err(DashboardError::EmptyYearRange {
            first_year,
            target_year,
        });
    }
    if let Some(&last) = by_year.keys().next_back() {
        if last > target_year {
            log::warn!(
                "Completions after {} (latest: {}) fall outside the year axis",
                target_year,
                last
            );
        }
    }

    let mut cumulative = UnitCounts::default();
    let buckets: Vec<YearBucket> = (first_year..=target_year)
        .map(|year| {
            let added = by_year.get(&year).copied();
            if let Some(a) = &added {
                cumulative.add(a);
            }
            YearBucket {
                year,
                added: added.unwrap_or_default(),
                cumulative,
                observed: added.is_some(),
            }
        })
        .collect();

    log::debug!(
        "Aggregated {} observed years into {} buckets ({}..={})",
        by_year.len(),
        buckets.len(),
        first_year,
        target_year
    );
    Ok(buckets)
}

/// Latest year that has at least one real completion.
pub fn last_observed_year(buckets: &[YearBucket]) -> Option<i32> {
    buckets.iter().rev().find(|b| b.observed).map(|b| b.year)
}

/// Cumulative totals at the end of the axis.
pub fn current_totals(buckets: &[YearBucket]) -> UnitCounts {
    buckets.last().map(|b| b.cumulative).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, ProjectStatus};

    fn record(year: Option<i32>, rental: u64, owner: u64) -> ProjectRecord {
        ProjectRecord {
            name: format!("p{:?}", year),
            status: ProjectStatus::Approved,
            completion_year: year,
            move_in_text: year.map(|y| y.to_string()),
            units: UnitCounts::from_breakdown(rental, 0, owner, 0),
            listed_total: None,
            lat: None,
            lon: None,
            address: None,
            market_rate_note: None,
            project_info_url: None,
            media_url: None,
            notes: None,
        }
    }

    #[test]
    fn fills_gaps_and_trailing_years() {
        let records = vec![record(Some(2022), 10, 0), record(Some(2024), 20, 0)];
        let buckets = aggregate(&records, 2030).unwrap();
        assert_eq!(buckets.len(), 9);
        let years: Vec<i32> = buckets.iter().map(|b| b.year).collect();
        assert_eq!(years, (2022..=2030).collect::<Vec<_>>());
        let cum: Vec<u64> = buckets.iter().map(|b| b.cumulative.rental).collect();
        assert_eq!(cum, vec![10, 10, 30, 30, 30, 30, 30, 30, 30]);
        assert!(buckets[0].observed);
        assert!(!buckets[1].observed);
        assert_eq!(buckets[1].added, UnitCounts::default());
        assert_eq!(last_observed_year(&buckets), Some(2024));
    }

    #[test]
    fn conserves_units_and_never_decreases() {
        let records = vec![
            record(Some(2019), 5, 1),
            record(Some(2019), 7, 0),
            record(Some(2023), 0, 9),
            record(Some(2021), 100, 4),
            record(None, 500, 500),
        ];
        let buckets = aggregate(&records, 2028).unwrap();
        for category in Category::ALL {
            let added: u64 = buckets.iter().map(|b| b.added.get(category)).sum();
            assert_eq!(buckets.last().unwrap().cumulative.get(category), added);
            for pair in buckets.windows(2) {
                assert!(pair[1].cumulative.get(category) >= pair[0].cumulative.get(category));
            }
        }
        let totals = current_totals(&buckets);
        assert_eq!(totals.rental, 112);
        assert_eq!(totals.owner, 14);
        assert_eq!(totals.total, 126);
    }

    #[test]
    fn no_dated_records_is_an_empty_series() {
        let records = vec![record(None, 10, 0)];
        assert!(matches!(
            aggregate(&records, 2030),
            Err(DashboardError::EmptySeries)
        ));
        assert!(matches!(aggregate(&[], 2030), Err(DashboardError::EmptySeries)));
    }

    #[test]
    fn first_year_after_target_is_reported() {
        let records = vec![record(Some(2032), 10, 0)];
        assert!(matches!(
            aggregate(&records, 2030),
            Err(DashboardError::EmptyYearRange {
                first_year: 2032,
                target_year: 2030
            })
        ));
    }

    #[test]
    fn completions_after_target_stay_off_the_axis() {
        let records = vec![
            record(Some(2026), 10, 1),
            record(Some(2028), 5, 0),
            record(Some(2032), 400, 40),
        ];
        let buckets = aggregate(&records, 2030).unwrap();
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets.last().unwrap().year, 2030);
        let totals = current_totals(&buckets);
        assert_eq!(totals.rental, 15);
        assert_eq!(totals.owner, 1);
        assert_eq!(totals.total, 16);
        assert_eq!(last_observed_year(&buckets), Some(2028));
    }

    #[test]
    fn single_year_range_when_target_equals_first() {
        let records = vec![record(Some(2030), 3, 2)];
        let buckets = aggregate(&records, 2030).unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].cumulative.total, 5);
    }
}
