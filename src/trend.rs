// Linear trend fitting over the cumulative series, and projection of that
// trend out to the target year.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregate::{current_totals, last_observed_year};
use crate::types::{Category, YearBucket};

/// First-order least-squares fit of cumulative units against year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendModel {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendModel {
    /// Ordinary least squares over `(year, value)` points. Needs at least
    /// two distinct years; otherwise the line is not defined.
    pub fn fit(points: &[(i32, f64)]) -> Option<TrendModel> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mean_x = points.iter().map(|(x, _)| *x as f64).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| *y).sum::<f64>() / n;

        // Centered sums keep precision with x values around 2000.
        let (mut sxx, mut sxy) = (0.0, 0.0);
        for (x, y) in points {
            let dx = *x as f64 - mean_x;
            sxx += dx * dx;
            sxy += dx * (y - mean_y);
        }
        if sxx <= 0.0 {
            return None;
        }
        let slope = sxy / sxx;
        Some(TrendModel {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn project(&self, year: i32) -> f64 {
        self.intercept + self.slope * year as f64
    }
}

/// Trend for one category: the fitted model if there was enough data, and
/// what the category looks like today.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub category: Category,
    pub model: Option<TrendModel>,
    pub current: f64,
    pub last_observed_year: i32,
    pub horizon_year: i32,
}

impl Projection {
    /// Cumulative value expected at the horizon. Without a model there is
    /// nothing to extrapolate, so today's value stands.
    pub fn projected_at_horizon(&self) -> f64 {
        match &self.model {
            Some(model) => model.project(self.horizon_year),
            None => self.current,
        }
    }

    /// Projected cumulative values for each year after the last observed
    /// completion through the horizon.
    pub fn future_points(&self) -> Vec<(i32, f64)> {
        let Some(model) = &self.model else {
            return Vec::new();
        };
        ((self.last_observed_year + 1)..=self.horizon_year)
            .map(|year| (year, model.project(year)))
            .collect()
    }
}

/// The `(year, cumulative)` pairs a category's fit is based on: every
/// bucket up to and including the last observed completion year. Gap years
/// inside that range carry their cumulative total forward and take part;
/// the zero-filled years after it do not.
pub fn fit_series(buckets: &[YearBucket], category: Category) -> Vec<(i32, f64)> {
    let Some(last) = last_observed_year(buckets) else {
        return Vec::new();
    };
    buckets
        .iter()
        .take_while(|b| b.year <= last)
        .map(|b| (b.year, b.cumulative.get(category) as f64))
        .collect()
}

pub fn fit_and_project(
    buckets: &[YearBucket],
    categories: &[Category],
    horizon_year: i32,
) -> BTreeMap<Category, Projection> {
    let totals = current_totals(buckets);
    let last = last_observed_year(buckets).unwrap_or(horizon_year);

    categories
        .iter()
        .map(|&category| {
            let series = fit_series(buckets, category);
            let model = TrendModel::fit(&series);
            match &model {
                Some(m) => log::debug!(
                    "{:?}: slope {:.3}/yr over {} points, {:.1} at {}",
                    category,
                    m.slope,
                    series.len(),
                    m.project(horizon_year),
                    horizon_year
                ),
                None => log::info!(
                    "{:?}: insufficient data for a trend ({} point(s))",
                    category,
                    series.len()
                ),
            }
            let projection = Projection {
                category,
                model,
                current: totals.get(category) as f64,
                last_observed_year: last,
                horizon_year,
            };
            (category, projection)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitCounts;

    fn bucket(year: i32, added_rental: u64, cum_rental: u64, observed: bool) -> YearBucket {
        YearBucket {
            year,
            added: UnitCounts::from_breakdown(added_rental, 0, 0, 0),
            cumulative: UnitCounts::from_breakdown(cum_rental, 0, 0, 0),
            observed,
        }
    }

    fn example_buckets() -> Vec<YearBucket> {
        let mut b = vec![
            bucket(2022, 10, 10, true),
            bucket(2023, 0, 10, false),
            bucket(2024, 20, 30, true),
        ];
        for year in 2025..=2030 {
            b.push(bucket(year, 0, 30, false));
        }
        b
    }

    #[test]
    fn fit_includes_interior_gaps_only() {
        let series = fit_series(&example_buckets(), Category::Rental);
        assert_eq!(series, vec![(2022, 10.0), (2023, 10.0), (2024, 30.0)]);
    }

    #[test]
    fn least_squares_matches_hand_computation() {
        let projections = fit_and_project(&example_buckets(), &[Category::Rental], 2030);
        let p = &projections[&Category::Rental];
        let m = p.model.unwrap();
        assert!((m.slope - 10.0).abs() < 1e-9);
        assert!((m.intercept - (50.0 / 3.0 - 10.0 * 2023.0)).abs() < 1e-6);
        assert!((p.projected_at_horizon() - (50.0 / 3.0 + 70.0)).abs() < 1e-6);
        assert_eq!(p.current, 30.0);

        let future = p.future_points();
        assert_eq!(future.len(), 6);
        assert_eq!(future[0].0, 2025);
        assert_eq!(future[5].0, 2030);
    }

    #[test]
    fn one_observed_year_yields_no_model() {
        let buckets = vec![bucket(2028, 40, 40, true), bucket(2029, 0, 40, false), bucket(2030, 0, 40, false)];
        let projections = fit_and_project(&buckets, &[Category::Rental, Category::Owner], 2030);
        for p in projections.values() {
            assert!(p.model.is_none());
            assert_eq!(p.projected_at_horizon(), p.current);
            assert!(p.future_points().is_empty());
        }
        assert_eq!(projections[&Category::Rental].current, 40.0);
    }

    #[test]
    fn fit_needs_two_distinct_years() {
        assert!(TrendModel::fit(&[]).is_none());
        assert!(TrendModel::fit(&[(2024, 5.0)]).is_none());
        assert!(TrendModel::fit(&[(2024, 5.0), (2024, 9.0)]).is_none());
    }

    #[test]
    fn flat_series_has_zero_slope() {
        let m = TrendModel::fit(&[(2020, 7.0), (2021, 7.0), (2022, 7.0)]).unwrap();
        assert!(m.slope.abs() < 1e-12);
        assert!((m.project(2030) - 7.0).abs() < 1e-9);
        // Backward extrapolation is defined too.
        assert!((m.project(1990) - 7.0).abs() < 1e-9);
    }
}
