use crate::error::DashboardError;
use crate::types::{ProjectRecord, ProjectStatus, RawRow, UnitCounts, REQUIRED_COLUMNS};
use crate::util::{non_empty, parse_f64_safe, parse_units, parse_year};
use csv::ReaderBuilder;

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub parse_errors: usize,
    pub rows_without_year: usize,
    /// Units on rows with no completion year; they still count toward
    /// totals that are not keyed by year.
    pub undated_units: u64,
    /// Rows whose hand-maintained "Total units" disagrees with the sum of
    /// the unit breakdown.
    pub mismatched_totals: usize,
    pub rows_with_coords: usize,
}

/// Read the housing table and normalize every row into a [`ProjectRecord`].
///
/// Missing required columns fail the whole load. Anything wrong inside a
/// single row is a data-quality issue: numbers fall back to zero, the year
/// and coordinates fall back to unknown.
pub fn load_and_clean(text: &str) -> Result<(Vec<ProjectRecord>, LoadReport), DashboardError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DashboardError::MissingColumn {
                column: column.to_string(),
            });
        }
    }

    let mut report = LoadReport::default();
    let mut records: Vec<ProjectRecord> = Vec::new();

    for result in rdr.deserialize::<RawRow>() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping unreadable row {}: {}", report.total_rows, e);
                report.parse_errors += 1;
                continue;
            }
        };
        let record = normalize(row);

        if record.completion_year.is_none() {
            report.rows_without_year += 1;
            report.undated_units = report.undated_units.saturating_add(record.units.total);
            if parse_f64_safe(record.move_in_text.as_deref()).is_some() {
                log::warn!(
                    "'{}' has an implausible move-in year ({:?}); treating it as undated",
                    record.name,
                    record.move_in_text
                );
            } else {
                log::debug!(
                    "'{}' has no usable move-in year ({:?})",
                    record.name,
                    record.move_in_text
                );
            }
        }
        if let Some(listed) = record.listed_total {
            if listed != record.units.total {
                report.mismatched_totals += 1;
                log::warn!(
                    "'{}' lists {} total units but its breakdown sums to {}",
                    record.name,
                    listed,
                    record.units.total
                );
            }
        }
        if record.lat.is_some() && record.lon.is_some() {
            report.rows_with_coords += 1;
        }
        records.push(record);
    }

    log::info!(
        "Loaded {} projects ({} without a move-in year, {} unreadable rows)",
        records.len(),
        report.rows_without_year,
        report.parse_errors
    );
    Ok((records, report))
}

/// The data normalizer for a single row.
pub fn normalize(row: RawRow) -> ProjectRecord {
    let units = UnitCounts::from_breakdown(
        parse_units(row.market_rate_rentals.as_deref()),
        parse_units(row.affordable_rentals.as_deref()),
        parse_units(row.market_rate_owner.as_deref()),
        parse_units(row.affordable_owner.as_deref()),
    );
    let listed_total = parse_f64_safe(row.total_units.as_deref())
        .filter(|v| *v >= 0.0)
        .map(|v| v.trunc() as u64);

    let mut lat = parse_f64_safe(row.latitude.as_deref());
    let mut lon = parse_f64_safe(row.longitude.as_deref());
    if lat.is_none() || lon.is_none() {
        // A half-geocoded row can't be placed on a map.
        lat = None;
        lon = None;
    }

    ProjectRecord {
        name: non_empty(row.project).unwrap_or_else(|| "Unnamed project".to_string()),
        status: ProjectStatus::from_label(row.status.as_deref()),
        completion_year: parse_year(row.move_in_date.as_deref()),
        move_in_text: non_empty(row.move_in_date),
        units,
        listed_total,
        lat,
        lon,
        address: non_empty(row.property_address),
        market_rate_note: non_empty(row.market_rate),
        project_info_url: non_empty(row.city_project_info),
        media_url: non_empty(row.media),
        notes: non_empty(row.notes),
    }
}
