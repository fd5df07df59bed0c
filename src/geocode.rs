//! Batch address geocoding for the housing table.
//!
//! Fills the `Latitude`/`Longitude` columns of a CSV from an address column
//! using Nominatim / OpenStreetMap. The public Nominatim instance allows
//! **1 request per second**; [`NominatimGeocoder`] enforces that spacing
//! itself. A failed lookup is retried once after a short pause, and a
//! second failure leaves the row without coordinates.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::DashboardError;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_ADDRESS_COLUMN: &str = "Property address";
const USER_AGENT: &str = "housing_progress_geocoder";
const MIN_DELAY: Duration = Duration::from_secs(1);
pub const RETRY_DELAY: Duration = Duration::from_secs(2);
const PROGRESS_EVERY: usize = 50;

/// Anything that can turn an address into `(latitude, longitude)`.
pub trait Geocoder {
    /// `Ok(None)` means the service answered but found nothing.
    fn geocode(&mut self, address: &str) -> Result<Option<(f64, f64)>, DashboardError>;
}

pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    base_url: String,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Result<Self, DashboardError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(NominatimGeocoder {
            client,
            base_url: base_url.to_string(),
            min_delay: MIN_DELAY,
            last_request: None,
        })
    }

    fn wait_for_slot(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                thread::sleep(self.min_delay - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&mut self, address: &str) -> Result<Option<(f64, f64)>, DashboardError> {
        self.wait_for_slot();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", address), ("format", "jsonv2"), ("limit", "1")])
            .send()?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DashboardError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(DashboardError::HttpStatus {
                url: self.base_url.clone(),
                status: resp.status().as_u16(),
            });
        }
        let body: serde_json::Value = resp.json()?;
        parse_response(&body)
    }
}

/// Parses a Nominatim `jsonv2` search response.
fn parse_response(body: &serde_json::Value) -> Result<Option<(f64, f64)>, DashboardError> {
    let results = body.as_array().ok_or_else(|| DashboardError::GeocodeParse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coord = |key: &str| {
        first[key]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| DashboardError::GeocodeParse {
                message: format!("missing {} in Nominatim response", key),
            })
    };
    Ok(Some((coord("lat")?, coord("lon")?)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeocodeStats {
    pub rows: usize,
    pub geocoded: usize,
    pub not_found: usize,
    pub failed: usize,
    pub skipped: usize,
}

fn lookup_with_retry<G: Geocoder>(
    geocoder: &mut G,
    row: usize,
    address: &str,
    retry_delay: Duration,
) -> Result<Option<(f64, f64)>, DashboardError> {
    match geocoder.geocode(address) {
        Ok(found) => Ok(found),
        Err(e) => {
            log::warn!("Error geocoding row {} ({}): {}", row, address, e);
            thread::sleep(retry_delay);
            geocoder.geocode(address).map_err(|e2| {
                log::warn!("  Retry failed: {}", e2);
                e2
            })
        }
    }
}

fn column_index(headers: &mut csv::StringRecord, name: &str) -> usize {
    match headers.iter().position(|h| h == name) {
        Some(i) => i,
        None => {
            headers.push_field(name);
            headers.len() - 1
        }
    }
}

/// Geocode every row of `input` and write the enriched table to `output`.
///
/// All original columns are kept; `Latitude` and `Longitude` are added or
/// overwritten. Every row starts with empty coordinates, so a row without
/// an address (or without a match) never keeps a stale position.
pub fn batch_geocode<G: Geocoder>(
    input: &Path,
    output: &Path,
    address_column: &str,
    geocoder: &mut G,
    retry_delay: Duration,
) -> Result<GeocodeStats, DashboardError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(input)?;
    let mut headers = rdr.headers()?.clone();
    let address_idx = headers
        .iter()
        .position(|h| h.trim() == address_column)
        .ok_or_else(|| DashboardError::MissingColumn {
            column: address_column.to_string(),
        })?;
    let lat_idx = column_index(&mut headers, "Latitude");
    let lon_idx = column_index(&mut headers, "Longitude");

    let rows: Vec<csv::StringRecord> = rdr.records().collect::<Result<_, _>>()?;
    let total = rows.len();
    let mut stats = GeocodeStats::default();

    let mut wtr = csv::Writer::from_path(output)?;
    wtr.write_record(&headers)?;

    for (idx, record) in rows.iter().enumerate() {
        stats.rows += 1;
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        fields.resize(headers.len(), String::new());

        fields[lat_idx].clear();
        fields[lon_idx].clear();
        let address = fields[address_idx].trim().to_string();
        if address.is_empty() {
            stats.skipped += 1;
        } else {
            match lookup_with_retry(geocoder, idx, &address, retry_delay) {
                Ok(Some((lat, lon))) => {
                    fields[lat_idx] = lat.to_string();
                    fields[lon_idx] = lon.to_string();
                    stats.geocoded += 1;
                }
                Ok(None) => {
                    log::debug!("No match for row {} ({})", idx, address);
                    stats.not_found += 1;
                }
                Err(_) => stats.failed += 1,
            }
        }
        wtr.write_record(&fields)?;

        if idx % PROGRESS_EVERY == 0 {
            log::info!("Processed {}/{} addresses", idx, total);
        }
    }
    wtr.flush().map_err(|e| DashboardError::io(output, e))?;

    log::info!(
        "Saved geocoded data for {} rows to {} ({} matched, {} not found, {} failed, {} without address)",
        stats.rows,
        output.display(),
        stats.geocoded,
        stats.not_found,
        stats.failed,
        stats.skipped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "43.0718",
            "lon": "-70.7626",
            "display_name": "1 Junkins Avenue, Portsmouth, NH, USA"
        }]);
        let (lat, lon) = parse_response(&body).unwrap().unwrap();
        assert!((lat - 43.0718).abs() < 1e-6);
        assert!((lon - -70.7626).abs() < 1e-6);
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
        assert!(parse_response(&serde_json::json!({"error": "x"})).is_err());
    }

    /// Fails a configurable number of times per address before answering.
    struct FlakyGeocoder {
        failures_left: HashMap<String, usize>,
        answers: HashMap<String, (f64, f64)>,
        calls: usize,
    }

    impl Geocoder for FlakyGeocoder {
        fn geocode(&mut self, address: &str) -> Result<Option<(f64, f64)>, DashboardError> {
            self.calls += 1;
            if let Some(n) = self.failures_left.get_mut(address) {
                if *n > 0 {
                    *n -= 1;
                    return Err(DashboardError::RateLimited);
                }
            }
            Ok(self.answers.get(address).copied())
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("housing_progress_{}_{}", std::process::id(), name))
    }

    #[test]
    fn retries_once_then_gives_up() {
        let input = temp_path("geo_in.csv");
        let output = temp_path("geo_out.csv");
        std::fs::write(
            &input,
            "Project,Property address\nA,1 Main St\nB,2 Pleasant St\nC,\nD,3 Nowhere Rd\n",
        )
        .unwrap();

        let mut geocoder = FlakyGeocoder {
            failures_left: HashMap::from([
                ("1 Main St".to_string(), 1),
                ("2 Pleasant St".to_string(), 2),
            ]),
            answers: HashMap::from([
                ("1 Main St".to_string(), (43.07, -70.76)),
                ("2 Pleasant St".to_string(), (43.08, -70.75)),
            ]),
            calls: 0,
        };

        let stats = batch_geocode(
            &input,
            &output,
            DEFAULT_ADDRESS_COLUMN,
            &mut geocoder,
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(
            stats,
            GeocodeStats {
                rows: 4,
                geocoded: 1,
                not_found: 1,
                failed: 1,
                skipped: 1,
            }
        );
        // A: fail + success, B: fail + fail, D: one miss.
        assert_eq!(geocoder.calls, 5);

        let written = std::fs::read_to_string(&output).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some("Project,Property address,Latitude,Longitude")
        );
        assert_eq!(lines.next(), Some("A,1 Main St,43.07,-70.76"));
        assert_eq!(lines.next(), Some("B,2 Pleasant St,,"));
        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn stale_coordinates_are_cleared() {
        let input = temp_path("geo_stale.csv");
        let output = temp_path("geo_stale_out.csv");
        std::fs::write(
            &input,
            "Project,Property address,Latitude,Longitude\nA,,1.5,2.5\nB,9 Elm St,3.5,4.5\n",
        )
        .unwrap();
        let mut geocoder = FlakyGeocoder {
            failures_left: HashMap::new(),
            answers: HashMap::new(),
            calls: 0,
        };
        let stats = batch_geocode(
            &input,
            &output,
            DEFAULT_ADDRESS_COLUMN,
            &mut geocoder,
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.not_found, 1);

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Project,Property address,Latitude,Longitude",
                "A,,,",
                "B,9 Elm St,,",
            ]
        );
        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn missing_address_column_is_reported() {
        let input = temp_path("geo_nocol.csv");
        let output = temp_path("geo_nocol_out.csv");
        std::fs::write(&input, "Project\nA\n").unwrap();
        let mut geocoder = FlakyGeocoder {
            failures_left: HashMap::new(),
            answers: HashMap::new(),
            calls: 0,
        };
        let res = batch_geocode(&input, &output, "Property address", &mut geocoder, Duration::ZERO);
        assert!(matches!(res, Err(DashboardError::MissingColumn { .. })));
        let _ = std::fs::remove_file(&input);
    }
}
