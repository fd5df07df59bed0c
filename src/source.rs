// Where the housing table comes from, and the short-lived cache in front
// of it.
//
// The cache is an ordinary value owned by whoever drives a session (the
// interactive menu, or a single `report` run). Its key is the source
// identifier and its lifetime is an explicit TTL; nothing is memoized
// globally.
use once_cell::unsync::OnceCell;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::DashboardError;

const USER_AGENT: &str = "housing_progress/0.1";
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl DataSource {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.starts_with("http://") || s.starts_with("https://") {
            DataSource::Url(s.to_string())
        } else {
            DataSource::File(PathBuf::from(s))
        }
    }

    /// Cache key for this source.
    pub fn id(&self) -> String {
        match self {
            DataSource::File(p) => format!("file:{}", p.display()),
            DataSource::Url(u) => format!("url:{}", u),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File(p) => write!(f, "{}", p.display()),
            DataSource::Url(u) => write!(f, "{}", u),
        }
    }
}

struct CachedTable {
    source_id: String,
    loaded_at: Instant,
    text: String,
}

pub struct TableCache {
    ttl: Duration,
    entry: Option<CachedTable>,
}

impl TableCache {
    pub fn new(ttl: Duration) -> Self {
        TableCache { ttl, entry: None }
    }

    /// Raw CSV text for `source`, fetched only when the cached copy is
    /// missing, stale, or belongs to a different source.
    pub fn get_or_fetch(
        &mut self,
        source: &DataSource,
        fetcher: &Fetcher,
    ) -> Result<&str, DashboardError> {
        self.get_or_load_with(&source.id(), Instant::now(), || fetcher.fetch(source))
    }

    /// Cached text for `source_id` as of `now`, calling `load` to replace
    /// the entry when it is missing or expired. A failed load leaves the
    /// cache empty.
    pub fn get_or_load_with<F>(
        &mut self,
        source_id: &str,
        now: Instant,
        load: F,
    ) -> Result<&str, DashboardError>
    where
        F: FnOnce() -> Result<String, DashboardError>,
    {
        if self.is_fresh(source_id, now) {
            log::debug!("Using cached table for {}", source_id);
        } else {
            self.entry = None;
            let text = load()?;
            self.entry = Some(CachedTable {
                source_id: source_id.to_string(),
                loaded_at: now,
                text,
            });
        }
        self.entry
            .as_ref()
            .map(|e| e.text.as_str())
            .ok_or(DashboardError::NoData)
    }

    pub fn invalidate(&mut self) {
        if self.entry.take().is_some() {
            log::info!("Cached housing table discarded");
        }
    }

    fn is_fresh(&self, source_id: &str, now: Instant) -> bool {
        match &self.entry {
            Some(e) => {
                e.source_id == source_id && now.saturating_duration_since(e.loaded_at) < self.ttl
            }
            None => false,
        }
    }
}

/// Reads a [`DataSource`]. The HTTP client is only built the first time a
/// URL is fetched.
#[derive(Default)]
pub struct Fetcher {
    client: OnceCell<reqwest::blocking::Client>,
}

impl Fetcher {
    pub fn fetch(&self, source: &DataSource) -> Result<String, DashboardError> {
        match source {
            DataSource::File(path) => {
                log::info!("Reading housing table from {}", path.display());
                std::fs::read_to_string(path).map_err(|e| DashboardError::io(path, e))
            }
            DataSource::Url(url) => {
                log::info!("Downloading housing table from {}", url);
                let client = self.client.get_or_try_init(|| {
                    reqwest::blocking::Client::builder()
                        .user_agent(USER_AGENT)
                        .timeout(FETCH_TIMEOUT)
                        .build()
                })?;
                let resp = client.get(url).send()?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(DashboardError::HttpStatus {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }
                Ok(resp.text()?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn parses_urls_and_paths() {
        assert_eq!(
            DataSource::parse("https://example.org/data.csv"),
            DataSource::Url("https://example.org/data.csv".to_string())
        );
        assert_eq!(
            DataSource::parse("data/housing.csv"),
            DataSource::File(PathBuf::from("data/housing.csv"))
        );
    }

    #[test]
    fn reuses_table_until_ttl_expires() {
        let mut cache = TableCache::new(Duration::from_secs(60));
        let calls = Cell::new(0);
        let loader = || {
            calls.set(calls.get() + 1);
            Ok(format!("v{}", calls.get()))
        };
        let t0 = Instant::now();

        assert_eq!(cache.get_or_load_with("a", t0, loader).unwrap(), "v1");
        assert_eq!(
            cache
                .get_or_load_with("a", t0 + Duration::from_secs(59), loader)
                .unwrap(),
            "v1"
        );
        assert_eq!(calls.get(), 1);
        assert_eq!(
            cache
                .get_or_load_with("a", t0 + Duration::from_secs(60), loader)
                .unwrap(),
            "v2"
        );
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn different_source_or_invalidation_forces_refetch() {
        let mut cache = TableCache::new(Duration::from_secs(600));
        let t0 = Instant::now();
        cache
            .get_or_load_with("a", t0, || Ok("from a".to_string()))
            .unwrap();
        assert_eq!(
            cache
                .get_or_load_with("b", t0, || Ok("from b".to_string()))
                .unwrap(),
            "from b"
        );
        cache.invalidate();
        assert_eq!(
            cache
                .get_or_load_with("b", t0, || Ok("again".to_string()))
                .unwrap(),
            "again"
        );
    }

    #[test]
    fn failed_load_keeps_nothing() {
        let mut cache = TableCache::new(Duration::from_secs(600));
        let res = cache.get_or_load_with("a", Instant::now(), || Err(DashboardError::NoData));
        assert!(res.is_err());
        assert!(cache.entry.is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut cache = TableCache::new(Duration::from_secs(600));
        let src = DataSource::parse("definitely/not/here.csv");
        assert!(matches!(
            cache.get_or_fetch(&src, &Fetcher::default()),
            Err(DashboardError::Io { .. })
        ));
    }
}
