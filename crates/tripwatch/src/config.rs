//! Settings for the HTTP client and the sync engine.

use std::time::Duration;

use crate::filter::SearchField;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001";

/// Where the trip service lives and how long to wait for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// `base_url` joined with `path`, without doubled slashes
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PollMode {
    /// Refresh on every tick until torn down
    #[default]
    Continuous,
    /// Fetch once at startup; later refreshes only on request
    Once,
}

/// Which collection feeds the traffic chart
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChartSource {
    /// Trips passing the active filter
    #[default]
    Filtered,
    /// Every trip in the latest snapshot
    All,
}

impl std::str::FromStr for ChartSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "filtered" => Ok(ChartSource::Filtered),
            "all" => Ok(ChartSource::All),
            other => Err(format!("unknown chart source: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub mode: PollMode,
    pub field: SearchField,
    pub chart_source: ChartSource,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            mode: PollMode::Continuous,
            field: SearchField::Vehicle,
            chart_source: ChartSource::Filtered,
        }
    }
}

impl SyncConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_mode(mut self, mode: PollMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_field(mut self, field: SearchField) -> Self {
        self.field = field;
        self
    }

    pub fn with_chart_source(mut self, source: ChartSource) -> Self {
        self.chart_source = source;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let client = ClientConfig::default();
        assert_eq!(client.base_url, "http://127.0.0.1:5001");
        assert_eq!(client.request_timeout, Duration::from_secs(10));

        let sync = SyncConfig::default();
        assert_eq!(sync.poll_interval, Duration::from_secs(3));
        assert_eq!(sync.mode, PollMode::Continuous);
        assert_eq!(sync.chart_source, ChartSource::Filtered);
    }

    #[test]
    fn endpoint_joins_cleanly() {
        let client = ClientConfig::new("http://localhost:5001/");
        assert_eq!(client.endpoint("/api/trips"), "http://localhost:5001/api/trips");
        assert_eq!(client.endpoint("get_drivers"), "http://localhost:5001/get_drivers");
    }

    #[test]
    fn chart_source_parses() {
        assert_eq!("ALL".parse::<ChartSource>(), Ok(ChartSource::All));
        assert!("some".parse::<ChartSource>().is_err());
    }
}
