use std::{path::PathBuf, time::Duration};

pub const DEFAULT_ARCHIVE_URL: &str = "https://kmt.vander-lingen.nl/archive";
pub const DEFAULT_OUTPUT_FILE: &str = "reaction_database.json";

/// Knobs for one scraping run
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Index page listing the "reaction data" links
    pub archive_url: String,

    /// Process at most this many archive pages; `None` for all of them
    pub max_pages: Option<usize>,

    /// JSON file holding the dataset
    pub output_path: PathBuf,

    /// Upper bound for every wait on elements or contexts
    pub wait_timeout: Duration,

    /// Pause after scrolling a panel and after closing its detail context
    pub settle_pause: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            max_pages: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            wait_timeout: Duration::from_secs(10),
            settle_pause: Duration::from_millis(500),
        }
    }
}

impl ScrapeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archive_url(mut self, url: impl Into<String>) -> Self {
        self.archive_url = url.into();
        self
    }

    pub fn max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn settle_pause(mut self, pause: Duration) -> Self {
        self.settle_pause = pause;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScrapeConfig::default();
        assert_eq!(config.archive_url, DEFAULT_ARCHIVE_URL);
        assert_eq!(config.max_pages, None);
        assert_eq!(config.output_path, PathBuf::from("reaction_database.json"));
        assert_eq!(config.wait_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let config = ScrapeConfig::new()
            .archive_url("https://archive.test/")
            .max_pages(Some(2))
            .settle_pause(Duration::ZERO);

        assert_eq!(config.archive_url, "https://archive.test/");
        assert_eq!(config.max_pages, Some(2));
        assert_eq!(config.settle_pause, Duration::ZERO);
    }
}
