//! # Protocol Builders
//!
//! Fluent builder API for creating an [`HlsDownloader`] with a specific
//! configuration.

use crate::{
    DownloadError, DownloaderConfig,
    hls::{HlsDownloader, HlsConfig, TransientErrorPolicy},
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Generic protocol builder trait
pub trait ProtocolBuilder {
    /// The protocol implementation type being built
    type Protocol;

    /// Build the protocol implementation
    fn build(self) -> Result<Self::Protocol, DownloadError>;
}

/// Builder for HLS protocol handlers
pub struct HlsProtocolBuilder {
    config: HlsConfig,
}

impl HlsProtocolBuilder {
    /// Create a new HLS protocol builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HlsConfig::default(),
        }
    }

    pub fn with_base_config(mut self, base_config: DownloaderConfig) -> Self {
        self.config.base = base_config;
        self
    }

    // --- Base DownloaderConfig methods ---

    /// Set user agent for HTTP requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.base.user_agent = user_agent.into();
        self
    }

    /// Set overall HTTP timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.base.timeout = timeout;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.base.connect_timeout = timeout;
        self
    }

    /// Set whether to follow HTTP redirects
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.config.base.follow_redirects = follow;
        self
    }

    /// Replace the extra HTTP headers sent with every request
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.config.base.headers = headers;
        self
    }

    /// Add a single HTTP header. Invalid names or values are ignored.
    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            self.config.base.headers.insert(name, value);
        }
        self
    }

    /// Set whether to accept invalid TLS certificates (use with caution)
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.base.danger_accept_invalid_certs = accept;
        self
    }

    // --- HLS pipeline methods ---

    pub fn playlist_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.playlist_config.playlist_fetch_timeout = timeout;
        self
    }

    /// Number of concurrent download workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.scheduler_config.workers = workers;
        self
    }

    pub fn segment_download_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.segment_download_timeout = timeout;
        self
    }

    pub fn key_download_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.key_download_timeout = timeout;
        self
    }

    /// In-place retries per segment after a transient failure
    pub fn max_segment_retries(mut self, retries: u32) -> Self {
        self.config.fetcher_config.max_segment_retries = retries;
        self
    }

    pub fn segment_retry_delay(mut self, delay: Duration) -> Self {
        self.config.fetcher_config.segment_retry_delay = delay;
        self
    }

    /// Choose which network failures count as transient
    pub fn transient_errors(mut self, policy: TransientErrorPolicy) -> Self {
        self.config.fetcher_config.transient_errors = policy;
        self
    }

    pub fn key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.decryption_config.key_cache_ttl = ttl;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_config.output_dir = dir.into();
        self
    }

    /// Root for per-title segment directories
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_config.work_dir = Some(dir.into());
        self
    }

    pub fn keep_segments(mut self, keep: bool) -> Self {
        self.config.output_config.keep_segments = keep;
        self
    }

    /// Total number of full download attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.job_retry_config.max_attempts = attempts;
        self
    }

    /// Pause between full download attempts
    pub fn attempt_delay(mut self, delay: Duration) -> Self {
        self.config.job_retry_config.retry_delay = delay;
        self
    }

    // --- General Builder Methods ---

    /// Access the raw HLS configuration for more advanced customization.
    pub fn with_config<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut HlsConfig),
    {
        f(&mut self.config);
        self
    }

    /// Get a copy of the current HLS configuration.
    pub fn get_config(&self) -> HlsConfig {
        self.config.clone()
    }
}

impl ProtocolBuilder for HlsProtocolBuilder {
    type Protocol = HlsDownloader;

    fn build(self) -> Result<Self::Protocol, DownloadError> {
        HlsDownloader::with_config(self.config)
    }
}

impl Default for HlsProtocolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_pipeline_fields() {
        let config = HlsProtocolBuilder::new()
            .workers(4)
            .max_segment_retries(5)
            .segment_retry_delay(Duration::from_millis(250))
            .transient_errors(TransientErrorPolicy {
                connection_reset: true,
                timeouts: true,
                connect_failures: false,
            })
            .output_dir("out")
            .work_dir("/tmp/parts")
            .keep_segments(true)
            .max_attempts(3)
            .attempt_delay(Duration::from_secs(1))
            .get_config();

        assert_eq!(config.scheduler_config.workers, 4);
        assert_eq!(config.fetcher_config.max_segment_retries, 5);
        assert_eq!(
            config.fetcher_config.segment_retry_delay,
            Duration::from_millis(250)
        );
        assert!(config.fetcher_config.transient_errors.timeouts);
        assert_eq!(config.output_config.output_dir, PathBuf::from("out"));
        assert_eq!(config.output_config.work_root(), PathBuf::from("/tmp/parts"));
        assert!(config.output_config.keep_segments);
        assert_eq!(config.job_retry_config.max_attempts, 3);
    }

    #[test]
    fn test_add_header_ignores_invalid_input() {
        let config = HlsProtocolBuilder::new()
            .add_header("Referer", "https://example.com/")
            .add_header("bad header", "value")
            .get_config();

        assert_eq!(config.base.headers.get("referer").unwrap(), "https://example.com/");
        assert_eq!(
            config.base.headers.len(),
            DownloaderConfig::get_default_headers().len() + 1
        );
    }

    #[test]
    fn test_build_produces_downloader() {
        let downloader = HlsProtocolBuilder::new()
            .user_agent("hlsdl-test")
            .workers(2)
            .build()
            .unwrap();
        assert_eq!(downloader.config().scheduler_config.workers, 2);
        assert_eq!(downloader.config().base.user_agent, "hlsdl-test");
    }
}
