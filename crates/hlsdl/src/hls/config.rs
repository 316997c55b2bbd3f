use std::path::PathBuf;
use std::time::Duration;

use crate::DownloaderConfig;

// --- Top-Level Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsConfig {
    /// Base downloader configuration
    pub base: DownloaderConfig,
    pub playlist_config: HlsPlaylistConfig,
    pub scheduler_config: HlsSchedulerConfig,
    pub fetcher_config: HlsFetcherConfig,
    pub decryption_config: HlsDecryptionConfig,
    pub output_config: HlsOutputConfig,
    pub job_retry_config: HlsJobRetryConfig,
}

// --- Playlist Configuration ---
#[derive(Debug, Clone)]
pub struct HlsPlaylistConfig {
    pub playlist_fetch_timeout: Duration,
}

impl Default for HlsPlaylistConfig {
    fn default() -> Self {
        Self {
            playlist_fetch_timeout: Duration::from_secs(15),
        }
    }
}

// --- Scheduler Configuration ---
#[derive(Debug, Clone)]
pub struct HlsSchedulerConfig {
    /// Number of long-lived download workers. Values below 1 are treated as 1.
    pub workers: usize,
}

impl Default for HlsSchedulerConfig {
    fn default() -> Self {
        Self { workers: 10 }
    }
}

impl HlsSchedulerConfig {
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

/// Which network failures a worker retries in place instead of failing the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientErrorPolicy {
    /// Connection reset by the peer
    pub connection_reset: bool,
    /// Request or body read deadline exceeded
    pub timeouts: bool,
    /// Failure to establish the connection (includes DNS resolution)
    pub connect_failures: bool,
}

impl Default for TransientErrorPolicy {
    fn default() -> Self {
        Self {
            connection_reset: true,
            timeouts: false,
            connect_failures: false,
        }
    }
}

// --- Fetcher Configuration ---
#[derive(Debug, Clone)]
pub struct HlsFetcherConfig {
    pub segment_download_timeout: Duration,
    /// Additional attempts after the first one for transient failures
    pub max_segment_retries: u32,
    /// Fixed delay between attempts
    pub segment_retry_delay: Duration,
    pub transient_errors: TransientErrorPolicy,
    pub key_download_timeout: Duration,
}

impl Default for HlsFetcherConfig {
    fn default() -> Self {
        Self {
            segment_download_timeout: Duration::from_secs(60),
            max_segment_retries: 2,
            segment_retry_delay: Duration::from_secs(1),
            transient_errors: TransientErrorPolicy::default(),
            key_download_timeout: Duration::from_secs(10),
        }
    }
}

// --- Decryption Configuration ---
#[derive(Debug, Clone)]
pub struct HlsDecryptionConfig {
    pub key_cache_ttl: Duration, // TTL for keys in the in-memory cache
    pub key_cache_capacity: u64,
}

impl Default for HlsDecryptionConfig {
    fn default() -> Self {
        Self {
            key_cache_ttl: Duration::from_secs(60 * 60),
            key_cache_capacity: 64,
        }
    }
}

// --- Output Configuration ---
#[derive(Debug, Clone)]
pub struct HlsOutputConfig {
    /// Directory that receives `<title>.ts`
    pub output_dir: PathBuf,
    /// Root for per-title segment directories. Defaults to `<output_dir>/.segments`.
    pub work_dir: Option<PathBuf>,
    /// Leave raw segment files on disk after they are joined
    pub keep_segments: bool,
}

impl Default for HlsOutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("download"),
            work_dir: None,
            keep_segments: false,
        }
    }
}

impl HlsOutputConfig {
    pub fn work_root(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join(".segments"))
    }
}

// --- Whole-job retry Configuration ---
#[derive(Debug, Clone)]
pub struct HlsJobRetryConfig {
    /// Total number of full download-and-join attempts
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for HlsJobRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_delay: Duration::from_secs(5),
        }
    }
}
