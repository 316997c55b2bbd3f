use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::hls::decryption::{DecryptionService, KeyFetcher};
use crate::hls::events::{DownloadProgress, DownloadStage, ProgressReporter};
use crate::hls::fetcher::SegmentFetcher;
use crate::hls::playlist::{PlaylistEngine, PlaylistProvider};
use crate::hls::reassembler::Reassembler;
use crate::hls::scheduler::SegmentScheduler;
use crate::{DownloadError, create_client, hls::HlsDownloaderError};

use super::HlsConfig;

/// Title used when the caller's title sanitises to nothing.
const FALLBACK_TITLE: &str = "output";

/// Downloads one media playlist into `<output_dir>/<title>.ts`.
pub struct HlsDownloader {
    client: Client,
    config: Arc<HlsConfig>,
    playlist: Arc<dyn PlaylistProvider>,
    scheduler: SegmentScheduler,
    reassembler: Reassembler,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl HlsDownloader {
    pub fn new(config: HlsConfig) -> Result<Self, DownloadError> {
        Self::with_config(config)
    }

    /// Create a new HlsDownloader with custom configuration
    pub fn with_config(config: HlsConfig) -> Result<Self, DownloadError> {
        let client = create_client(&config.base)?;
        let config = Arc::new(config);
        let progress = ProgressReporter::new();

        let playlist = Arc::new(PlaylistEngine::new(client.clone(), Arc::clone(&config)));
        let fetcher = Arc::new(SegmentFetcher::new(client.clone(), Arc::clone(&config)));
        let key_fetcher = Arc::new(KeyFetcher::new(client.clone(), Arc::clone(&config)));
        let decryption = Arc::new(DecryptionService::new(key_fetcher));

        Ok(Self {
            scheduler: SegmentScheduler::new(Arc::clone(&config), fetcher, progress.clone()),
            reassembler: Reassembler::new(decryption, progress.clone()),
            client,
            config,
            playlist,
            progress,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &HlsConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Live progress of the running attempt.
    pub fn subscribe_progress(&self) -> watch::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    /// Root token. Cancelling it stops the current and every later download.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Final file for `title`.
    pub fn output_path(&self, title: &str) -> PathBuf {
        self.config
            .output_config
            .output_dir
            .join(format!("{}.ts", sanitize_title(title)))
    }

    fn work_dir(&self, title: &str) -> PathBuf {
        self.config.output_config.work_root().join(title)
    }

    /// Run a single download-and-join attempt.
    pub async fn download(&self, url: &str, title: &str) -> Result<PathBuf, HlsDownloaderError> {
        let title = sanitize_title(title);
        self.run_attempt(url, &title, 1).await
    }

    /// Repeat full attempts until one succeeds, a failure is not worth
    /// retrying, or `max_attempts` is spent.
    pub async fn download_with_retry(
        &self,
        url: &str,
        title: &str,
    ) -> Result<PathBuf, DownloadError> {
        let title = sanitize_title(title);
        let retry = &self.config.job_retry_config;
        let max_attempts = retry.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let err = match self.run_attempt(url, &title, attempt).await {
                Ok(path) => return Ok(path),
                Err(e) => e,
            };

            if !err.is_retryable_attempt() {
                return Err(DownloadError::HlsError(err));
            }

            self.clear_work_dir(&title).await;

            if attempt >= max_attempts {
                error!(url, attempts = attempt, error = %err, "All download attempts failed");
                return Err(DownloadError::AttemptsExhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            warn!(
                url,
                attempt,
                max_attempts,
                error = %err,
                delay = ?retry.retry_delay,
                "Download attempt failed, retrying"
            );

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    return Err(DownloadError::HlsError(HlsDownloaderError::Cancelled));
                }

                _ = tokio::time::sleep(retry.retry_delay) => {}
            }
            attempt += 1;
        }
    }

    async fn run_attempt(
        &self,
        url: &str,
        title: &str,
        attempt: u32,
    ) -> Result<PathBuf, HlsDownloaderError> {
        info!(url, title, attempt, "Starting download attempt");
        self.progress.start_attempt(attempt);

        match self.attempt_inner(url, title).await {
            Ok(path) => {
                self.progress.set_stage(DownloadStage::Completed);
                info!(url, attempt, path = %path.display(), "Download attempt finished");
                Ok(path)
            }
            Err(e) => {
                self.progress.set_stage(DownloadStage::Failed);
                Err(e)
            }
        }
    }

    async fn attempt_inner(&self, url: &str, title: &str) -> Result<PathBuf, HlsDownloaderError> {
        if self.cancel.is_cancelled() {
            return Err(HlsDownloaderError::Cancelled);
        }

        let segments = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => return Err(HlsDownloaderError::Cancelled),
            segments = self.playlist.load_segments(url) => segments?,
        };

        let output_config = &self.config.output_config;
        let work_dir = self.work_dir(title);
        tokio::fs::create_dir_all(&work_dir).await?;
        tokio::fs::create_dir_all(&output_config.output_dir).await?;

        let items = self
            .scheduler
            .run(segments, &work_dir, title, &self.cancel)
            .await?;

        self.progress.set_stage(DownloadStage::Joining);
        let output_path = output_config.output_dir.join(format!("{title}.ts"));
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => return Err(HlsDownloaderError::Cancelled),
            joined = self.reassembler.join(items, &output_path, output_config.keep_segments) => {
                joined?;
            }
        }

        if !output_config.keep_segments {
            remove_dir_quietly(&work_dir).await;
        }
        Ok(output_path)
    }

    async fn clear_work_dir(&self, title: &str) {
        remove_dir_quietly(&self.work_dir(title)).await;
    }
}

async fn remove_dir_quietly(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dir.display(), error = %e, "Failed to remove work directory"),
    }
}

/// Make `title` safe to use as a single path component.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_TITLE.to_string()
    } else {
        cleaned.to_string()
    }
}
