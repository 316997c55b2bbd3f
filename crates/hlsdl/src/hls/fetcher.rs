// HLS Segment Fetcher: one GET per call, body streamed straight to disk.

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsConfig;
use crate::hls::segment::WorkItem;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    /// Download `item.segment.uri` into `item.path`, returning the byte count.
    async fn download_segment(&self, item: &WorkItem) -> Result<u64, HlsDownloaderError>;
}

pub struct SegmentFetcher {
    http_client: Client,
    config: Arc<HlsConfig>,
}

impl SegmentFetcher {
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl SegmentDownloader for SegmentFetcher {
    /// Makes a single attempt; retrying is the scheduler's business.
    ///
    /// The destination is created (or truncated) only once a 200 response is
    /// in hand. A failure while streaming leaves the partial file behind.
    async fn download_segment(&self, item: &WorkItem) -> Result<u64, HlsDownloaderError> {
        let mut request = self.http_client.get(item.segment.uri.clone());
        let timeout = self.config.fetcher_config.segment_download_timeout;
        if !timeout.is_zero() {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(HlsDownloaderError::HttpStatus {
                url: item.segment.uri.to_string(),
                status: response.status(),
            });
        }

        let mut file = tokio::fs::File::create(&item.path).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(
            seq = item.sequence_id(),
            bytes = written,
            path = %item.path.display(),
            "Segment written"
        );
        Ok(written)
    }
}
