// HLS Segment Scheduler: fans segments out to a fixed pool of download workers
// and collects their outcomes.

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsConfig;
use crate::hls::events::ProgressReporter;
use crate::hls::fetcher::SegmentDownloader;
use crate::hls::retry::RetryPolicy;
use crate::hls::segment::{DownloadOutcome, PlaylistSegment, WorkItem};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct SegmentScheduler {
    config: Arc<HlsConfig>,
    segment_downloader: Arc<dyn SegmentDownloader>,
    progress: ProgressReporter,
}

impl SegmentScheduler {
    pub fn new(
        config: Arc<HlsConfig>,
        segment_downloader: Arc<dyn SegmentDownloader>,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            config,
            segment_downloader,
            progress,
        }
    }

    /// Download every segment into `work_dir`.
    ///
    /// Returns the work items (with their local paths) once all of them have
    /// succeeded, or the first fatal error. On error the remaining workers are
    /// told to stop but are not waited for.
    pub async fn run(
        &self,
        segments: Vec<PlaylistSegment>,
        work_dir: &Path,
        title: &str,
        parent: &CancellationToken,
    ) -> Result<Vec<WorkItem>, HlsDownloaderError> {
        let workers = self.config.scheduler_config.effective_workers();
        let total = segments.len();
        let cancel = parent.child_token();

        let items: Vec<WorkItem> = segments
            .into_iter()
            .map(|segment| WorkItem::new(segment, work_dir, title))
            .collect();

        info!(segments = total, workers, "Starting segment downloads");
        self.progress.begin_download(total);

        // Rendezvous channel: the dispatcher waits until some worker is free.
        let (work_tx, work_rx) = flume::bounded::<WorkItem>(0);
        let (result_tx, mut result_rx) = mpsc::channel::<DownloadOutcome>(workers);

        tokio::spawn(dispatch(items.clone(), work_tx, cancel.clone()));

        let policy = RetryPolicy::from_config(&self.config.fetcher_config);
        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    work_rx.clone(),
                    result_tx.clone(),
                    Arc::clone(&self.segment_downloader),
                    policy,
                    cancel.clone(),
                ))
            })
            .collect();
        // Only the workers hold senders now; the channel closes when the last one exits.
        drop(work_rx);
        drop(result_tx);

        let mut completed = 0usize;
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(completed, total, "Segment downloads cancelled");
                    return Err(HlsDownloaderError::Cancelled);
                }

                maybe_outcome = result_rx.recv() => {
                    let Some(outcome) = maybe_outcome else {
                        break;
                    };
                    match outcome.error {
                        Some(err) => {
                            error!(seq = outcome.sequence_id, error = %err, "Segment download failed, stopping all workers");
                            cancel.cancel();
                            return Err(err);
                        }
                        None => {
                            completed += 1;
                            self.progress.segment_downloaded(outcome.bytes_written);
                        }
                    }
                }
            }
        }

        for handle in handles {
            handle.await.map_err(|e| {
                HlsDownloaderError::InternalError(format!("Download worker failed: {e}"))
            })?;
        }

        if completed != total {
            return Err(HlsDownloaderError::InternalError(format!(
                "Only {completed} of {total} segments reported completion"
            )));
        }

        info!(segments = total, "All segments downloaded");
        Ok(items)
    }
}

/// Feed items in playlist order until done or cancelled.
async fn dispatch(
    items: Vec<WorkItem>,
    work_tx: flume::Sender<WorkItem>,
    cancel: CancellationToken,
) {
    for item in items {
        let seq = item.sequence_id();
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(next_seq = seq, "Dispatcher stopped by cancellation");
                return;
            }

            sent = work_tx.send_async(item) => {
                if sent.is_err() {
                    debug!(next_seq = seq, "All workers gone, dispatcher stopping");
                    return;
                }
                debug!(seq, "Segment dispatched");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    work_rx: flume::Receiver<WorkItem>,
    result_tx: mpsc::Sender<DownloadOutcome>,
    downloader: Arc<dyn SegmentDownloader>,
    policy: RetryPolicy,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            received = work_rx.recv_async() => match received {
                Ok(item) => item,
                Err(_) => break,
            },
        };

        let seq = item.sequence_id();
        let outcome = match policy
            .run(seq, &cancel, || downloader.download_segment(&item))
            .await
        {
            Ok(bytes) => DownloadOutcome::success(seq, bytes),
            Err(HlsDownloaderError::Cancelled) => break,
            Err(e) => DownloadOutcome::failure(seq, e),
        };

        let failed = !outcome.is_success();
        if result_tx.send(outcome).await.is_err() || failed {
            break;
        }
    }
    debug!(worker_id, "Download worker exiting");
}
