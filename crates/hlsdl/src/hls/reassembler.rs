// HLS Reassembler: concatenates downloaded segments into a single transport
// stream, decrypting and realigning each one on the way.

use crate::hls::HlsDownloaderError;
use crate::hls::decryption::DecryptionService;
use crate::hls::events::ProgressReporter;
use crate::hls::segment::WorkItem;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub struct Reassembler {
    decryption: Arc<DecryptionService>,
    progress: ProgressReporter,
}

impl Reassembler {
    pub fn new(decryption: Arc<DecryptionService>, progress: ProgressReporter) -> Self {
        Self {
            decryption,
            progress,
        }
    }

    /// Write every item, in ascending sequence order, to `output_path`.
    ///
    /// Segment files are removed once their bytes are in the output unless
    /// `keep_segments` is set. Returns the number of bytes written.
    pub async fn join(
        &self,
        mut items: Vec<WorkItem>,
        output_path: &Path,
        keep_segments: bool,
    ) -> Result<u64, HlsDownloaderError> {
        items.sort_by_key(WorkItem::sequence_id);

        let mut output = tokio::fs::File::create(output_path).await?;
        let mut total_written = 0u64;

        for item in &items {
            let seq = item.sequence_id();
            let raw = tokio::fs::read(&item.path).await?;
            let raw_len = raw.len();
            let plain = self.decryption.decrypt_segment(raw, &item.segment).await?;

            output.write_all(&plain).await?;
            total_written += plain.len() as u64;
            debug!(seq, raw_len, written = plain.len(), "Segment joined");

            if !keep_segments {
                tokio::fs::remove_file(&item.path).await?;
            }
            self.progress.segment_joined();
        }

        output.flush().await?;
        info!(
            path = %output_path.display(),
            segments = items.len(),
            bytes = total_written,
            "Output written"
        );
        Ok(total_written)
    }
}
