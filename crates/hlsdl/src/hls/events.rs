use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadStage {
    #[default]
    Idle,
    Playlist,
    Downloading,
    Joining,
    Completed,
    Failed,
}

/// Snapshot of the current attempt, published through a `watch` channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadProgress {
    pub stage: DownloadStage,
    /// 1-based index of the running whole-job attempt
    pub attempt: u32,
    pub total_segments: usize,
    pub downloaded_segments: usize,
    pub joined_segments: usize,
    pub bytes_downloaded: u64,
}

/// Publishing side. Updates never wait for readers.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: watch::Sender<DownloadProgress>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DownloadProgress::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadProgress> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> DownloadProgress {
        self.tx.borrow().clone()
    }

    pub fn start_attempt(&self, attempt: u32) {
        self.tx.send_replace(DownloadProgress {
            stage: DownloadStage::Playlist,
            attempt,
            ..Default::default()
        });
    }

    pub fn set_stage(&self, stage: DownloadStage) {
        self.tx.send_modify(|p| p.stage = stage);
    }

    pub fn begin_download(&self, total_segments: usize) {
        self.tx.send_modify(|p| {
            p.stage = DownloadStage::Downloading;
            p.total_segments = total_segments;
        });
    }

    pub fn segment_downloaded(&self, bytes: u64) {
        self.tx.send_modify(|p| {
            p.downloaded_segments += 1;
            p.bytes_downloaded += bytes;
        });
    }

    pub fn segment_joined(&self) {
        self.tx.send_modify(|p| p.joined_segments += 1);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
