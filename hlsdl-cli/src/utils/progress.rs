use hlsdl_engine::{DownloadProgress, DownloadStage};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

fn segment_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} segments")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

#[derive(Clone)]
pub struct ProgressManager {
    multi: MultiProgress,
    disabled: bool,
}

/// A bar following one URL's progress until `finish` is called.
pub struct ProgressTracker {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl ProgressManager {
    pub fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            disabled: false,
        }
    }

    pub fn new_disabled(multi: MultiProgress) -> Self {
        Self {
            multi,
            disabled: true,
        }
    }

    /// Render snapshots from `rx` under `title`. Returns `None` when disabled.
    pub fn track(
        &self,
        title: &str,
        mut rx: watch::Receiver<DownloadProgress>,
    ) -> Option<ProgressTracker> {
        if self.disabled {
            return None;
        }

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(segment_style());
        bar.set_message(title.to_string());
        bar.enable_steady_tick(Duration::from_millis(500));

        let task_bar = bar.clone();
        let title = title.to_string();
        let task = tokio::spawn(async move {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                render(&task_bar, &title, &snapshot);
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        Some(ProgressTracker { bar, task })
    }
}

impl ProgressTracker {
    pub fn finish(self, message: String) {
        self.task.abort();
        self.bar.finish_with_message(message);
    }
}

fn render(bar: &ProgressBar, title: &str, progress: &DownloadProgress) {
    let attempt = progress.attempt;
    match progress.stage {
        DownloadStage::Idle => {}
        DownloadStage::Playlist => {
            bar.set_length(0);
            bar.set_position(0);
            bar.set_message(format!("{title} (attempt {attempt}): fetching playlist"));
        }
        DownloadStage::Downloading => {
            bar.set_length(progress.total_segments as u64);
            bar.set_position(progress.downloaded_segments as u64);
            bar.set_message(format!(
                "{title} (attempt {attempt}): downloading, {} bytes",
                progress.bytes_downloaded
            ));
        }
        DownloadStage::Joining => {
            bar.set_length(progress.total_segments as u64);
            bar.set_position(progress.joined_segments as u64);
            bar.set_message(format!("{title} (attempt {attempt}): joining"));
        }
        DownloadStage::Completed => {
            bar.set_position(progress.total_segments as u64);
            bar.set_message(format!("{title}: done"));
        }
        DownloadStage::Failed => {
            bar.set_message(format!("{title} (attempt {attempt}): failed"));
        }
    }
}
