use crate::hls::HlsDownloaderError;

// Error type for the public download surface
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HLS error: {0}")]
    HlsError(#[from] HlsDownloaderError),

    #[error("Download failed after {attempts} attempt(s), last error: {source}")]
    AttemptsExhausted {
        attempts: u32,
        source: HlsDownloaderError,
    },
}

impl DownloadError {
    /// The engine error behind this failure, if there is one.
    pub fn hls_error(&self) -> Option<&HlsDownloaderError> {
        match self {
            DownloadError::HlsError(e) => Some(e),
            DownloadError::AttemptsExhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}
