use reqwest::StatusCode;
use std::sync::Arc;

#[derive(Debug, thiserror::Error, Clone)]
pub enum HlsDownloaderError {
    #[error("Playlist error: {0}")]
    PlaylistError(String),
    #[error("Unsupported playlist: {0}")]
    UnsupportedPlaylist(String),
    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: StatusCode },
    #[error("Decryption error: {0}")]
    DecryptionError(String),
    #[error("Network error: {source}")]
    NetworkError {
        #[from]
        source: Arc<reqwest::Error>,
    },
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: Arc<std::io::Error>,
    },
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl HlsDownloaderError {
    /// Whether a fresh whole-job attempt could plausibly get past this error.
    pub fn is_retryable_attempt(&self) -> bool {
        !matches!(
            self,
            HlsDownloaderError::UnsupportedPlaylist(_) | HlsDownloaderError::Cancelled
        )
    }
}

// Manual implementation of From<reqwest::Error> for HlsDownloaderError
// because of the Arc wrapping.
impl From<reqwest::Error> for HlsDownloaderError {
    fn from(err: reqwest::Error) -> Self {
        HlsDownloaderError::NetworkError {
            source: Arc::new(err),
        }
    }
}

impl From<std::io::Error> for HlsDownloaderError {
    fn from(err: std::io::Error) -> Self {
        HlsDownloaderError::IoError {
            source: Arc::new(err),
        }
    }
}
