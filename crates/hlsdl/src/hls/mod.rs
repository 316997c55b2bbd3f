// HLS media playlist download pipeline

pub mod config;
pub mod decryption;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod hls_downloader;
pub mod playlist;
pub mod reassembler;
pub mod retry;
pub mod scheduler;
pub mod segment;

// Re-exports for easier access
pub use config::{HlsConfig, TransientErrorPolicy};
pub use error::HlsDownloaderError;
pub use events::{DownloadProgress, DownloadStage};
pub use hls_downloader::HlsDownloader;
pub use segment::{DownloadOutcome, KeyMaterial, KeyReference, PlaylistSegment, WorkItem};
