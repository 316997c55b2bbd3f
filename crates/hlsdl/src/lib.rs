//! # hlsdl-engine
//!
//! A library for downloading a single HLS media playlist into one file.
//! Segments are fetched concurrently by a bounded worker pool, optionally
//! decrypted with AES-128-CBC, and stitched back together in sequence order.
//!
//! ## Features
//!
//! - Bounded worker pool with a shared, cancellable work queue
//! - In-place retry of transient network errors with a configurable policy
//! - AES-128-CBC decryption with per-URI key caching and default IV derivation
//! - Transport-stream sync byte realignment of every segment
//! - Whole-job retry wrapper that clears partial state between attempts

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod hls;
pub mod protocol_builder;

pub use builder::DownloaderConfigBuilder;
pub use client::create_client;
pub use config::DownloaderConfig;
pub use error::DownloadError;

// Re-export the HLS entry points
pub use hls::{
    DownloadProgress, DownloadStage, HlsConfig, HlsDownloader, HlsDownloaderError,
    TransientErrorPolicy,
};
pub use protocol_builder::HlsProtocolBuilder;
