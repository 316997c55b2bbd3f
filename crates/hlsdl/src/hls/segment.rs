// Segment data model shared by the playlist parser, scheduler and reassembler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::hls::HlsDownloaderError;

/// Where to get the AES-128 key for a segment, and its IV if the playlist gave one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReference {
    pub uri: Url,
    pub iv: Option<[u8; 16]>,
}

/// One entry of a media playlist, resolved to absolute URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSegment {
    pub uri: Url,
    /// Unique within a playlist and defines the final byte order
    pub sequence_id: u64,
    pub duration: f32,
    /// Shared between all segments covered by the same `#EXT-X-KEY`
    pub key: Option<Arc<KeyReference>>,
}

/// A segment together with the local file it is downloaded into.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub segment: PlaylistSegment,
    pub path: PathBuf,
}

impl WorkItem {
    pub fn new(segment: PlaylistSegment, work_dir: &Path, title: &str) -> Self {
        let path = work_dir.join(segment_file_name(title, segment.sequence_id));
        Self { segment, path }
    }

    #[inline]
    pub fn sequence_id(&self) -> u64 {
        self.segment.sequence_id
    }
}

/// Deterministic temp file name for a segment.
pub fn segment_file_name(title: &str, sequence_id: u64) -> String {
    format!("{title}_{sequence_id}.ts")
}

/// Key and IV for a single decrypt call.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub key: [u8; 16],
    pub iv: [u8; 16],
}

// Keep key bytes out of logs.
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"<redacted>")
            .field("iv", &self.iv)
            .finish()
    }
}

/// Result of one work item, emitted exactly once per item.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub sequence_id: u64,
    pub bytes_written: u64,
    pub error: Option<HlsDownloaderError>,
}

impl DownloadOutcome {
    pub fn success(sequence_id: u64, bytes_written: u64) -> Self {
        Self {
            sequence_id,
            bytes_written,
            error: None,
        }
    }

    pub fn failure(sequence_id: u64, error: HlsDownloaderError) -> Self {
        Self {
            sequence_id,
            bytes_written: 0,
            error: Some(error),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Lifecycle of a single work item inside a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Pending,
    InFlight,
    /// Waiting to re-run after the k-th transient failure
    Retrying(u32),
    Succeeded,
    Failed,
}

impl SegmentState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentState::Succeeded | SegmentState::Failed)
    }
}
