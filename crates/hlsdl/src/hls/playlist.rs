// HLS Playlist Engine: fetches a media playlist once and turns it into an
// ordered list of absolute segment descriptors.

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsConfig;
use crate::hls::segment::{KeyReference, PlaylistSegment};
use async_trait::async_trait;
use m3u8_rs::{Key, KeyMethod, MediaPlaylist, parse_playlist_res};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

#[async_trait]
pub trait PlaylistProvider: Send + Sync {
    /// Fetch and parse `url`, yielding segments in playlist order.
    async fn load_segments(&self, url: &str) -> Result<Vec<PlaylistSegment>, HlsDownloaderError>;
}

pub struct PlaylistEngine {
    http_client: Client,
    config: Arc<HlsConfig>,
}

impl PlaylistEngine {
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl PlaylistProvider for PlaylistEngine {
    async fn load_segments(&self, url: &str) -> Result<Vec<PlaylistSegment>, HlsDownloaderError> {
        let playlist_url = Url::parse(url).map_err(|e| {
            HlsDownloaderError::PlaylistError(format!("Invalid playlist URL {url}: {e}"))
        })?;

        let mut request = self.http_client.get(playlist_url.clone());
        let timeout = self.config.playlist_config.playlist_fetch_timeout;
        if !timeout.is_zero() {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(HlsDownloaderError::HttpStatus {
                url: playlist_url.to_string(),
                status: response.status(),
            });
        }
        let playlist_bytes = response.bytes().await?;
        debug!(url = %playlist_url, len = playlist_bytes.len(), "Fetched playlist");

        let segments = parse_media_playlist(&playlist_bytes, &playlist_url)?;
        info!(url = %playlist_url, segments = segments.len(), "Parsed media playlist");
        Ok(segments)
    }
}

/// Parse playlist text, rejecting anything but a media playlist.
pub fn parse_media_playlist(
    content: &[u8],
    playlist_url: &Url,
) -> Result<Vec<PlaylistSegment>, HlsDownloaderError> {
    match parse_playlist_res(content) {
        Ok(m3u8_rs::Playlist::MediaPlaylist(pl)) => segments_from_media_playlist(&pl, playlist_url),
        Ok(m3u8_rs::Playlist::MasterPlaylist(pl)) => {
            Err(HlsDownloaderError::UnsupportedPlaylist(format!(
                "{playlist_url} is a multi-variant playlist ({} variants), expected a media playlist",
                pl.variants.len()
            )))
        }
        Err(e) => Err(HlsDownloaderError::PlaylistError(format!(
            "Failed to parse playlist {playlist_url}: {e}"
        ))),
    }
}

/// Resolve URIs against the playlist URL, number segments from the media
/// sequence and carry each `#EXT-X-KEY` forward until the next one.
pub fn segments_from_media_playlist(
    playlist: &MediaPlaylist,
    playlist_url: &Url,
) -> Result<Vec<PlaylistSegment>, HlsDownloaderError> {
    if !playlist.end_list {
        warn!(url = %playlist_url, "Playlist has no EXT-X-ENDLIST, downloading the current segment list only");
    }

    let mut current_key: Option<Arc<KeyReference>> = None;
    let mut segments = Vec::with_capacity(playlist.segments.len());

    for (index, segment) in playlist.segments.iter().enumerate() {
        if let Some(key) = &segment.key {
            current_key = resolve_key(key, playlist_url)?;
        }

        let uri = playlist_url.join(&segment.uri).map_err(|e| {
            HlsDownloaderError::PlaylistError(format!(
                "Could not join {playlist_url} with segment URI {}: {e}",
                segment.uri
            ))
        })?;

        segments.push(PlaylistSegment {
            uri,
            sequence_id: playlist.media_sequence + index as u64,
            duration: segment.duration,
            key: current_key.clone(),
        });
    }

    Ok(segments)
}

fn resolve_key(
    key: &Key,
    playlist_url: &Url,
) -> Result<Option<Arc<KeyReference>>, HlsDownloaderError> {
    match &key.method {
        KeyMethod::None => Ok(None),
        KeyMethod::AES128 => {
            let raw_uri = key.uri.as_deref().ok_or_else(|| {
                HlsDownloaderError::PlaylistError("AES-128 key tag without URI".to_string())
            })?;
            let uri = playlist_url.join(raw_uri).map_err(|e| {
                HlsDownloaderError::PlaylistError(format!(
                    "Could not join {playlist_url} with key URI {raw_uri}: {e}"
                ))
            })?;
            let iv = key
                .iv
                .as_deref()
                .map(str::trim)
                .filter(|iv| !iv.is_empty())
                .map(parse_iv)
                .transpose()?;
            Ok(Some(Arc::new(KeyReference { uri, iv })))
        }
        other => Err(HlsDownloaderError::DecryptionError(format!(
            "Unsupported encryption method: {other:?}"
        ))),
    }
}

/// Decode a hexadecimal IV attribute, with or without the `0x` prefix.
pub fn parse_iv(iv_hex_str: &str) -> Result<[u8; 16], HlsDownloaderError> {
    let iv_str = iv_hex_str
        .strip_prefix("0x")
        .or_else(|| iv_hex_str.strip_prefix("0X"))
        .unwrap_or(iv_hex_str);
    let mut iv_bytes = [0u8; 16];
    hex::decode_to_slice(iv_str, &mut iv_bytes).map_err(|e| {
        HlsDownloaderError::PlaylistError(format!("Failed to parse IV '{iv_hex_str}': {e}"))
    })?;
    Ok(iv_bytes)
}
