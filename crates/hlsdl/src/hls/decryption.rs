// HLS Decryption Service: resolves key material per segment, runs AES-128-CBC
// and realigns the plaintext on the transport-stream sync byte.

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsConfig;
use crate::hls::segment::{KeyMaterial, PlaylistSegment};
use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// First byte of every MPEG-TS packet.
pub const SYNC_BYTE: u8 = 0x47;

const AES_BLOCK_SIZE: usize = 16;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

// --- KeyFetcher Struct ---
// Fetches raw key bytes and keeps them per key URI, so segments sharing a key
// trigger a single request.
pub struct KeyFetcher {
    http_client: Client,
    config: Arc<HlsConfig>,
    keys: Cache<Url, [u8; 16]>,
}

impl KeyFetcher {
    pub fn new(http_client: Client, config: Arc<HlsConfig>) -> Self {
        let keys = Cache::builder()
            .max_capacity(config.decryption_config.key_cache_capacity)
            .time_to_live(config.decryption_config.key_cache_ttl)
            .build();
        Self {
            http_client,
            config,
            keys,
        }
    }

    pub async fn fetch_key(&self, key_uri: &Url) -> Result<[u8; 16], HlsDownloaderError> {
        self.keys
            .try_get_with(key_uri.clone(), self.fetch_key_uncached(key_uri))
            .await
            .map_err(|e| (*e).clone())
    }

    async fn fetch_key_uncached(&self, key_uri: &Url) -> Result<[u8; 16], HlsDownloaderError> {
        let mut request = self.http_client.get(key_uri.clone());
        let timeout = self.config.fetcher_config.key_download_timeout;
        if !timeout.is_zero() {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(HlsDownloaderError::HttpStatus {
                url: key_uri.to_string(),
                status: response.status(),
            });
        }

        let body = response.bytes().await?;
        debug!(uri = %key_uri, len = body.len(), "Fetched decryption key");
        <[u8; 16]>::try_from(body.as_ref()).map_err(|_| {
            HlsDownloaderError::DecryptionError(format!(
                "Key from {key_uri} has incorrect length: {} bytes (expected 16)",
                body.len()
            ))
        })
    }
}

// --- DecryptionService Struct ---
pub struct DecryptionService {
    key_fetcher: Arc<KeyFetcher>,
}

impl DecryptionService {
    pub fn new(key_fetcher: Arc<KeyFetcher>) -> Self {
        Self { key_fetcher }
    }

    /// Key and IV for `segment`, or `None` when it is not encrypted.
    pub async fn resolve_key_material(
        &self,
        segment: &PlaylistSegment,
    ) -> Result<Option<KeyMaterial>, HlsDownloaderError> {
        let Some(key_ref) = &segment.key else {
            return Ok(None);
        };

        let key = self.key_fetcher.fetch_key(&key_ref.uri).await?;
        let iv = key_ref
            .iv
            .unwrap_or_else(|| default_iv(segment.sequence_id));
        Ok(Some(KeyMaterial { key, iv }))
    }

    /// Turn the raw bytes of a downloaded segment into aligned plaintext.
    pub async fn decrypt_segment(
        &self,
        data: Vec<u8>,
        segment: &PlaylistSegment,
    ) -> Result<Vec<u8>, HlsDownloaderError> {
        let data = match self.resolve_key_material(segment).await? {
            Some(material) => decrypt_aes128_cbc(data, &material)?,
            None => data,
        };
        Ok(align_to_sync_byte(data))
    }
}

/// IV used when the key tag carries none: the sequence id as a big-endian
/// u64 in the low eight bytes.
pub fn default_iv(sequence_id: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[8..].copy_from_slice(&sequence_id.to_be_bytes());
    iv
}

/// AES-128-CBC decrypt followed by a lenient PKCS#5 strip.
pub fn decrypt_aes128_cbc(
    mut data: Vec<u8>,
    material: &KeyMaterial,
) -> Result<Vec<u8>, HlsDownloaderError> {
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(HlsDownloaderError::DecryptionError(format!(
            "Ciphertext length {} is not a multiple of the AES block size",
            data.len()
        )));
    }

    let decrypted_len = Aes128CbcDec::new((&material.key).into(), (&material.iv).into())
        .decrypt_padded_mut::<NoPadding>(&mut data)
        .map_err(|e| HlsDownloaderError::DecryptionError(format!("Decryption failed: {e}")))?
        .len();
    data.truncate(decrypted_len);

    strip_pkcs5_padding(&mut data);
    Ok(data)
}

/// Drop as many trailing bytes as the last byte says.
///
/// The padding bytes themselves are not checked. A pad value larger than
/// the buffer empties it.
pub fn strip_pkcs5_padding(data: &mut Vec<u8>) {
    if let Some(&pad) = data.last() {
        let keep = data.len().saturating_sub(pad as usize);
        data.truncate(keep);
    }
}

/// Discard everything before the first sync byte. Buffers without one are
/// returned untouched.
pub fn align_to_sync_byte(mut data: Vec<u8>) -> Vec<u8> {
    match memchr::memchr(SYNC_BYTE, &data) {
        Some(0) | None => data,
        Some(pos) => {
            data.drain(..pos);
            data
        }
    }
}
