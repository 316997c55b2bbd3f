mod common;

use common::{TestServer, encrypt, media_playlist, misaligned, ts_payload};
use hlsdl_engine::hls::DownloadStage;
use hlsdl_engine::hls::decryption::default_iv;
use hlsdl_engine::protocol_builder::ProtocolBuilder;
use hlsdl_engine::{DownloadError, HlsDownloader, HlsDownloaderError, HlsProtocolBuilder};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;

const KEY: [u8; 16] = *b"k3y-for-testing!";

fn downloader(out: &Path, attempts: u32) -> HlsDownloader {
    HlsProtocolBuilder::new()
        .output_dir(out)
        .workers(2)
        .max_attempts(attempts)
        .attempt_delay(Duration::ZERO)
        .segment_retry_delay(Duration::ZERO)
        .build()
        .unwrap()
}

fn expected_output(count: usize) -> Vec<u8> {
    (0..count).flat_map(ts_payload).collect()
}

#[tokio::test]
async fn test_plain_playlist_is_joined_in_order() {
    let server = TestServer::new().await;
    server.serve(
        "/vod/index.m3u8",
        media_playlist(0, None, &["seg/0.ts", "seg/1.ts", "seg/2.ts"]),
    );
    for i in 0..3 {
        server.serve(&format!("/vod/seg/{i}.ts"), misaligned(&ts_payload(i)));
    }

    let out = tempfile::tempdir().unwrap();
    let downloader = downloader(out.path(), 3);
    let path = downloader
        .download_with_retry(&server.url("/vod/index.m3u8"), "clip")
        .await
        .unwrap();

    assert_eq!(path, out.path().join("clip.ts"));
    assert_eq!(tokio::fs::read(&path).await.unwrap(), expected_output(3));
    assert!(!out.path().join(".segments").join("clip").exists());

    let progress = downloader.subscribe_progress().borrow().clone();
    assert_eq!(progress.stage, DownloadStage::Completed);
    assert_eq!(progress.attempt, 1);
    assert_eq!(progress.total_segments, 3);
    assert_eq!(progress.downloaded_segments, 3);
    assert_eq!(progress.joined_segments, 3);
}

#[tokio::test]
async fn test_shared_key_is_fetched_once() {
    let server = TestServer::new().await;
    let iv: [u8; 16] = std::array::from_fn(|i| i as u8 * 3);
    let key_line = format!(
        "#EXT-X-KEY:METHOD=AES-128,URI=\"/keys/k1\",IV=0x{}",
        hex::encode(iv)
    );
    server.serve(
        "/enc/index.m3u8",
        media_playlist(0, Some(&key_line), &["0.ts", "1.ts", "2.ts"]),
    );
    server.serve("/keys/k1", KEY.to_vec());
    for i in 0..3 {
        server.serve(
            &format!("/enc/{i}.ts"),
            encrypt(&misaligned(&ts_payload(i)), &KEY, &iv),
        );
    }

    let out = tempfile::tempdir().unwrap();
    let path = downloader(out.path(), 1)
        .download_with_retry(&server.url("/enc/index.m3u8"), "enc")
        .await
        .unwrap();

    assert_eq!(tokio::fs::read(&path).await.unwrap(), expected_output(3));
    assert_eq!(server.get_request_count("/keys/k1"), 1);
}

#[tokio::test]
async fn test_missing_iv_is_derived_from_sequence_id() {
    let server = TestServer::new().await;
    server.serve(
        "/live/index.m3u8",
        media_playlist(
            10,
            Some("#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\""),
            &["a.ts", "b.ts"],
        ),
    );
    server.serve("/live/key.bin", KEY.to_vec());
    server.serve("/live/a.ts", encrypt(&ts_payload(0), &KEY, &default_iv(10)));
    server.serve("/live/b.ts", encrypt(&ts_payload(1), &KEY, &default_iv(11)));

    let out = tempfile::tempdir().unwrap();
    let path = downloader(out.path(), 1)
        .download(&server.url("/live/index.m3u8"), "live")
        .await
        .unwrap();

    assert_eq!(tokio::fs::read(&path).await.unwrap(), expected_output(2));
}

#[tokio::test]
async fn test_master_playlist_is_not_retried() {
    let server = TestServer::new().await;
    server.serve(
        "/master.m3u8",
        "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000\nv0.m3u8\n",
    );

    let out = tempfile::tempdir().unwrap();
    let err = downloader(out.path(), 5)
        .download_with_retry(&server.url("/master.m3u8"), "master")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DownloadError::HlsError(HlsDownloaderError::UnsupportedPlaylist(_))
    ));
    assert_eq!(server.get_request_count("/master.m3u8"), 1);
}

#[tokio::test]
async fn test_missing_segment_exhausts_attempts() {
    let server = TestServer::new().await;
    server.serve("/index.m3u8", media_playlist(0, None, &["0.ts", "1.ts"]));
    server.serve("/0.ts", ts_payload(0));
    server.serve_status("/1.ts", StatusCode::NOT_FOUND);

    let out = tempfile::tempdir().unwrap();
    let downloader = downloader(out.path(), 2);
    let err = downloader
        .download_with_retry(&server.url("/index.m3u8"), "broken")
        .await
        .unwrap_err();

    match err {
        DownloadError::AttemptsExhausted { attempts, source } => {
            assert_eq!(attempts, 2);
            assert!(matches!(
                source,
                HlsDownloaderError::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    // 404 is not transient: one request per attempt
    assert_eq!(server.get_request_count("/1.ts"), 2);
    assert_eq!(server.get_request_count("/index.m3u8"), 2);
    assert!(!out.path().join("broken.ts").exists());
    assert!(!out.path().join(".segments").join("broken").exists());
    assert_eq!(
        downloader.subscribe_progress().borrow().stage,
        DownloadStage::Failed
    );
}

#[tokio::test]
async fn test_failed_attempt_is_followed_by_fresh_attempt() {
    let server = TestServer::new().await;
    server.serve("/index.m3u8", media_playlist(0, None, &["0.ts", "1.ts"]));
    server.serve("/0.ts", ts_payload(0));
    server.serve_flaky("/1.ts", ts_payload(1), 1);

    let out = tempfile::tempdir().unwrap();
    let downloader = downloader(out.path(), 3);
    let path = downloader
        .download_with_retry(&server.url("/index.m3u8"), "flaky")
        .await
        .unwrap();

    assert_eq!(tokio::fs::read(&path).await.unwrap(), expected_output(2));
    assert_eq!(server.get_request_count("/index.m3u8"), 2);
    assert_eq!(downloader.subscribe_progress().borrow().attempt, 2);
}

#[tokio::test]
async fn test_keep_segments_leaves_raw_files() {
    let server = TestServer::new().await;
    server.serve("/index.m3u8", media_playlist(3, None, &["x.ts", "y.ts"]));
    server.serve("/x.ts", misaligned(&ts_payload(0)));
    server.serve("/y.ts", ts_payload(1));

    let out = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let downloader = HlsProtocolBuilder::new()
        .output_dir(out.path())
        .work_dir(work.path())
        .keep_segments(true)
        .build()
        .unwrap();

    let path = downloader
        .download(&server.url("/index.m3u8"), "kept")
        .await
        .unwrap();

    assert_eq!(tokio::fs::read(&path).await.unwrap(), expected_output(2));
    let segment_dir = work.path().join("kept");
    // raw bytes, junk prefix included
    assert_eq!(
        tokio::fs::read(segment_dir.join("kept_3.ts")).await.unwrap(),
        misaligned(&ts_payload(0))
    );
    assert!(segment_dir.join("kept_4.ts").exists());
}

fn encrypted_playlist(server: &TestServer) {
    server.serve(
        "/enc/index.m3u8",
        media_playlist(
            0,
            Some("#EXT-X-KEY:METHOD=AES-128,URI=\"/keys/k1\""),
            &["0.ts", "1.ts"],
        ),
    );
    for i in 0..2 {
        server.serve(
            &format!("/enc/{i}.ts"),
            encrypt(&ts_payload(i), &KEY, &default_iv(i as u64)),
        );
    }
}

#[tokio::test]
async fn test_forbidden_key_exhausts_attempts() {
    let server = TestServer::new().await;
    encrypted_playlist(&server);
    server.serve_status("/keys/k1", StatusCode::FORBIDDEN);

    let out = tempfile::tempdir().unwrap();
    let err = downloader(out.path(), 2)
        .download_with_retry(&server.url("/enc/index.m3u8"), "locked")
        .await
        .unwrap_err();

    match err {
        DownloadError::AttemptsExhausted { attempts, source } => {
            assert_eq!(attempts, 2);
            assert!(matches!(
                source,
                HlsDownloaderError::HttpStatus { status, .. } if status == StatusCode::FORBIDDEN
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    // failed key fetches are not cached across attempts
    assert_eq!(server.get_request_count("/keys/k1"), 2);
    assert!(!out.path().join(".segments").join("locked").exists());
}

#[tokio::test]
async fn test_short_key_is_a_decryption_error() {
    let server = TestServer::new().await;
    encrypted_playlist(&server);
    server.serve("/keys/k1", KEY[..15].to_vec());

    let out = tempfile::tempdir().unwrap();
    let err = downloader(out.path(), 2)
        .download_with_retry(&server.url("/enc/index.m3u8"), "short")
        .await
        .unwrap_err();

    match err {
        DownloadError::AttemptsExhausted { attempts, source } => {
            assert_eq!(attempts, 2);
            assert!(matches!(source, HlsDownloaderError::DecryptionError(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!out.path().join(".segments").join("short").exists());
}
