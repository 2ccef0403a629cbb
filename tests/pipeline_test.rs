//! End-to-end tests of fetch, classify, acquire and store against a mock server.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reddit_archiver::archive::{ArchiveOptions, Archiver, ProcessOutcome};
use reddit_archiver::classify::MediaKind;
use reddit_archiver::config::Config;
use reddit_archiver::error::ArchiveError;
use reddit_archiver::fetcher::Fetcher;
use reddit_archiver::media::{AcquirerRegistry, FfmpegMuxer, Muxer};
use reddit_archiver::store::{ArchiveStore, Bucket};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const THREAD_PATH: &str = "/r/test/comments/abc/some_title/";

/// Muxer double: copies the video input to the output and records the call.
#[derive(Default)]
struct RecordingMuxer {
    calls: Mutex<Vec<(PathBuf, PathBuf, PathBuf)>>,
}

#[async_trait]
impl Muxer for RecordingMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), ArchiveError> {
        self.calls.lock().unwrap().push((
            video.to_path_buf(),
            audio.to_path_buf(),
            output.to_path_buf(),
        ));
        tokio::fs::copy(video, output)
            .await
            .map_err(|e| ArchiveError::Io {
                path: output.to_path_buf(),
                source: e,
            })?;
        Ok(())
    }
}

struct Harness {
    server: MockServer,
    archiver: Archiver,
    store: ArchiveStore,
    media_root: PathBuf,
    temp_dir: TempDir,
}

impl Harness {
    async fn new(muxer: Arc<dyn Muxer>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = Config {
            data_root: temp_dir.path().join("out"),
            media_dir: temp_dir.path().join("media"),
            ..Config::for_testing()
        };
        let archiver = Archiver::with_parts(
            Fetcher::new(&config).expect("Failed to build fetcher"),
            AcquirerRegistry::with_defaults(muxer),
            ArchiveOptions::from(&config),
        );

        Self {
            server: MockServer::start().await,
            archiver,
            store: ArchiveStore::new(&config.data_root),
            media_root: config.media_dir,
            temp_dir,
        }
    }

    fn post_url(&self) -> String {
        format!("{}{THREAD_PATH}", self.server.uri())
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.server.uri())
    }

    fn post_dir(&self) -> PathBuf {
        self.media_root.join("abc")
    }

    async fn serve_thread(&self, post: Value) {
        let body = json!([
            {"kind": "Listing", "data": {"children": [{"kind": "t3", "data": post}]}},
            {"kind": "Listing", "data": {"children": [
                {"kind": "t1", "data": {
                    "id": "c1",
                    "author": "alice",
                    "body": "first",
                    "permalink": "/r/test/comments/abc/some_title/c1/",
                    "replies": {"kind": "Listing", "data": {"children": [
                        {"kind": "t1", "data": {"id": "c2", "author": "bob", "body": "reply", "replies": ""}},
                        {"kind": "more", "data": {"children": ["c9"]}},
                    ]}},
                }},
            ]}},
        ]);
        Mock::given(method("GET"))
            .and(path(format!("{THREAD_PATH}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    async fn serve_bytes(&self, at: &str, bytes: &[u8]) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.to_vec()))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    async fn serve_manifest(&self, xml: &str) {
        Mock::given(method("GET"))
            .and(path("/vid/DASHPlaylist.mpd"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/dash+xml")
                    .set_body_string(xml),
            )
            .expect(1)
            .mount(&self.server)
            .await;
    }

    async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}

fn base_post(extra: Value) -> Value {
    let mut post = json!({
        "id": "abc",
        "name": "t3_abc",
        "title": "My Clip!",
        "author": "poster",
        "subreddit": "test",
        "permalink": THREAD_PATH,
        "score": 42,
        "edited": false,
    });
    if let (Some(post), Some(extra)) = (post.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            post.insert(key.clone(), value.clone());
        }
    }
    post
}

const AV_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011">
  <Period>
    <AdaptationSet mimeType="video/mp4">
      <Representation bandwidth="800000"><BaseURL>DASH_360.mp4</BaseURL></Representation>
      <Representation bandwidth="2400000"><BaseURL>DASH_720.mp4</BaseURL></Representation>
    </AdaptationSet>
    <AdaptationSet mimeType="audio/mp4">
      <Representation bandwidth="128000"><BaseURL>DASH_AUDIO_128.mp4</BaseURL></Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

const VIDEO_ONLY_MANIFEST: &str = r#"<MPD><Period>
    <AdaptationSet mimeType="video/mp4">
      <Representation bandwidth="2400000"><BaseURL>DASH_720.mp4</BaseURL></Representation>
    </AdaptationSet>
</Period></MPD>"#;

#[tokio::test]
async fn test_self_post_makes_single_request() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    h.serve_thread(base_post(json!({"is_self": true, "selftext": "hello"})))
        .await;

    let record = h.archiver.archive_url(&h.post_url()).await.unwrap();

    assert_eq!(record.media_kind, MediaKind::SelfPost);
    let media = record.media.unwrap();
    assert_eq!(media.kind, MediaKind::SelfPost);
    assert!(media.files.is_empty());
    assert_eq!(h.request_count().await, 1);

    let comments = record.comments.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].replies.len(), 1);
    assert!(comments[0].replies[0].replies.is_empty());
    assert_eq!(
        comments[0].permalink.as_deref(),
        Some("https://www.reddit.com/r/test/comments/abc/some_title/c1/")
    );
}

#[tokio::test]
async fn test_gallery_files_numbered_in_declared_order() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    let variant = |suffix: &str| json!({"u": h.url(suffix), "x": 1080, "y": 1080});
    h.serve_thread(base_post(json!({
        "is_gallery": true,
        "gallery_data": {"items": [
            {"media_id": "m_png"},
            {"media_id": "m_gif"},
            {"media_id": "m_jpg"},
        ]},
        "media_metadata": {
            "m_jpg": {"m": "image/jpg", "s": variant("/g/source3"), "p": []},
            "m_png": {"m": "image/png", "s": variant("/g/source1"), "p": [
                {"u": h.url("/g/small1"), "x": 108, "y": 108},
                variant("/g/large1"),
            ]},
            "m_gif": {"m": "image/gif", "s": {"gif": h.url("/g/anim2"), "x": 10, "y": 10}},
        },
    })))
    .await;
    h.serve_bytes("/g/large1", b"png-bytes").await;
    h.serve_bytes("/g/anim2", b"gif-bytes").await;
    h.serve_bytes("/g/source3", b"jpg-bytes").await;

    let record = h.archiver.archive_url(&h.post_url()).await.unwrap();

    let media = record.media.unwrap();
    assert_eq!(media.kind, MediaKind::Gallery);
    assert_eq!(
        media.files,
        [
            h.post_dir().join("01.png"),
            h.post_dir().join("02.gif"),
            h.post_dir().join("03.jpg"),
        ]
    );
    assert_eq!(std::fs::read(&media.files[0]).unwrap(), b"png-bytes");
    assert_eq!(std::fs::read(&media.files[1]).unwrap(), b"gif-bytes");
    assert_eq!(std::fs::read(&media.files[2]).unwrap(), b"jpg-bytes");
}

#[tokio::test]
async fn test_gallery_skips_items_without_variants() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    h.serve_thread(base_post(json!({
        "is_gallery": true,
        "gallery_data": {"items": [{"media_id": "gone"}, {"media_id": "ok"}]},
        "media_metadata": {
            "gone": {"status": "failed"},
            "ok": {"m": "image/png", "s": {"u": h.url("/g/ok")}},
        },
    })))
    .await;
    h.serve_bytes("/g/ok", b"ok").await;

    let media = h.archiver.archive_url(&h.post_url()).await.unwrap().media.unwrap();
    assert_eq!(media.files, [h.post_dir().join("02.png")]);
}

#[tokio::test]
async fn test_image_post_downloads_with_url_extension() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    h.serve_thread(base_post(json!({
        "post_hint": "image",
        "domain": "i.redd.it",
        "url": h.url("/img/photo.png"),
    })))
    .await;
    h.serve_bytes("/img/photo.png", b"image-bytes").await;

    let outcome = h
        .archiver
        .process(&h.post_url(), &h.store, false)
        .await
        .unwrap();

    let expected = h.store.path_for(Bucket::Media, "abc");
    assert_eq!(
        outcome,
        ProcessOutcome::Saved {
            bucket: Bucket::Media,
            path: expected.clone()
        }
    );
    let saved: Value = serde_json::from_slice(&std::fs::read(&expected).unwrap()).unwrap();
    assert_eq!(saved["media_kind"], "image");
    assert_eq!(saved["reddit_fullname"], "t3_abc");
    assert_eq!(saved["score"], 42);
    assert_eq!(
        std::fs::read(h.post_dir().join("image.png")).unwrap(),
        b"image-bytes"
    );
}

#[tokio::test]
async fn test_video_with_audio_is_muxed() {
    let muxer = Arc::new(RecordingMuxer::default());
    let h = Harness::new(muxer.clone()).await;
    h.serve_thread(base_post(json!({
        "url": "https://v.redd.it/vid",
        "secure_media": {"reddit_video": {
            "dash_url": h.url("/vid/DASHPlaylist.mpd"),
            "fallback_url": h.url("/vid/DASH_720.mp4?source=fallback"),
        }},
    })))
    .await;
    h.serve_manifest(AV_MANIFEST).await;
    h.serve_bytes("/vid/DASH_720.mp4", b"video-720").await;
    h.serve_bytes("/vid/DASH_AUDIO_128.mp4", b"audio-128").await;

    let media = h.archiver.archive_url(&h.post_url()).await.unwrap().media.unwrap();

    let merged = h.post_dir().join("My_Clip.mp4");
    assert_eq!(media.kind, MediaKind::Video);
    assert_eq!(media.merged.as_ref(), Some(&merged));
    assert_eq!(media.files, [merged.clone()]);
    assert_eq!(std::fs::read(&merged).unwrap(), b"video-720");
    assert!(!h.post_dir().join("My_Clip.video.mp4").exists());
    assert!(!h.post_dir().join("My_Clip.audio.mp4").exists());

    let calls = muxer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, h.post_dir().join("My_Clip.video.mp4"));
    assert_eq!(calls[0].1, h.post_dir().join("My_Clip.audio.mp4"));
    assert_eq!(calls[0].2, merged);
}

#[tokio::test]
async fn test_video_only_stream_is_renamed() {
    let muxer = Arc::new(RecordingMuxer::default());
    let h = Harness::new(muxer.clone()).await;
    h.serve_thread(base_post(json!({
        "crosspost_parent_list": [{
            "id": "parent",
            "media": {"reddit_video": {"dash_url": h.url("/vid/DASHPlaylist.mpd")}},
        }],
    })))
    .await;
    h.serve_manifest(VIDEO_ONLY_MANIFEST).await;
    h.serve_bytes("/vid/DASH_720.mp4", b"silent-video").await;

    let record = h.archiver.archive_url(&h.post_url()).await.unwrap();
    assert_eq!(record.media_kind, MediaKind::Video);

    let merged = h.post_dir().join("My_Clip.mp4");
    let media = record.media.unwrap();
    assert_eq!(media.merged.as_ref(), Some(&merged));
    assert_eq!(std::fs::read(&merged).unwrap(), b"silent-video");
    assert!(!h.post_dir().join("My_Clip.video.mp4").exists());
    assert!(muxer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_video_falls_back_to_premuxed_url() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    h.serve_thread(base_post(json!({
        "title": "",
        "media": {"reddit_video": {"fallback_url": h.url("/vid/fallback.mp4?source=fallback&amp;x=1")}},
    })))
    .await;
    h.serve_bytes("/vid/fallback.mp4", b"premuxed").await;

    let media = h.archiver.archive_url(&h.post_url()).await.unwrap().media.unwrap();

    let merged = h.post_dir().join("abc.mp4");
    assert_eq!(media.merged.as_ref(), Some(&merged));
    assert_eq!(std::fs::read(&merged).unwrap(), b"premuxed");
}

#[tokio::test]
async fn test_video_without_any_source_fails() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    h.serve_thread(base_post(json!({
        "url": "https://example.com/not-a-video",
        "secure_media": {"reddit_video": {}},
    })))
    .await;

    let err = h
        .archiver
        .process(&h.post_url(), &h.store, false)
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::MediaResolution(_)));
    assert!(h.store.existing("abc").await.is_none());
}

#[tokio::test]
async fn test_missing_muxer_is_fatal_and_cleans_up() {
    let h = Harness::new(Arc::new(FfmpegMuxer::new("no-such-muxer-on-this-host"))).await;
    h.serve_thread(base_post(json!({
        "secure_media": {"reddit_video": {"dash_url": h.url("/vid/DASHPlaylist.mpd")}},
    })))
    .await;
    h.serve_manifest(AV_MANIFEST).await;
    h.serve_bytes("/vid/DASH_720.mp4", b"video").await;
    h.serve_bytes("/vid/DASH_AUDIO_128.mp4", b"audio").await;

    let err = h.archiver.archive_url(&h.post_url()).await.unwrap_err();

    assert!(matches!(err, ArchiveError::MuxingUnavailable { .. }));
    assert!(!h.post_dir().join("My_Clip.video.mp4").exists());
    assert!(!h.post_dir().join("My_Clip.audio.mp4").exists());
}

#[tokio::test]
async fn test_external_post_routed_to_external_bucket() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    h.serve_thread(base_post(json!({
        "url": "https://example.com/article",
        "domain": "example.com",
    })))
    .await;

    let outcome = h
        .archiver
        .process(&h.post_url(), &h.store, false)
        .await
        .unwrap();

    let ProcessOutcome::Saved { bucket, path } = outcome else {
        panic!("expected a saved record, got {outcome:?}");
    };
    assert_eq!(bucket, Bucket::External);
    let saved: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(saved["external_link"], "https://example.com/article");
    assert_eq!(saved["media"]["files"], json!([]));
    assert!(!h.post_dir().exists());
}

#[tokio::test]
async fn test_existing_record_is_skipped() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    h.serve_thread(base_post(json!({"is_self": true}))).await;

    let first = h.archiver.process(&h.post_url(), &h.store, true).await.unwrap();
    let second = h.archiver.process(&h.post_url(), &h.store, true).await.unwrap();

    let path = h.store.path_for(Bucket::Text, "abc");
    assert_eq!(
        first,
        ProcessOutcome::Saved {
            bucket: Bucket::Text,
            path: path.clone()
        }
    );
    assert_eq!(
        second,
        ProcessOutcome::Skipped {
            bucket: Bucket::Text,
            path
        }
    );
    assert_eq!(h.request_count().await, 1);
}

#[tokio::test]
async fn test_unexpected_payload_is_schema_error() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    Mock::given(method("GET"))
        .and(path(format!("{THREAD_PATH}.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "Listing"})))
        .mount(&h.server)
        .await;

    let err = h.archiver.archive_url(&h.post_url()).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Schema(_)));
}

#[tokio::test]
async fn test_missing_post_is_not_retried() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    Mock::given(method("GET"))
        .and(path(format!("{THREAD_PATH}.json")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.archiver.archive_url(&h.post_url()).await.unwrap_err();
    assert_eq!(err.http_status(), Some(reqwest::StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_hostile_post_id_stays_inside_data_root() {
    let h = Harness::new(Arc::new(RecordingMuxer::default())).await;
    h.serve_thread(base_post(json!({"id": "../../escaped", "is_self": true})))
        .await;

    let outcome = h
        .archiver
        .process(&h.post_url(), &h.store, false)
        .await
        .unwrap();

    let ProcessOutcome::Saved { path, .. } = outcome else {
        panic!("expected a saved record, got {outcome:?}");
    };
    let bucket_dir = h.temp_dir.path().join("out").join("text");
    assert_eq!(path.parent(), Some(bucket_dir.as_path()));
    assert!(path.exists());
    assert!(!h.temp_dir.path().join("escaped.json").exists());
    assert!(!h.temp_dir.path().parent().unwrap().join("escaped.json").exists());
}
