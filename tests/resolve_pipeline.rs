//! End-to-end pipeline scenarios against a mock HTTP server.
//!
//! Each test stands up a wiremock server playing the part of a provider
//! site (catalog page, embed hosts, playback API) and drives the public
//! `Resolver::resolve` entry point through it.

use std::sync::{Arc, Mutex};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use pretty_assertions::assert_eq;
use rstest::rstest;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use streamsift::{
    ExtractorDelegate, Resolver, SiteRules, StreamDescriptor, SubtitleTrack,
};

/// Delegate that returns a fixed descriptor for URLs on one host and
/// records every URL it was asked about.
struct RecordingDelegate {
    host: String,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ExtractorDelegate for RecordingDelegate {
    async fn extract(&self, url: &str, referer: Option<&str>) -> Option<Vec<StreamDescriptor>> {
        self.calls.lock().unwrap().push(url.to_string());
        if !url.contains(&self.host) {
            return None;
        }
        let mut descriptor = StreamDescriptor::new("mock", "https://cdn.mock/stream.m3u8");
        descriptor.referer = referer.map(ToString::to_string);
        Some(vec![descriptor])
    }
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!("<html><body>{body}</body></html>"))
}

// ─── Scenario: single iframe, delegate resolves ──────────────────────────────

#[tokio::test]
async fn single_iframe_delegated_to_extractor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/title/ep1"))
        .respond_with(html_page(
            r#"<iframe src="https://embedhost.example/e/abc123"></iframe>"#,
        ))
        .mount(&server)
        .await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let resolver = Resolver::builder()
        .delegate(Arc::new(RecordingDelegate {
            host: "embedhost.example".into(),
            calls: Arc::clone(&calls),
        }))
        .build()
        .unwrap();

    let streams = resolver
        .resolve(&format!("{}/title/ep1", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].playback_url, "https://cdn.mock/stream.m3u8");
    assert!(streams[0].is_adaptive);
    assert_eq!(
        calls.lock().unwrap().as_slice(),
        ["https://embedhost.example/e/abc123"]
    );
}

// ─── Scenario: deny-listed candidates are never dispatched ───────────────────

#[tokio::test]
async fn deny_listed_candidates_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/title/ep2"))
        .respond_with(html_page(
            r#"
            <iframe src="https://ads.doubleclick.net/e/banner1"></iframe>
            <iframe src="https://cdn.googlesyndication.com/e/banner2"></iframe>
            <iframe src="https://embedhost.example/e/real"></iframe>
            "#,
        ))
        .mount(&server)
        .await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let resolver = Resolver::builder()
        .delegate(Arc::new(RecordingDelegate {
            host: "embedhost.example".into(),
            calls: Arc::clone(&calls),
        }))
        .build()
        .unwrap();

    let streams = resolver
        .resolve(&format!("{}/title/ep2", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(streams.len(), 1);
    assert_eq!(
        calls.lock().unwrap().as_slice(),
        ["https://embedhost.example/e/real"]
    );
}

// ─── Scenario: sealed playback API ───────────────────────────────────────────

const SEALED_PLAINTEXT: &str = r#"{"sources":[{"url":"https://cdn/x.m3u8"}],"tracks":[{"file":"https://cdn/es.vtt","label":"Spanish"},{"file":"https://cdn/up.vtt","label":"upload captions"}]}"#;

fn sealed_playback_json(plaintext: &str) -> String {
    let key = [42u8; 32];
    let iv = [7u8; 12];
    let cipher = Aes256Gcm::new_from_slice(&key).unwrap();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .unwrap();
    serde_json::json!({
        "playback": {
            "iv": URL_SAFE_NO_PAD.encode(iv),
            "payload": URL_SAFE_NO_PAD.encode(ciphertext),
            "key_parts": [
                URL_SAFE_NO_PAD.encode(&key[..16]),
                URL_SAFE_NO_PAD.encode(&key[16..]),
            ],
        }
    })
    .to_string()
}

#[tokio::test]
async fn sealed_api_path_yields_adaptive_descriptor() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/title/ep3"))
        .respond_with(html_page(&format!(
            r#"<iframe src="{base}/e/abc123"></iframe>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/videos/abc123/embed/details"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"embed_frame_url":"{base}/api/frame/abc123"}}"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/videos/abc123/embed/playback"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(sealed_playback_json(SEALED_PLAINTEXT)),
        )
        .mount(&server)
        .await;

    let pushed: Arc<Mutex<Vec<SubtitleTrack>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_target = Arc::clone(&pushed);

    let resolver = Resolver::builder()
        .rules(SiteRules {
            api_hosts: vec!["127.0.0.1".into()],
            ..SiteRules::default()
        })
        .subtitle_sink(Arc::new(move |track| {
            sink_target.lock().unwrap().push(track);
        }))
        .build()
        .unwrap();

    let streams = resolver
        .resolve(&format!("{base}/title/ep3"), None)
        .await
        .unwrap();

    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].playback_url, "https://cdn/x.m3u8");
    assert!(streams[0].is_adaptive);

    // Real subtitle pushed to the side channel, the placeholder dropped.
    let tracks = pushed.lock().unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].url, "https://cdn/es.vtt");
}

// ─── Scenario: depth bound ───────────────────────────────────────────────────

#[tokio::test]
async fn chain_beyond_max_depth_yields_empty_result() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Pages /p0 .. /p7, each an iframe pointing at the next. Seven hops
    // exceed the depth bound of six.
    for i in 0..8 {
        Mock::given(method("GET"))
            .and(path(format!("/p{i}")))
            .respond_with(html_page(&format!(
                r#"<iframe src="{base}/p{}"></iframe>"#,
                i + 1
            )))
            .mount(&server)
            .await;
    }

    let resolver = Resolver::new().unwrap();
    let streams = resolver
        .resolve(&format!("{base}/p0"), None)
        .await
        .unwrap();
    assert!(streams.is_empty());
}

// ─── Scenario: cycle guard ───────────────────────────────────────────────────

#[tokio::test]
async fn cyclic_iframes_fetch_each_page_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page(&format!(r#"<iframe src="{base}/b"></iframe>"#)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_page(&format!(r#"<iframe src="{base}/a"></iframe>"#)))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = Resolver::new().unwrap();
    let streams = resolver.resolve(&format!("{base}/a"), None).await.unwrap();
    assert!(streams.is_empty());
}

// ─── Scenario: generic fallback mines a packed embed ─────────────────────────

#[tokio::test]
async fn fallback_unpacks_packed_embed_script() {
    let server = MockServer::start().await;
    let base = server.uri();

    let packed = r"<script>eval(function(p,a,c,k,e,d){e=function(c){return c.toString(36)};if(!''.replace(/^/,String)){while(c--){d[c.toString(a)]=k[c]||c.toString(a)}k=[function(e){return d[e]}];e=function(){return'\\w+'};c=1};while(c--){if(k[c]){p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c])}}return p}('0 1=\'2://3.4/5.6\'',7,7,'var|file|https|cdn|example|video|m3u8'.split('|'),0,{}))</script>";

    Mock::given(method("GET"))
        .and(path("/title/ep4"))
        .respond_with(html_page(&format!(
            r#"<iframe src="{base}/e/packed1"></iframe>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/e/packed1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(packed))
        .mount(&server)
        .await;

    let resolver = Resolver::new().unwrap();
    let streams = resolver
        .resolve(&format!("{base}/title/ep4"), None)
        .await
        .unwrap();

    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].playback_url, "https://cdn.example/video.m3u8");
    assert_eq!(
        streams[0].referer.as_deref(),
        Some(format!("{base}/e/packed1").as_str())
    );
}

// ─── Scenario: dead-mirror rewrite before dispatch ───────────────────────────

#[tokio::test]
async fn host_rewrites_redirect_candidates_to_live_mirror() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/title/ep5"))
        .respond_with(html_page(
            r#"<iframe src="https://deadmirror.example/e/xyz"></iframe>"#,
        ))
        .mount(&server)
        .await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let resolver = Resolver::builder()
        .rules(SiteRules {
            host_rewrites: vec![streamsift::HostRewrite {
                from: "deadmirror.example".into(),
                to: "livemirror.example".into(),
            }],
            ..SiteRules::default()
        })
        .delegate(Arc::new(RecordingDelegate {
            host: "livemirror.example".into(),
            calls: Arc::clone(&calls),
        }))
        .build()
        .unwrap();

    let streams = resolver
        .resolve(&format!("{}/title/ep5", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(streams.len(), 1);
    assert_eq!(
        calls.lock().unwrap().as_slice(),
        ["https://livemirror.example/e/xyz"]
    );
}

// ─── Property: layered cipher terminates within its round bound ──────────────

#[rstest]
#[case(1)]
#[case(3)]
#[case(5)]
fn layered_cipher_round_trip(#[case] rounds: usize) {
    use base64::engine::general_purpose::STANDARD;

    let plaintext = "https://cdn.example/path/video.m3u8";
    let mut encoded = plaintext.to_string();
    for _ in 0..rounds {
        encoded = STANDARD.encode(encoded.as_bytes());
    }

    assert_eq!(
        streamsift::decode::decode_layers(&encoded).as_deref(),
        Some(plaintext)
    );
}
