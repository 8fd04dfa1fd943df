use axum::{
    Json, Router,
    body::{Body, Bytes, to_bytes},
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use murecom_gateway::{
    build_router, emotext::EmotextClient, forward::ReverseProxyForwarder, models::Emotion,
    musicstore::MusicstoreClient, state::AppState,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::util::ServiceExt;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const BIG_FILE_LEN: usize = 1 << 20;
pub const SLOW_FILE_DELAY: Duration = Duration::from_secs(2);

/// How the fake emotion service answers one page text.
#[derive(Clone)]
pub enum EmotextReply {
    Emotion(Emotion),
    /// HTTP 500.
    Fail,
    /// HTTP 200 with a body that is not JSON.
    Garbage,
}

/// Scripted behavior of the fake upstreams. Texts not listed in `emotions`
/// get a 500; `tracks: None` makes the recommendation endpoint answer 500.
#[derive(Clone, Default)]
pub struct Script {
    pub emotions: HashMap<String, EmotextReply>,
    pub tracks: Option<Value>,
}

impl Script {
    pub fn emotion(mut self, text: &str, valence: f64, arousal: f64) -> Self {
        self.emotions.insert(
            text.to_string(),
            EmotextReply::Emotion(Emotion::new(valence, arousal)),
        );
        self
    }

    pub fn reply(mut self, text: &str, reply: EmotextReply) -> Self {
        self.emotions.insert(text.to_string(), reply);
        self
    }

    pub fn tracks(mut self, body: Value) -> Self {
        self.tracks = Some(body);
        self
    }
}

#[derive(Default)]
struct Recorded {
    emotext_calls: Vec<(String, Option<String>)>,
    murecom_queries: Vec<String>,
}

#[derive(Clone)]
struct MockState {
    script: Arc<Script>,
    recorded: Arc<Mutex<Recorded>>,
}

/// Emotion service, recommendation service and file store on one port:
/// `/emotext`, `/murecom` and `/files/*`.
pub struct MockUpstream {
    pub addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockUpstream {
    pub async fn spawn(script: Script) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let state = MockState {
            script: Arc::new(script),
            recorded: recorded.clone(),
        };

        let app = Router::new()
            .route("/emotext", post(mock_emotext))
            .route("/murecom", get(mock_murecom))
            .route("/files/*path", any(mock_files))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            addr,
            recorded,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Page texts in the order the emotion service received them.
    pub fn emotext_texts(&self) -> Vec<String> {
        let recorded = self.recorded.lock().unwrap();
        recorded
            .emotext_calls
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub fn emotext_content_types(&self) -> Vec<Option<String>> {
        let recorded = self.recorded.lock().unwrap();
        recorded
            .emotext_calls
            .iter()
            .map(|(_, content_type)| content_type.clone())
            .collect()
    }

    pub fn murecom_queries(&self) -> Vec<String> {
        self.recorded.lock().unwrap().murecom_queries.clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn mock_emotext(State(mock): State<MockState>, headers: HeaderMap, body: String) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    mock.recorded
        .lock()
        .unwrap()
        .emotext_calls
        .push((body.clone(), content_type));

    match mock.script.emotions.get(&body) {
        Some(EmotextReply::Emotion(emotion)) => Json(json!({
            "emotions": {"PA": 35.99, "NN": 8.13},
            "polarity": {"neutrality": 2.01, "positive": 5.18, "negative": 2.71},
            "va": {"valence": emotion.valence, "arousal": emotion.arousal}
        }))
        .into_response(),
        Some(EmotextReply::Garbage) => (StatusCode::OK, "<html>busy</html>").into_response(),
        Some(EmotextReply::Fail) | None => {
            (StatusCode::INTERNAL_SERVER_ERROR, "emotext failed").into_response()
        }
    }
}

async fn mock_murecom(State(mock): State<MockState>, uri: Uri) -> Response {
    mock.recorded
        .lock()
        .unwrap()
        .murecom_queries
        .push(uri.query().unwrap_or("").to_string());

    match &mock.script.tracks {
        Some(body) => Json(body.clone()).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "musicstore failed").into_response(),
    }
}

/// File store: echoes what it received, with a few special file names.
async fn mock_files(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let path = uri.path();

    if path.ends_with("missing.mp3") {
        return (StatusCode::NOT_FOUND, "no such file").into_response();
    }
    if path.ends_with("moved.mp3") {
        return (
            StatusCode::FOUND,
            [(header::LOCATION, "/files/elsewhere.mp3")],
        )
            .into_response();
    }
    if path.ends_with("slow.mp3") {
        tokio::time::sleep(SLOW_FILE_DELAY).await;
    }
    if path.ends_with("big.bin") {
        return (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            vec![7u8; BIG_FILE_LEN],
        )
            .into_response();
    }

    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let echo = json!({
        "method": method.as_str(),
        "path": path,
        "query": uri.query(),
        "host": header_str("host"),
        "x_test": header_str("x-test"),
        "range": header_str("range"),
        "body": String::from_utf8_lossy(&body),
    });

    ([("x-upstream", "files")], Json(echo)).into_response()
}

pub fn test_state(
    upstream: &MockUpstream,
    audio_proxies: &str,
    timeout: Duration,
) -> Arc<AppState> {
    Arc::new(AppState {
        emotext: EmotextClient::new(upstream.url("/emotext"), timeout).unwrap(),
        musicstore: MusicstoreClient::new(upstream.url("/murecom"), timeout).unwrap(),
        audio_proxies: audio_proxies.parse().unwrap(),
        forwarder: ReverseProxyForwarder::new(timeout).unwrap(),
    })
}

pub fn test_app(upstream: &MockUpstream, audio_proxies: &str) -> Router {
    build_router(test_state(upstream, audio_proxies, TEST_TIMEOUT))
}

pub fn test_app_with_timeout(
    upstream: &MockUpstream,
    audio_proxies: &str,
    timeout: Duration,
) -> Router {
    build_router(test_state(upstream, audio_proxies, timeout))
}

pub fn track_json(name: &str, audio_file_url: &str, valence: f64, arousal: f64) -> Value {
    json!({
        "Name": name,
        "Artist": "Test Artist",
        "Album": "Test Album",
        "CoverImageURL": "http://covers.example/cover.jpg",
        "AudioFileURL": audio_file_url,
        "Emotion": {"valence": valence, "arousal": arousal}
    })
}

pub fn post_murecom(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/murecom")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
