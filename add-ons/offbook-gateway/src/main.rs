//! Axum-based API Gateway for offbook: upload a screenplay, pick a part,
//! rehearse it one turn at a time. Config-driven via CoreConfig.
//! Scene state lives with the client; the gateway only stores scripts and audio.

mod rehearse;
mod scripts;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use axum::http::{Method, StatusCode};
use offbook_core::{CoreConfig, ScriptStore};
use offbook_voice::TtsBackend;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Gateway version from Cargo.toml (reported by the health probe).
pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often the expired-script sweep runs.
const PURGE_INTERVAL_SECS: u64 = 3600;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<CoreConfig>,
    pub(crate) store: Arc<ScriptStore>,
    pub(crate) tts: Arc<dyn TtsBackend>,
}

#[tokio::main]
async fn main() {
    // Load .env first: the TTS API key stays in the backend only.
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[offbook-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match CoreConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("Config load failed: {}", e);
            std::process::exit(1);
        }
    };

    for dir in [config.audio_dir(), config.uploads_dir()] {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::error!("Cannot create {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    }

    let store = match ScriptStore::new(config.db_path()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Script store open failed: {}", e);
            std::process::exit(1);
        }
    };

    let tts: Arc<dyn TtsBackend> =
        Arc::from(offbook_voice::create_tts(config.tts_mode == "placeholder"));

    spawn_purge_loop(Arc::clone(&store), Arc::clone(&config));

    let state = AppState {
        config: Arc::clone(&config),
        store,
        tts,
    };
    let app = build_app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("{} v{} listening on {}", config.app_name, GATEWAY_VERSION, addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Bind {} failed: {}", addr, e);
            std::process::exit(1);
        }
    };
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested (Ctrl+C)");
        }
    }
}

/// Hourly sweep: expired scripts leave the store together with their
/// on-disk artifacts (stored PDF, synthesized audio).
fn spawn_purge_loop(store: Arc<ScriptStore>, config: Arc<CoreConfig>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(PURGE_INTERVAL_SECS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let sweep_store = Arc::clone(&store);
            let purged =
                tokio::task::spawn_blocking(move || sweep_store.purge_expired(offbook_core::now_ms()))
                    .await;
            match purged {
                Ok(Ok(ids)) => {
                    if !ids.is_empty() {
                        tracing::info!(target: "offbook::store", "Purged {} expired script(s)", ids.len());
                        for id in &ids {
                            remove_script_artifacts(&config, id);
                        }
                    }
                }
                Ok(Err(e)) => tracing::warn!(target: "offbook::store", "Purge failed: {}", e),
                Err(e) => tracing::warn!(target: "offbook::store", "Purge task failed: {}", e),
            }
        }
    });
}

/// Remove the stored PDF and every synthesized audio file of a script.
/// Best effort: a file that is already gone is fine.
pub(crate) fn remove_script_artifacts(config: &CoreConfig, script_id: &str) {
    let pdf = config.uploads_dir().join(format!("{}.pdf", script_id));
    let _ = std::fs::remove_file(pdf);

    if let Ok(entries) = std::fs::read_dir(config.audio_dir()) {
        let prefix = format!("{}_", script_id);
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                let _ = std::fs::remove_file(entry.path());
            }
        }
    }
}

/// 404 body for an unknown script id, shared by every handler that looks one up.
pub(crate) fn script_not_found(script_id: &str) -> (StatusCode, axum::Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "error": format!("Unknown script: {}", script_id) })),
    )
}

/// 500 body for storage or task failures.
pub(crate) fn internal_error(e: impl std::fmt::Display) -> (StatusCode, axum::Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({ "error": format!("{}", e) })),
    )
}

fn build_app(state: AppState) -> Router {
    // CORS: allow local UI origins. The gateway holds the TTS key; the
    // frontend only ever sees audio URLs.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &axum::http::HeaderValue, _| {
            let s = origin.to_str().unwrap_or("");
            s.starts_with("http://localhost:") || s.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    let audio_dir = state.config.audio_dir();
    let upload_limit = state.config.max_upload_bytes as usize;

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .route("/api/v1/scripts", post(scripts::upload_script_post))
        .route(
            "/api/v1/scripts/:script_id",
            get(scripts::script_get).delete(scripts::script_delete),
        )
        .route("/api/v1/scenes/begin", post(rehearse::scene_begin_post))
        .route("/api/v1/scenes/advance", post(rehearse::scene_advance_post))
        .nest_service("/audio", ServeDir::new(audio_dir))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
        .layer(cors)
}

/// GET /api/v1/health — liveness probe. Always OK while the process runs,
/// with no storage or TTS checks behind it.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "service": "offbook-gateway",
        "version": GATEWAY_VERSION,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use offbook_voice::{PlaceholderTts, VoiceError, VoiceResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Delegates to the placeholder but records every synthesize call.
    struct CountingTts {
        calls: AtomicUsize,
        last_text: Mutex<Option<String>>,
    }

    impl CountingTts {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_text: Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl TtsBackend for CountingTts {
        async fn synthesize(&self, text: &str, voice: &str) -> VoiceResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_text.lock().unwrap() = Some(text.to_string());
            PlaceholderTts.synthesize(text, voice).await
        }

        fn file_extension(&self) -> &'static str {
            "wav"
        }
    }

    struct FailingTts;

    #[async_trait::async_trait]
    impl TtsBackend for FailingTts {
        async fn synthesize(&self, _text: &str, _voice: &str) -> VoiceResult<Vec<u8>> {
            Err(VoiceError::Tts("TTS API error 500 Internal Server Error: boom".to_string()))
        }
    }

    fn test_config() -> CoreConfig {
        let dir = std::env::temp_dir().join(format!("offbook_gw_test_{}", uuid::Uuid::new_v4()));
        CoreConfig {
            app_name: "Test Gateway".to_string(),
            port: 8000,
            storage_path: dir.to_string_lossy().into_owned(),
            tts_mode: "placeholder".to_string(),
            script_ttl_hours: 24,
            max_upload_bytes: 20_971_520,
        }
    }

    fn demo_lines() -> Vec<String> {
        ["INT. ROOM", "JOHN", "Hello there.", "MARY", "Hi John."]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// State over a fresh temp store, seeded with the demo scene.
    fn test_state(tts: Arc<dyn TtsBackend>) -> (AppState, String) {
        let config = test_config();
        std::fs::create_dir_all(config.audio_dir()).unwrap();
        std::fs::create_dir_all(config.uploads_dir()).unwrap();
        let store = ScriptStore::new(config.db_path()).unwrap();

        let lines = demo_lines();
        let characters = offbook_core::extract_characters(&lines);
        let row = store
            .insert_script(Some("Demo"), &lines, &characters, 3_600_000)
            .unwrap();

        let state = AppState {
            config: Arc::new(config),
            store: Arc::new(store),
            tts,
        };
        (state, row.id)
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_reports_service_and_version() {
        let (state, _) = test_state(Arc::new(PlaceholderTts));
        let app = build_app(state);
        let req = Request::builder()
            .method("GET")
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "offbook-gateway");
        assert_eq!(json["version"], GATEWAY_VERSION);
    }

    #[tokio::test]
    async fn test_script_get_returns_metadata_and_cast() {
        let (state, script_id) = test_state(Arc::new(PlaceholderTts));
        let app = build_app(state);
        let req = Request::builder()
            .method("GET")
            .uri(format!("/api/v1/scripts/{}", script_id))
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["script_id"], script_id.as_str());
        assert_eq!(json["title"], "Demo");
        assert_eq!(json["line_count"], 5);
        assert_eq!(json["characters"], serde_json::json!(["JOHN", "MARY"]));
    }

    #[tokio::test]
    async fn test_unknown_script_is_not_found_everywhere() {
        let (state, _) = test_state(Arc::new(PlaceholderTts));

        let req = Request::builder()
            .method("GET")
            .uri("/api/v1/scripts/missing")
            .body(Body::empty())
            .unwrap();
        let res = build_app(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let (status, json) = post_json(
            build_app(state.clone()),
            "/api/v1/scenes/begin",
            serde_json::json!({ "script_id": "missing", "character": "JOHN" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("missing"));

        let (status, _) = post_json(
            build_app(state),
            "/api/v1/scenes/advance",
            serde_json::json!({ "script_id": "missing", "position": 0, "character": "JOHN" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_begin_requires_a_character() {
        let (state, script_id) = test_state(Arc::new(PlaceholderTts));
        let (status, json) = post_json(
            build_app(state),
            "/api/v1/scenes/begin",
            serde_json::json!({ "script_id": script_id, "character": "   " }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("character"));
    }

    #[tokio::test]
    async fn test_begin_hands_back_position_zero() {
        let (state, script_id) = test_state(Arc::new(PlaceholderTts));
        let (status, json) = post_json(
            build_app(state),
            "/api/v1/scenes/begin",
            serde_json::json!({ "script_id": script_id, "character": "MARY" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ready");
        assert_eq!(json["position"], 0);
        assert_eq!(json["character"], "MARY");
        assert_eq!(json["characters"], serde_json::json!(["JOHN", "MARY"]));
    }

    #[tokio::test]
    async fn test_advance_walks_skips_prompts_and_completion() {
        let (state, script_id) = test_state(Arc::new(PlaceholderTts));

        // Position 0 is a scene heading: skip.
        let (status, json) = post_json(
            build_app(state.clone()),
            "/api/v1/scenes/advance",
            serde_json::json!({ "script_id": script_id, "position": 0, "character": "JOHN" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"], "continue");
        assert_eq!(json["next_position"], 1);

        // Position 1 is JOHN's cue: the user speaks, nothing is synthesized.
        let (status, json) = post_json(
            build_app(state.clone()),
            "/api/v1/scenes/advance",
            serde_json::json!({ "script_id": script_id, "position": 1, "character": "JOHN" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"], "user_turn");
        assert_eq!(json["prompt"], "Hello there.");
        assert_eq!(json["next_position"], 3);

        // Past the end: complete.
        let (status, json) = post_json(
            build_app(state),
            "/api/v1/scenes/advance",
            serde_json::json!({ "script_id": script_id, "position": 99, "character": "JOHN" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"], "scene_complete");
    }

    #[tokio::test]
    async fn test_npc_turn_synthesizes_once_and_writes_audio() {
        let tts = Arc::new(CountingTts::new());
        let (state, script_id) = test_state(tts.clone());
        let audio_dir = state.config.audio_dir();

        // Position 1 is JOHN's cue; rehearsing as MARY makes it an NPC line.
        let (status, json) = post_json(
            build_app(state),
            "/api/v1/scenes/advance",
            serde_json::json!({ "script_id": script_id, "position": 1, "character": "MARY" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"], "play_audio");
        assert_eq!(json["display_text"], "JOHN: Hello there.");
        assert_eq!(json["next_position"], 3);
        assert_eq!(
            json["audio_url"],
            format!("/audio/{}_1.wav", script_id).as_str()
        );

        assert_eq!(tts.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tts.last_text.lock().unwrap().as_deref(), Some("Hello there."));
        assert!(audio_dir.join(format!("{}_1.wav", script_id)).exists());
    }

    #[tokio::test]
    async fn test_synthesis_failure_fails_the_turn() {
        let (state, script_id) = test_state(Arc::new(FailingTts));
        let (status, json) = post_json(
            build_app(state),
            "/api/v1/scenes/advance",
            serde_json::json!({ "script_id": script_id, "position": 1, "character": "MARY" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(json["error"].as_str().unwrap().contains("synthesis"));
    }

    #[tokio::test]
    async fn test_negative_position_is_rejected_by_the_extractor() {
        let (state, script_id) = test_state(Arc::new(PlaceholderTts));
        let (status, _) = post_json(
            build_app(state),
            "/api/v1/scenes/advance",
            serde_json::json!({ "script_id": script_id, "position": -1, "character": "JOHN" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_upload_without_file_field_is_rejected() {
        let (state, _) = test_state(Arc::new(PlaceholderTts));
        let body = "--BOUNDARY\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhello\r\n--BOUNDARY--\r\n";
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/scripts")
            .header("content-type", "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap();
        let res = build_app(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["error"].as_str().unwrap().contains("file"));
    }

    #[tokio::test]
    async fn test_delete_script_removes_it_and_its_audio() {
        let tts = Arc::new(CountingTts::new());
        let (state, script_id) = test_state(tts);
        let audio_dir = state.config.audio_dir();

        // Synthesize one NPC line so an artifact exists.
        let (status, _) = post_json(
            build_app(state.clone()),
            "/api/v1/scenes/advance",
            serde_json::json!({ "script_id": script_id, "position": 1, "character": "MARY" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let artifact = audio_dir.join(format!("{}_1.wav", script_id));
        assert!(artifact.exists());

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/scripts/{}", script_id))
            .body(Body::empty())
            .unwrap();
        let res = build_app(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!artifact.exists());

        // A second delete reports the script as unknown.
        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/scripts/{}", script_id))
            .body(Body::empty())
            .unwrap();
        let res = build_app(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
