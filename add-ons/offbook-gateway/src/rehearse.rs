//! Scene rehearsal handlers: begin a scene, then advance it turn by turn.
//!
//! POST /api/v1/scenes/begin confirms the script and hands back position 0.
//! POST /api/v1/scenes/advance classifies one position: skip it, prompt the
//! user, complete the scene, or synthesize an NPC line and return its audio URL.
//! The client carries the position; the gateway never tracks a session.

use {
    axum::extract::State,
    axum::http::StatusCode,
    axum::Json,
    offbook_core::turn::{advance, Turn},
    offbook_voice::voice_for_character,
    std::sync::Arc,
    tracing,
};

#[derive(serde::Deserialize)]
pub struct SceneBeginRequest {
    pub script_id: String,
    pub character: String,
}

#[derive(serde::Deserialize)]
pub struct SceneAdvanceRequest {
    pub script_id: String,
    pub position: u64,
    pub character: String,
}

/// POST /api/v1/scenes/begin — validate the script and character, start at 0.
pub async fn scene_begin_post(
    State(state): State<crate::AppState>,
    Json(body): Json<SceneBeginRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let character = body.character.trim().to_string();
    if character.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "A non-empty character is required." })),
        );
    }

    let store = Arc::clone(&state.store);
    let lookup_id = body.script_id.clone();
    let row = match tokio::task::spawn_blocking(move || store.get_script(&lookup_id)).await {
        Ok(Ok(r)) => r,
        Ok(Err(e)) => return crate::internal_error(format!("Storage: {}", e)),
        Err(e) => return crate::internal_error(format!("Storage task failed: {}", e)),
    };
    let row = match row {
        Some(r) => r,
        None => return crate::script_not_found(&body.script_id),
    };

    tracing::info!(target: "offbook::scene", "Scene begin: script {} as {}", row.id, character);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ready",
            "script_id": row.id,
            "character": character,
            "position": 0,
            "characters": row.characters,
        })),
    )
}

/// POST /api/v1/scenes/advance — one turn of the scene engine. NPC lines are
/// synthesized here and written under the audio dir; everything else is a
/// pure classification of the line at `position`.
pub async fn scene_advance_post(
    State(state): State<crate::AppState>,
    Json(body): Json<SceneAdvanceRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let character = body.character.trim().to_string();
    if character.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "A non-empty character is required." })),
        );
    }

    let store = Arc::clone(&state.store);
    let lookup_id = body.script_id.clone();
    let lines = match tokio::task::spawn_blocking(move || store.get_lines(&lookup_id)).await {
        Ok(Ok(l)) => l,
        Ok(Err(e)) => return crate::internal_error(format!("Storage: {}", e)),
        Err(e) => return crate::internal_error(format!("Storage task failed: {}", e)),
    };
    let lines = match lines {
        Some(l) => l,
        None => return crate::script_not_found(&body.script_id),
    };

    let position = usize::try_from(body.position).unwrap_or(usize::MAX);
    match advance(&lines, position, &character) {
        Turn::SceneComplete => (
            StatusCode::OK,
            Json(serde_json::json!({ "result": "scene_complete" })),
        ),
        Turn::Continue { next_position } => (
            StatusCode::OK,
            Json(serde_json::json!({ "result": "continue", "next_position": next_position })),
        ),
        Turn::UserTurn { prompt, next_position } => (
            StatusCode::OK,
            Json(serde_json::json!({
                "result": "user_turn",
                "prompt": prompt,
                "next_position": next_position,
            })),
        ),
        Turn::NpcLine { character: npc, text, next_position } => {
            let voice = voice_for_character(&npc);
            let audio = match state.tts.synthesize(&text, voice).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(
                        target: "offbook::scene",
                        script_id = %body.script_id,
                        position = body.position,
                        "Synthesis failed: {}",
                        e
                    );
                    return (
                        StatusCode::BAD_GATEWAY,
                        Json(serde_json::json!({ "error": format!("Speech synthesis failed: {}", e) })),
                    );
                }
            };

            let file_name = format!("{}_{}.{}", body.script_id, body.position, state.tts.file_extension());
            let path = state.config.audio_dir().join(&file_name);
            if let Err(e) = tokio::fs::write(&path, &audio).await {
                return crate::internal_error(format!("Audio write failed: {}", e));
            }

            tracing::info!(
                target: "offbook::scene",
                "NPC turn: {} with voice {} ({} bytes) -> {}",
                npc,
                voice,
                audio.len(),
                file_name
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "result": "play_audio",
                    "audio_url": format!("/audio/{}", file_name),
                    "display_text": format!("{}: {}", npc, text),
                    "next_position": next_position,
                })),
            )
        }
    }
}
