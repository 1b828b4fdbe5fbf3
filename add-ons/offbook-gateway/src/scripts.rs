//! Script lifecycle handlers: upload, inspect, delete.
//!
//! POST /api/v1/scripts uploads a screenplay PDF (multipart field `file`),
//! parses it and derives the cast list.
//! GET /api/v1/scripts/:script_id returns metadata including the cast.
//! DELETE /api/v1/scripts/:script_id removes the script and its artifacts.

use {
    axum::extract::{Multipart, Path, State},
    axum::http::StatusCode,
    axum::Json,
    offbook_core::{extract_characters, parse_script_from_pdf, CoreError},
    std::sync::Arc,
    tracing,
};

/// POST /api/v1/scripts — ingest a screenplay. The PDF is staged on disk,
/// parsed into lines, scanned for characters and stored under a fresh id.
pub async fn upload_script_post(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                file_name = field.file_name().map(String::from);
                match field.bytes().await {
                    Ok(b) => file_bytes = Some(b.to_vec()),
                    // An over-limit body surfaces here; keep its 413.
                    Err(e) => {
                        return (
                            e.status(),
                            Json(serde_json::json!({ "error": format!("Upload read failed: {}", e.body_text()) })),
                        );
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return (
                    e.status(),
                    Json(serde_json::json!({ "error": format!("Malformed multipart body: {}", e.body_text()) })),
                );
            }
        }
    }

    let bytes = match file_bytes {
        Some(b) if !b.is_empty() => b,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Multipart field 'file' (the script PDF) is required." })),
            );
        }
    };

    // Title from the upload name, extension dropped.
    let title = file_name
        .as_deref()
        .and_then(|n| std::path::Path::new(n).file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|t| !t.trim().is_empty());

    // The parser reads from a path, so stage the upload before parsing.
    let staging = state
        .config
        .uploads_dir()
        .join(format!("{}.pdf", uuid::Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&staging, &bytes).await {
        return crate::internal_error(format!("Staging upload failed: {}", e));
    }

    let parse_path = staging.clone();
    let parsed = tokio::task::spawn_blocking(move || {
        let lines = parse_script_from_pdf(&parse_path)?;
        let characters = extract_characters(&lines);
        Ok::<_, CoreError>((lines, characters))
    })
    .await;

    let (lines, characters) = match parsed {
        Ok(Ok(v)) => v,
        Ok(Err(e)) => {
            let _ = tokio::fs::remove_file(&staging).await;
            tracing::warn!(target: "offbook::ingest", "Script parse failed: {}", e);
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "error": format!("Could not parse PDF: {}", e) })),
            );
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&staging).await;
            return crate::internal_error(format!("Parse task failed: {}", e));
        }
    };

    let store = Arc::clone(&state.store);
    let ttl_ms = state.config.script_ttl_ms();
    let insert_title = title.clone();
    let inserted = tokio::task::spawn_blocking(move || {
        store.insert_script(insert_title.as_deref(), &lines, &characters, ttl_ms)
    })
    .await;

    let row = match inserted {
        Ok(Ok(r)) => r,
        Ok(Err(e)) => {
            let _ = tokio::fs::remove_file(&staging).await;
            return crate::internal_error(format!("Storage: {}", e));
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&staging).await;
            return crate::internal_error(format!("Storage task failed: {}", e));
        }
    };

    // Keep the PDF under the script id so deletion can find it later.
    let final_path = state.config.uploads_dir().join(format!("{}.pdf", row.id));
    if let Err(e) = tokio::fs::rename(&staging, &final_path).await {
        tracing::warn!(target: "offbook::ingest", "Keeping staged upload, rename failed: {}", e);
    }

    tracing::info!(
        target: "offbook::ingest",
        "Script {} ingested: {} lines, {} character(s)",
        row.id,
        row.line_count,
        row.characters.len()
    );
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "script_id": row.id,
            "title": row.title,
            "characters": row.characters,
            "line_count": row.line_count,
        })),
    )
}

/// GET /api/v1/scripts/:script_id — metadata and the sorted cast list.
pub async fn script_get(
    State(state): State<crate::AppState>,
    Path(script_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let store = Arc::clone(&state.store);
    let lookup_id = script_id.clone();
    let row = match tokio::task::spawn_blocking(move || store.get_script(&lookup_id)).await {
        Ok(Ok(r)) => r,
        Ok(Err(e)) => return crate::internal_error(format!("Storage: {}", e)),
        Err(e) => return crate::internal_error(format!("Storage task failed: {}", e)),
    };

    match row {
        Some(r) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "script_id": r.id,
                "title": r.title,
                "characters": r.characters,
                "line_count": r.line_count,
                "created_at_ms": r.created_at_ms,
                "expires_at_ms": r.expires_at_ms,
            })),
        ),
        None => crate::script_not_found(&script_id),
    }
}

/// DELETE /api/v1/scripts/:script_id — remove the script, its lines and
/// every artifact it left on disk.
pub async fn script_delete(
    State(state): State<crate::AppState>,
    Path(script_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let store = Arc::clone(&state.store);
    let delete_id = script_id.clone();
    let deleted = match tokio::task::spawn_blocking(move || store.delete_script(&delete_id)).await {
        Ok(Ok(d)) => d,
        Ok(Err(e)) => return crate::internal_error(format!("Storage: {}", e)),
        Err(e) => return crate::internal_error(format!("Storage task failed: {}", e)),
    };

    if !deleted {
        return crate::script_not_found(&script_id);
    }
    crate::remove_script_artifacts(&state.config, &script_id);
    tracing::info!(target: "offbook::store", "Script {} deleted", script_id);

    (
        StatusCode::OK,
        Json(serde_json::json!({ "script_id": script_id, "deleted": true })),
    )
}
