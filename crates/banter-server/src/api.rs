use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, Method},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use banter_shared::constants::UPLOAD_FIELD_NAME;
use banter_shared::protocol::{MarkReadRequest, MarkReadResponse, UploadResponse};
use banter_shared::types::{AttachmentKind, Message, UserId};

use crate::auth;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::gateway;
use crate::presence::PresenceBroadcaster;
use crate::registry::{ConnectionLinks, ConnectionRegistry};
use crate::router::DeliveryRouter;
use crate::store::MessageStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: MessageStore,
    pub registry: Arc<ConnectionRegistry>,
    pub links: Arc<ConnectionLinks>,
    pub presence: PresenceBroadcaster,
    pub router: Arc<DeliveryRouter>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let upload_dir = state.config.upload_dir.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(gateway::ws_handler))
        .route(
            "/api/chats/conversation/{user_a}/{user_b}",
            get(get_conversation),
        )
        .route("/api/chats/unreads", get(get_unread_counts))
        .route("/api/chats/mark-read", post(mark_conversation_read))
        .route("/api/chats/message/{id}", delete(delete_message))
        .route("/api/chats/upload", post(upload_attachment))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Bounded, ascending history between two users. The collaborator
/// contract carries no requester identity, so no credential is checked.
async fn get_conversation(
    State(state): State<AppState>,
    Path((user_a, user_b)): Path<(i64, i64)>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let messages = state
        .store
        .conversation(UserId(user_a), UserId(user_b))
        .await?;
    Ok(Json(messages))
}

/// Unread counts for the authenticated caller, keyed by sender id.
async fn get_unread_counts(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, i64>>, ServerError> {
    let principal = auth::require_auth(&headers, &state.config.jwt_secret)?;
    let counts = state.store.unread_by_sender(principal.id).await?;
    Ok(Json(
        counts
            .into_iter()
            .map(|(sender, count)| (sender.to_string(), count))
            .collect(),
    ))
}

/// Bulk-mark a conversation read for the authenticated caller.
async fn mark_conversation_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, ServerError> {
    let principal = auth::require_auth(&headers, &state.config.jwt_secret)?;
    let other = request
        .other_id
        .ok_or_else(|| ServerError::BadRequest("Missing other_id".into()))?;

    let updated = state
        .store
        .mark_conversation_read(principal.id, other)
        .await?;
    Ok(Json(MarkReadResponse {
        updated: updated as u64,
    }))
}

/// Soft-delete a message (sender only), then notify both parties' live
/// handles so open views replace the record in place.
async fn delete_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Message>, ServerError> {
    let principal = auth::require_auth(&headers, &state.config.jwt_secret)?;

    let message = state.store.soft_delete(id, principal.id).await?;
    state.router.notify_deleted(&message).await;

    info!(message = id, user = %principal.id, "message soft-deleted");
    Ok(Json(message))
}

/// Accept an attachment upload and hand back a reference plus the kind
/// inferred from the part's content type.
async fn upload_attachment(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }

        let file_type = field
            .content_type()
            .map(AttachmentKind::from_content_type)
            .unwrap_or(AttachmentKind::File);
        let filename = storage_filename(field.file_name());

        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;

        tokio::fs::create_dir_all(&state.config.upload_dir)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to create upload dir: {e}")))?;
        tokio::fs::write(state.config.upload_dir.join(&filename), &data)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to write upload: {e}")))?;

        let file_url = format!("{}/uploads/{}", state.config.public_base_url, filename);

        info!(
            filename = %filename,
            size = data.len(),
            kind = %file_type,
            "attachment uploaded"
        );

        return Ok(Json(UploadResponse {
            file_url,
            file_type,
            filename,
        }));
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

/// Build a collision-free on-disk name, keeping only a harmless ASCII
/// extension from the client-supplied filename.
fn storage_filename(original: Option<&str>) -> String {
    let id = Uuid::new_v4();
    let extension = original
        .and_then(|name| FsPath::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match extension {
        Some(ext) => format!("{id}.{}", ext.to_lowercase()),
        None => id.to_string(),
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting gateway HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
