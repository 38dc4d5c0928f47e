use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use platform_client::{InMemorySessionRegistry, LabelSyncEvent, SessionProvider};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    labels::{
        reconciler::EventReconciler,
        service::{LabelError, LabelService},
        types::{CreateLabelRequest, CreatedLabel, EditLabelRequest, Label},
    },
};

#[derive(Clone)]
pub struct AppState {
    config: Config,
    service: Arc<LabelService>,
    reconciler: Arc<EventReconciler>,
    sessions: Arc<InMemorySessionRegistry>,
    started_at: chrono::DateTime<Utc>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: Config,
        service: Arc<LabelService>,
        reconciler: Arc<EventReconciler>,
        sessions: Arc<InMemorySessionRegistry>,
    ) -> Self {
        Self {
            config,
            service,
            reconciler,
            sessions,
            started_at: Utc::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/readyz", get(readiness))
        .route("/api/v1/session", get(session_status))
        .route("/api/v1/session/connect", post(connect_session))
        .route("/api/v1/session/disconnect", post(disconnect_session))
        .route("/api/v1/labels", get(list_labels).post(create_label))
        .route("/api/v1/labels/seed", post(seed_labels))
        .route("/api/v1/labels/sync", post(request_label_sync))
        .route(
            "/api/v1/labels/:label_id",
            put(edit_label).delete(delete_label),
        )
        .route("/api/v1/labels/:label_id/chats", get(get_labeled_chats))
        .route(
            "/api/v1/chats/:chat_jid/labels/:label_id",
            post(add_chat_label).delete(remove_chat_label),
        )
        .route(
            "/internal/v1/app-state/events",
            post(ingest_app_state_event),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = (Utc::now() - state.started_at).num_seconds();
    Json(HealthResponse {
        status: "ok",
        service: state.config.service_name.clone(),
        uptime_seconds,
    })
}

async fn readiness(State(state): State<AppState>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        status: "ready",
        service: state.config.service_name.clone(),
    })
}

async fn session_status(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let connected = state.sessions.is_connected(&user_id).await;
    Ok(Json(SessionResponse { user_id, connected }))
}

async fn connect_session(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ConnectSessionResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    state.sessions.connect(&user_id).await;
    let seeded_labels = if state.config.seed_on_connect {
        state
            .service
            .seed_defaults(&user_id)
            .await
            .map_err(ApiError::from_label)?
    } else {
        0
    };
    Ok(Json(ConnectSessionResponse {
        user_id,
        connected: true,
        seeded_labels,
    }))
}

async fn disconnect_session(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    state.sessions.disconnect(&user_id).await;
    Ok(Json(SessionResponse {
        user_id,
        connected: false,
    }))
}

async fn list_labels(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<LabelListResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let labels = state
        .service
        .list_active_labels(&user_id)
        .await
        .map_err(ApiError::from_label)?;
    let count = labels.len();
    Ok(Json(LabelListResponse { labels, count }))
}

async fn create_label(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<CreateLabelBody>,
) -> Result<(StatusCode, Json<CreatedLabel>), ApiError> {
    let user_id = require_user(&headers)?;
    let created = state
        .service
        .create_label(
            &user_id,
            CreateLabelRequest {
                name: body.name,
                color: body.color,
            },
        )
        .await
        .map_err(ApiError::from_label)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn edit_label(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(label_id): Path<String>,
    Json(body): Json<EditLabelBody>,
) -> Result<StatusCode, ApiError> {
    let user_id = require_user(&headers)?;
    state
        .service
        .edit_label(
            &user_id,
            EditLabelRequest {
                label_id,
                name: body.name,
                color: body.color,
            },
        )
        .await
        .map_err(ApiError::from_label)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_label(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(label_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = require_user(&headers)?;
    state
        .service
        .delete_label(&user_id, &label_id)
        .await
        .map_err(ApiError::from_label)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn seed_labels(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<SeedResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let seeded = state
        .service
        .seed_defaults(&user_id)
        .await
        .map_err(ApiError::from_label)?;
    Ok(Json(SeedResponse { seeded }))
}

async fn request_label_sync(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SyncAcceptedResponse>), ApiError> {
    let user_id = require_user(&headers)?;
    state
        .service
        .request_sync(&user_id)
        .await
        .map_err(ApiError::from_label)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SyncAcceptedResponse {
            status: "sync_requested",
        }),
    ))
}

async fn get_labeled_chats(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(label_id): Path<String>,
) -> Result<Json<LabeledChatsResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let chats = state
        .service
        .labeled_chats(&user_id, &label_id)
        .await
        .map_err(ApiError::from_label)?;
    let count = chats.len();
    Ok(Json(LabeledChatsResponse {
        label_id,
        chats,
        count,
    }))
}

async fn add_chat_label(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path((chat_jid, label_id)): Path<(String, String)>,
) -> Result<Json<AssociationResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let association = state
        .service
        .associate(&user_id, &chat_jid, &label_id)
        .await
        .map_err(ApiError::from_label)?;
    Ok(Json(AssociationResponse {
        chat_jid: association.chat_jid,
        label_id: association.label_id,
        labeled: true,
    }))
}

async fn remove_chat_label(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path((chat_jid, label_id)): Path<(String, String)>,
) -> Result<Json<AssociationResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let association = state
        .service
        .disassociate(&user_id, &chat_jid, &label_id)
        .await
        .map_err(ApiError::from_label)?;
    Ok(Json(AssociationResponse {
        chat_jid: association.chat_jid,
        label_id: association.label_id,
        labeled: false,
    }))
}

async fn ingest_app_state_event(
    State(state): State<AppState>,
    Json(body): Json<IngestEventBody>,
) -> Result<Json<EventOutcomeResponse>, ApiError> {
    if body.user_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("user_id is required".to_string()));
    }
    let outcome = state
        .reconciler
        .handle_event(&body.user_id, body.event)
        .await;
    Ok(Json(EventOutcomeResponse {
        outcome: outcome.kind(),
    }))
}

fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if user_id.is_empty() {
        return Err(ApiError::Unauthorized);
    }
    Ok(user_id.to_string())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
    uptime_seconds: i64,
}

#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
    service: String,
}

#[derive(Serialize)]
struct SessionResponse {
    user_id: String,
    connected: bool,
}

#[derive(Serialize)]
struct ConnectSessionResponse {
    user_id: String,
    connected: bool,
    seeded_labels: usize,
}

#[derive(Deserialize)]
struct CreateLabelBody {
    name: String,
    #[serde(default)]
    color: i32,
}

#[derive(Deserialize)]
struct EditLabelBody {
    name: String,
    #[serde(default)]
    color: i32,
}

#[derive(Serialize)]
struct LabelListResponse {
    labels: Vec<Label>,
    count: usize,
}

#[derive(Serialize)]
struct SeedResponse {
    seeded: usize,
}

#[derive(Serialize)]
struct SyncAcceptedResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct LabeledChatsResponse {
    label_id: String,
    chats: Vec<String>,
    count: usize,
}

#[derive(Serialize)]
struct AssociationResponse {
    chat_jid: String,
    label_id: String,
    labeled: bool,
}

#[derive(Deserialize)]
struct IngestEventBody {
    user_id: String,
    event: LabelSyncEvent,
}

#[derive(Serialize)]
struct EventOutcomeResponse {
    outcome: &'static str,
}

#[derive(Debug)]
enum ApiError {
    Unauthorized,
    InvalidRequest(String),
    SessionUnavailable(String),
    UpstreamSend(String),
}

impl ApiError {
    fn from_label(error: LabelError) -> Self {
        let code = error.code();
        match error {
            LabelError::Validation(message) => {
                tracing::debug!(reason_code = code, reason = %message, "label request rejected");
                Self::InvalidRequest(message)
            }
            error @ LabelError::SessionUnavailable(_) => {
                tracing::warn!(
                    reason_code = code,
                    reason = %error,
                    "label request without a connected session"
                );
                Self::SessionUnavailable(error.message())
            }
            error @ LabelError::RemoteSend(_) => {
                tracing::warn!(reason_code = code, reason = %error, "label patch rejected upstream");
                Self::UpstreamSend(error.message())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "x-user-id header is required",
                })),
            )
                .into_response(),
            Self::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "invalid_request",
                    "message": message,
                })),
            )
                .into_response(),
            Self::SessionUnavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "session_unavailable",
                    "message": message,
                })),
            )
                .into_response(),
            Self::UpstreamSend(message) => (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": "remote_send_failed",
                    "message": message,
                })),
            )
                .into_response(),
        }
    }
}
