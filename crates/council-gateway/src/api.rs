use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use council_core::{Agent, CouncilError, Task, TaskKind};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Error returned by REST handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request.
    BadRequest(String),
    /// Failure from the orchestrator.
    Core(CouncilError),
}

impl From<CouncilError> for ApiError {
    fn from(e: CouncilError) -> Self {
        ApiError::Core(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(CouncilError::NotFound(_) | CouncilError::TaskNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Core(CouncilError::InvalidEngine { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Core(e) => e.to_string(),
        };
        if status.is_server_error() {
            warn!(error = %message, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Body of `POST /api/tasks`.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub prompt: String,
    #[serde(default)]
    pub kind: Option<TaskKind>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEngineRequest {
    pub engine: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSpecialtiesRequest {
    pub primary: String,
    #[serde(default)]
    pub secondary: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachKnowledgeRequest {
    pub display_name: String,
    pub source_path: String,
    pub content: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "council",
        "connections": state.connections.connection_count().await,
        "agents": state.orchestrator.list_agents().len(),
        "tasks": state.orchestrator.list_tasks().len(),
    }))
}

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<Agent>> {
    Json(state.orchestrator.list_agents())
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<Task>> {
    Json(state.orchestrator.list_tasks())
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    state
        .orchestrator
        .get_task(id)
        .map(Json)
        .ok_or(ApiError::Core(CouncilError::TaskNotFound(id)))
}

/// Accepts a task and returns it in `queued` state; execution continues in
/// the background.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    if body.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }
    let task = state
        .orchestrator
        .create_task(&body.prompt, body.kind.unwrap_or(TaskKind::Single));
    Ok((StatusCode::ACCEPTED, Json(task)))
}

pub async fn update_engine(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<UpdateEngineRequest>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(
        state.orchestrator.update_engine(&name, &body.engine).await?,
    ))
}

pub async fn update_specialties(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<UpdateSpecialtiesRequest>,
) -> ApiResult<Json<Agent>> {
    if body.primary.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "primary specialty must not be empty".to_string(),
        ));
    }
    Ok(Json(
        state
            .orchestrator
            .update_specialties(&name, &body.primary, body.secondary)
            .await?,
    ))
}

pub async fn attach_knowledge(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<AttachKnowledgeRequest>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(
        state
            .orchestrator
            .attach_knowledge(&name, &body.display_name, &body.source_path, &body.content)
            .await?,
    ))
}
