//! Asset REST API Handlers
//!
//! Thin adapters: each handler turns the HTTP request into an
//! `OperationRequest`, dispatches it and serializes the `OperationResult`.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use fabric::{
    AssetOperation, AssetRouter, ErrorBody, ID_PARAM, OperationRequest, OperationResult,
    ResultBody, Session,
};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub router: AssetRouter,
    /// Kept so shutdown can close it once the listener stops
    pub session: Arc<Session>,
}

// ==================== Error Handling ====================

pub struct ApiError(pub StatusCode, pub Json<ErrorBody>);

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError(
            StatusCode::BAD_REQUEST,
            Json(ErrorBody { error: msg.into() }),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

/// Router outcome as an HTTP response.
pub struct LedgerResponse {
    pub operation: AssetOperation,
    pub result: OperationResult,
}

impl IntoResponse for LedgerResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.result.status.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self.result.body {
            ResultBody::Error(error) => ApiError(status, Json(ErrorBody { error })).into_response(),
            ResultBody::Payload(payload) => (
                status,
                [(header::CONTENT_TYPE, self.operation.payload_content_type())],
                payload,
            )
                .into_response(),
        }
    }
}

/// Empty bodies are absent; anything else must be JSON.
fn parse_body(body: &Bytes) -> Result<Option<serde_json::Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

async fn dispatch(
    state: &AppState,
    operation: AssetOperation,
    id: Option<String>,
    body: Option<&Bytes>,
) -> Result<LedgerResponse, ApiError> {
    let mut request = OperationRequest::new(operation);
    if let Some(id) = id {
        request = request.with_path_param(ID_PARAM, id);
    }
    if let Some(body) = body
        && let Some(value) = parse_body(body)?
    {
        request = request.with_body(value);
    }
    Ok(LedgerResponse {
        operation,
        result: state.router.dispatch(request).await,
    })
}

// ==================== Health Check ====================

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn index() -> &'static str {
    "Asset ledger service"
}

// ==================== Asset Handlers ====================

pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<LedgerResponse, ApiError> {
    dispatch(&state, AssetOperation::CreateAsset, None, Some(&body)).await
}

pub async fn read_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<LedgerResponse, ApiError> {
    dispatch(&state, AssetOperation::ReadAsset, Some(id), None).await
}

pub async fn update_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<LedgerResponse, ApiError> {
    dispatch(&state, AssetOperation::UpdateAsset, Some(id), Some(&body)).await
}

pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<LedgerResponse, ApiError> {
    dispatch(&state, AssetOperation::DeleteAsset, Some(id), None).await
}

pub async fn get_all_assets(
    State(state): State<Arc<AppState>>,
) -> Result<LedgerResponse, ApiError> {
    dispatch(&state, AssetOperation::GetAllAssets, None, None).await
}

/// Accepts its body on GET as well as POST.
pub async fn transfer_asset(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<LedgerResponse, ApiError> {
    dispatch(&state, AssetOperation::TransferAsset, None, Some(&body)).await
}
