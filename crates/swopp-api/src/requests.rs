use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

use swopp_core::Actor;
use swopp_types::api::{CreateRequestBody, TransitionBody, UpdateRequestBody};
use swopp_types::models::Request;

use crate::auth::AppState;
use crate::error::ApiResult;

/// POST /requests
pub async fn create_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<CreateRequestBody>,
) -> ApiResult<impl IntoResponse> {
    let request = state.swopp.create_request(&actor, body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /requests/{id}
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Request>> {
    Ok(Json(state.swopp.get_request(id).await?))
}

/// GET /requests/open
pub async fn list_open(State(state): State<AppState>) -> ApiResult<Json<Vec<Request>>> {
    Ok(Json(state.swopp.list_open_requests().await?))
}

/// GET /requests/mine
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<Vec<Request>>> {
    Ok(Json(state.swopp.list_sent_requests(&actor).await?))
}

/// GET /requests/assigned
pub async fn list_assigned(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<Vec<Request>>> {
    Ok(Json(state.swopp.list_assigned_requests(&actor).await?))
}

/// GET /admin/requests
pub async fn list_all(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<Vec<Request>>> {
    Ok(Json(state.swopp.list_requests(&actor).await?))
}

/// PUT /requests/{id}
pub async fn update_request(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<UpdateRequestBody>,
) -> ApiResult<Json<Request>> {
    Ok(Json(state.swopp.update_request_fields(id, &actor, body).await?))
}

/// POST /requests/{id}/status
pub async fn transition(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<TransitionBody>,
) -> ApiResult<Json<Request>> {
    let request = state
        .swopp
        .transition_status(id, &actor, body.status, body.driver_email)
        .await?;
    Ok(Json(request))
}

/// DELETE /requests/{id}
pub async fn delete_request(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<StatusCode> {
    let cleanup = state.swopp.delete_request(id, &actor).await?;
    if !cleanup.orphaned.is_empty() {
        warn!("Request {} left {} orphaned images", id, cleanup.orphaned.len());
    }
    Ok(StatusCode::NO_CONTENT)
}
