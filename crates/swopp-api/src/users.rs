use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use tracing::warn;

use swopp_core::Actor;
use swopp_types::api::UpdateUserRequest;
use swopp_types::models::User;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::items::read_form;

/// GET /users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.swopp.get_user(&actor.email).await?))
}

/// GET /users/{email}
pub async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.swopp.get_user(&email).await?))
}

/// PUT /users/{email}
pub async fn update_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Extension(actor): Extension<Actor>,
    Json(update): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.swopp.update_user(&email, &actor, update).await?))
}

/// PUT /users/{email}/picture (multipart: `image`)
pub async fn set_picture(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Extension(actor): Extension<Actor>,
    multipart: Multipart,
) -> ApiResult<Json<User>> {
    let (_, image) = read_form::<serde_json::Value>(multipart).await?;
    let image = image.ok_or_else(|| ApiError::bad_request("missing image part"))?;
    Ok(Json(state.swopp.set_picture(&email, &actor, image).await?))
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.swopp.list_users(&actor).await?))
}

/// DELETE /admin/users/{email}
pub async fn delete_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<StatusCode> {
    let cleanup = state.swopp.delete_user(&email, &actor).await?;
    if !cleanup.orphaned.is_empty() {
        warn!("User {} left {} orphaned images", email, cleanup.orphaned.len());
    }
    Ok(StatusCode::NO_CONTENT)
}
