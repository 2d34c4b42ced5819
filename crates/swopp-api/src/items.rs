use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use swopp_core::{Actor, ImageUpload};
use swopp_types::api::{CreateItemFields, ItemFields};
use swopp_types::models::Item;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Read an `item` JSON part and an optional `image` part. Other parts are
/// ignored, and a zero-length `image` part counts as no image.
pub(crate) async fn read_form<T: DeserializeOwned>(
    mut multipart: Multipart,
) -> ApiResult<(Option<T>, Option<ImageUpload>)> {
    let mut item = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("item") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable item part: {}", e)))?;
                let parsed = serde_json::from_str(&text)
                    .map_err(|e| ApiError::bad_request(format!("invalid item: {}", e)))?;
                item = Some(parsed);
            }
            Some("image") => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable image part: {}", e)))?;
                // an empty file input still submits a zero-length part
                if !bytes.is_empty() {
                    image = Some(ImageUpload::new(content_type, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    Ok((item, image))
}

/// POST /items (multipart: `item`, optional `image`)
pub async fn create_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let (item, image) = read_form::<CreateItemFields>(multipart).await?;
    let item = item.ok_or_else(|| ApiError::bad_request("missing item part"))?;
    let created = state.swopp.create_item(&actor, item, image).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /items/{id} (multipart: `item`, optional `image`)
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
    multipart: Multipart,
) -> ApiResult<Json<Item>> {
    let (fields, image) = read_form::<ItemFields>(multipart).await?;
    let fields = fields.ok_or_else(|| ApiError::bad_request("missing item part"))?;
    Ok(Json(state.swopp.update_item(id, &actor, fields, image).await?))
}

/// DELETE /items/{id}
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<StatusCode> {
    let cleanup = state.swopp.delete_item(id, &actor).await?;
    if !cleanup.orphaned.is_empty() {
        warn!("Item {} left an orphaned image", id);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /items/{request_id}
pub async fn list_items(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
) -> ApiResult<Json<Vec<Item>>> {
    Ok(Json(state.swopp.list_items_by_request(request_id).await?))
}

/// GET /items/single/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Item>> {
    Ok(Json(state.swopp.get_item(id).await?))
}

/// GET /items/image/{filename}
pub async fn get_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (bytes, content_type) = state.swopp.get_image(&filename).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
