use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use swopp_core::Actor;

use crate::auth::{AppState, decode_token};
use crate::error::ApiError;

/// Extract and validate the bearer JWT, attaching the caller as an [`Actor`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized("missing bearer token"))?;

    let claims = decode_token(&state.jwt_secret, bearer.token())
        .ok_or(ApiError::Unauthorized("invalid or expired token"))?;

    req.extensions_mut().insert(Actor::from(claims));
    Ok(next.run(req).await)
}
