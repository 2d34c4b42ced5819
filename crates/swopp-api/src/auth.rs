use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};

use swopp_core::{Swopp, SwoppError, users};
use swopp_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use swopp_types::models::User;

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub swopp: Swopp,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    // Validate before paying for the hash
    users::normalize_email(&req.email)?;
    users::validate_name(&req.name)?;
    users::validate_password(&req.password)?;

    let password_hash = hash_password(&req.password)?;
    let user = state
        .swopp
        .register_user(&req.email, &req.name, password_hash, req.is_driver)
        .await?;

    let token = create_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            email: user.email,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let (user, hash) = state
        .swopp
        .credentials(&req.email)
        .await?
        .ok_or(ApiError::Unauthorized("invalid email or password"))?;

    let parsed_hash = PasswordHash::new(&hash).map_err(|e| {
        SwoppError::Storage(anyhow::anyhow!("corrupt password hash for {}: {}", user.email, e))
    })?;

    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!("Failed login for {}", user.email);
        return Err(ApiError::Unauthorized("invalid email or password"));
    }

    let token = create_token(&state, &user)?;
    info!("User logged in: {}", user.email);

    Ok(Json(LoginResponse {
        email: user.email,
        name: user.name,
        role: user.role,
        token,
    }))
}

/// Argon2id with a random salt, in PHC string form.
pub fn hash_password(password: &str) -> Result<String, SwoppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SwoppError::Storage(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn create_token(state: &AppStateInner, user: &User) -> Result<String, SwoppError> {
    let claims = Claims {
        sub: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| SwoppError::Storage(anyhow::anyhow!("token encoding failed: {}", e)))
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}
