use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Dimensions, ItemType, RequestStatus, Role};

// -- JWT Claims --

/// JWT claims issued on register/login and decoded by the bearer middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account email, the identity key.
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub is_driver: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub token: String,
}

// -- Users --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub is_driver: Option<bool>,
}

// -- Requests --

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRequestBody {
    /// Defaults to the caller. Only an admin may name someone else.
    pub sender_email: Option<String>,
    #[serde(default)]
    pub pickup: String,
    #[serde(default)]
    pub dropoff: String,
    pub description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub alternate_date: Option<DateTime<Utc>>,
}

/// Editable fields of a `Draft` request. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateRequestBody {
    pub pickup: Option<String>,
    pub dropoff: Option<String>,
    pub description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub alternate_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransitionBody {
    pub status: RequestStatus,
    pub driver_email: Option<String>,
}

// -- Items --

/// Item fields supplied on create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFields {
    pub name: String,
    pub item_type: ItemType,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(flatten)]
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemFields {
    pub request_id: i64,
    #[serde(flatten)]
    pub fields: ItemFields,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
