use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{items, requests, users};

/// Headroom for the JSON part and multipart framing around an image.
const FORM_OVERHEAD: usize = 64 * 1024;

/// Assemble the full API.
///
/// With `public_reads`, fetching requests, items and images by id needs no
/// token; otherwise those routes sit behind the bearer middleware too.
pub fn router(state: AppState, public_reads: bool) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.swopp.policy().max_image_bytes + FORM_OVERHEAD);

    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let read_routes = Router::new()
        .route("/requests/open", get(requests::list_open))
        .route("/requests/{id}", get(requests::get_request))
        .route("/items/{id}", get(items::list_items))
        .route("/items/single/{id}", get(items::get_item))
        .route("/items/image/{filename}", get(items::get_image));

    let protected_routes = Router::new()
        .route("/requests", post(requests::create_request))
        .route("/requests/mine", get(requests::list_mine))
        .route("/requests/assigned", get(requests::list_assigned))
        .route(
            "/requests/{id}",
            put(requests::update_request).delete(requests::delete_request),
        )
        .route("/requests/{id}/status", post(requests::transition))
        .route("/items", post(items::create_item).layer(upload_limit.clone()))
        .route(
            "/items/{id}",
            put(items::update_item)
                .layer(upload_limit.clone())
                .delete(items::delete_item),
        )
        .route("/users/me", get(users::me))
        .route("/users/{email}", get(users::get_user).put(users::update_user))
        .route("/users/{email}/picture", put(users::set_picture).layer(upload_limit))
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/{email}", delete(users::delete_user))
        .route("/admin/requests", get(requests::list_all));

    let (public_routes, protected_routes) = if public_reads {
        (read_routes, protected_routes)
    } else {
        (Router::new(), protected_routes.merge(read_routes))
    };

    let protected_routes = protected_routes
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    Router::new()
        .merge(auth_routes)
        .merge(public_routes.with_state(state))
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
