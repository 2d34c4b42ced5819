//! HTTP surface: bearer auth, handlers and router assembly.

pub mod auth;
pub mod error;
pub mod items;
pub mod middleware;
pub mod requests;
pub mod routes;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
