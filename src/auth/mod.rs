use crate::state::AppState;
use axum::Router;

pub mod cookies;
pub mod handlers;
pub mod oauth;
pub mod password;
pub mod providers;
pub mod repo;
pub mod repo_types;
pub mod session;
pub mod token;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
