//! Bare HTML placeholders for the navigational routes the gate protects.

use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};

use crate::{auth::session::MaybeSession, state::AppState};

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/sign-in", get(sign_in))
        .route("/sign-up", get(sign_up))
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub async fn home(MaybeSession(claims): MaybeSession) -> Html<String> {
    let greeting = match claims {
        Some(c) => format!(
            "<h1>Hi, {}!</h1><form method=\"post\" action=\"/api/auth/signout\"><button>Sign Out</button></form>",
            escape(&c.user.name)
        ),
        None => "<h1>Hi!</h1><a href=\"/sign-in\">Sign In</a>".to_string(),
    };
    Html(greeting)
}

pub async fn sign_in() -> Html<&'static str> {
    Html(
        "<h1>Sign In to Your Account</h1>\
         <form method=\"post\" action=\"/api/auth/callback/credentials\">\
         <input name=\"email\" type=\"email\"><input name=\"password\" type=\"password\">\
         <button>Sign In</button></form>\
         <a href=\"/api/auth/signin/google\">Sign in with Google</a>\
         <p>Don't have an account? <a href=\"/sign-up\">Sign Up</a>.</p>",
    )
}

pub async fn sign_up(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<h1>Create a New Account</h1>\
         <form method=\"post\" action=\"{}/auth/sign-up\">\
         <input name=\"name\"><input name=\"email\" type=\"email\">\
         <input name=\"password\" type=\"password\"><input name=\"passwordConfirm\" type=\"password\">\
         <button>Create Account</button></form>\
         <p>Already have an account? <a href=\"/sign-in\">Sign In</a>.</p>",
        escape(&state.config.api_base_url)
    ))
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
