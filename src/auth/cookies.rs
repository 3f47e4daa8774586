use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use time::Duration;

pub const SESSION_COOKIE: &str = "session_token";
const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_CALLBACK_COOKIE: &str = "oauth_callback_url";
const OAUTH_PATH: &str = "/api/auth";

pub fn session_cookie(jwt: &str, ttl: std::time::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, jwt.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(ttl.as_secs() as i64))
        .build()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// CSRF state and post-login target for the OAuth round trip.
pub fn oauth_cookies(state: &str, callback_url: &str, secure: bool) -> [Cookie<'static>; 2] {
    [
        (OAUTH_STATE_COOKIE, state),
        (OAUTH_CALLBACK_COOKIE, callback_url),
    ]
    .map(|(name, value)| {
        Cookie::build((name, value.to_string()))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .path(OAUTH_PATH)
            .max_age(Duration::minutes(10))
            .build()
    })
}

pub fn clear_oauth_cookies() -> [Cookie<'static>; 2] {
    [OAUTH_STATE_COOKIE, OAUTH_CALLBACK_COOKIE].map(|name| {
        Cookie::build((name, ""))
            .path(OAUTH_PATH)
            .max_age(Duration::ZERO)
            .build()
    })
}

pub fn oauth_state(jar: &CookieJar) -> Option<String> {
    jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string())
}

pub fn oauth_callback_url(jar: &CookieJar) -> Option<String> {
    jar.get(OAUTH_CALLBACK_COOKIE).map(|c| c.value().to_string())
}
