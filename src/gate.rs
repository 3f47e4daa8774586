//! Request gate: decides, per navigational request, whether the caller may
//! see the page or gets redirected, based only on session presence and the
//! path's class. Nothing is remembered between requests.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;
use url::form_urlencoded;

use crate::auth::session::SessionKeys;

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const HOME_PATH: &str = "/";

const GUEST_ONLY: [&str; 2] = ["/sign-in", "/sign-up"];
const PUBLIC: [&str; 1] = ["/"];
const FROM_PROTECTED: &str = "from_protected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    GuestOnly,
    Public,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToSignIn,
    RedirectHome,
}

/// API routes, static assets and the favicon never reach the gate.
pub fn is_excluded(path: &str) -> bool {
    let rest = path.trim_start_matches('/');
    let first = rest.split('/').next().unwrap_or_default();
    matches!(first, "api" | "assets" | "images") || rest == "favicon.ico"
}

pub fn classify(path: &str) -> RouteClass {
    if GUEST_ONLY.contains(&path) {
        RouteClass::GuestOnly
    } else if PUBLIC.contains(&path) {
        RouteClass::Public
    } else {
        RouteClass::Protected
    }
}

pub fn decide(has_session: bool, class: RouteClass) -> GateDecision {
    match (has_session, class) {
        (false, RouteClass::Protected) => GateDecision::RedirectToSignIn,
        (true, RouteClass::GuestOnly) => GateDecision::RedirectHome,
        _ => GateDecision::Allow,
    }
}

/// Redirect location; the incoming query string is kept.
pub fn redirect_location(decision: GateDecision, query: Option<&str>) -> Option<String> {
    let pairs = form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .filter(|(k, _)| k != FROM_PROTECTED);
    let mut out = form_urlencoded::Serializer::new(String::new());
    out.extend_pairs(pairs);

    let path = match decision {
        GateDecision::Allow => return None,
        GateDecision::RedirectToSignIn => {
            out.append_pair(FROM_PROTECTED, "true");
            SIGN_IN_PATH
        }
        GateDecision::RedirectHome => HOME_PATH,
    };

    let query = out.finish();
    Some(if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    })
}

pub async fn request_gate(State(keys): State<SessionKeys>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if is_excluded(path) {
        return next.run(req).await;
    }

    let has_session = keys.resolve(req.headers()).is_some();
    let class = classify(path);
    let decision = decide(has_session, class);

    match redirect_location(decision, req.uri().query()) {
        Some(location) => {
            debug!(path = %path, ?class, has_session, %location, "gate redirect");
            Redirect::temporary(&location).into_response()
        }
        None => next.run(req).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_paths() {
        assert_eq!(classify("/sign-in"), RouteClass::GuestOnly);
        assert_eq!(classify("/sign-up"), RouteClass::GuestOnly);
        assert_eq!(classify("/"), RouteClass::Public);
        assert_eq!(classify("/dashboard"), RouteClass::Protected);
        assert_eq!(classify("/sign-in/extra"), RouteClass::Protected);
    }

    #[test]
    fn exclusions_match_whole_segments() {
        assert!(is_excluded("/api/auth/session"));
        assert!(is_excluded("/api"));
        assert!(is_excluded("/assets/app.css"));
        assert!(is_excluded("/images/logo.png"));
        assert!(is_excluded("/favicon.ico"));
        assert!(!is_excluded("/apiary"));
        assert!(!is_excluded("/dashboard"));
        assert!(!is_excluded("/"));
    }

    #[test]
    fn transition_table() {
        use GateDecision::*;
        use RouteClass::*;
        assert_eq!(decide(false, GuestOnly), Allow);
        assert_eq!(decide(false, Protected), RedirectToSignIn);
        assert_eq!(decide(false, Public), Allow);
        assert_eq!(decide(true, GuestOnly), RedirectHome);
        assert_eq!(decide(true, Protected), Allow);
        assert_eq!(decide(true, Public), Allow);
    }

    #[test]
    fn sign_in_redirect_marks_origin() {
        assert_eq!(
            redirect_location(GateDecision::RedirectToSignIn, None).as_deref(),
            Some("/sign-in?from_protected=true")
        );
        assert_eq!(
            redirect_location(GateDecision::RedirectToSignIn, Some("tab=2&from_protected=false"))
                .as_deref(),
            Some("/sign-in?tab=2&from_protected=true")
        );
    }

    #[test]
    fn home_redirect_keeps_query() {
        assert_eq!(
            redirect_location(GateDecision::RedirectHome, None).as_deref(),
            Some("/")
        );
        assert_eq!(
            redirect_location(GateDecision::RedirectHome, Some("ref=mail")).as_deref(),
            Some("/?ref=mail")
        );
        assert_eq!(redirect_location(GateDecision::Allow, Some("a=b")), None);
    }
}
