use std::collections::BTreeMap;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, Query, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::CookieJar;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        cookies,
        password::hash_password,
        providers::{authorize_credentials, authorize_oauth},
        repo_types::NewUser,
        session::{
            apply_update, build_token, materialize, redirect_after_login, AuthSession,
            MaybeSession, SessionKeys, SessionUpdate,
        },
    },
    error::{ApiError, EMAIL_TAKEN},
    state::AppState,
    validation::{
        auth::{LoginInput, RegisterInput, LOGIN, REGISTER},
        validate, ValidationErrors,
    },
};

const OAUTH_FAILURE_REDIRECT: &str = "/sign-in?error=OAuthCallback";
const CREDENTIALS_FAILURE_REDIRECT: &str = "/sign-in?error=CredentialsSignin";
const SIGN_IN_PAGE: &str = "/sign-in";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/callback/credentials", post(credentials_callback))
        .route("/api/auth/signin/google", get(google_sign_in))
        .route("/api/auth/callback/google", get(google_callback))
        .route("/api/auth/session", get(get_session).post(update_session))
        .route("/api/auth/signout", post(sign_out))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// A request body from either a JSON client or a plain HTML form. Form
/// fields come through as JSON strings so both run the same validation.
#[derive(Debug)]
pub struct Submission {
    pub body: Value,
    pub from_form: bool,
}

#[async_trait]
impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(req.headers()) {
            let Form(fields) = Form::<BTreeMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Message(e.body_text()))?;
            let body: Map<String, Value> = fields
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            return Ok(Self {
                body: Value::Object(body),
                from_form: true,
            });
        }

        let Json(body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| ApiError::Message(e.body_text()))?;
        Ok(Self {
            body,
            from_form: false,
        })
    }
}

#[instrument(skip(state, submission))]
pub async fn sign_up(
    State(state): State<AppState>,
    submission: Submission,
) -> Result<Response, ApiError> {
    let Submission { body, from_form } = submission;

    if let Some(email) = body.get("email").and_then(Value::as_str) {
        if state.users.find_by_email(email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(ValidationErrors::single("email", EMAIL_TAKEN).into());
        }
    }

    let input: RegisterInput = validate(&REGISTER, &body)?;
    let password_hash = hash_password(&input.password)?;
    let user = state
        .users
        .create(NewUser {
            name: input.name,
            email: input.email,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    if from_form {
        return Ok(Redirect::to(SIGN_IN_PAGE).into_response());
    }
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".into(),
        }),
    )
        .into_response())
}

fn credentials_rejected(from_form: bool) -> Response {
    if from_form {
        Redirect::to(CREDENTIALS_FAILURE_REDIRECT).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

#[instrument(skip(state, jar, headers, submission))]
pub async fn credentials_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    submission: Result<Submission, ApiError>,
) -> Result<Response, ApiError> {
    let Ok(Submission { body, from_form }) = submission else {
        return Ok(credentials_rejected(is_form(&headers)));
    };
    let credentials: LoginInput = match validate(&LOGIN, &body) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = ?e, "sign-in payload rejected");
            return Ok(credentials_rejected(from_form));
        }
    };

    let Some(sign_in) = authorize_credentials(state.users.as_ref(), &credentials).await? else {
        return Ok(credentials_rejected(from_form));
    };

    let payload = build_token(state.users.as_ref(), sign_in).await?;
    let keys = SessionKeys::from_ref(&state);
    let jwt = keys.sign(&payload)?;

    let target = body
        .get("callbackUrl")
        .and_then(Value::as_str)
        .unwrap_or(state.config.base_url.as_str());
    let url = redirect_after_login(target, &state.config.base_url);

    let jar = jar.add(cookies::session_cookie(&jwt, keys.ttl, state.config.secure_cookies));
    if from_form {
        return Ok((jar, Redirect::to(&url)).into_response());
    }
    Ok((jar, Json(UrlResponse { url })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SignInParams {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[instrument(skip(state, jar))]
pub async fn google_sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<SignInParams>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let client = state
        .oauth
        .as_ref()
        .ok_or_else(|| ApiError::Message("Google sign-in is not configured".into()))?;

    let csrf: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let authorization_url = client.authorization_url(&csrf)?;

    let callback_url = params
        .callback_url
        .unwrap_or_else(|| state.config.base_url.clone());
    let [state_cookie, callback_cookie] =
        cookies::oauth_cookies(&csrf, &callback_url, state.config.secure_cookies);

    Ok((
        jar.add(state_cookie).add(callback_cookie),
        Redirect::temporary(&authorization_url),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[instrument(skip(state, jar, params))]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let callback_url = cookies::oauth_callback_url(&jar);
    let expected_state = cookies::oauth_state(&jar);
    let [clear_state, clear_callback] = cookies::clear_oauth_cookies();
    let jar = jar.add(clear_state).add(clear_callback);

    match complete_oauth(&state, params, expected_state).await {
        Ok(jwt) => {
            let keys = SessionKeys::from_ref(&state);
            let target = callback_url.unwrap_or_else(|| state.config.base_url.clone());
            let url = redirect_after_login(&target, &state.config.base_url);
            let jar = jar.add(cookies::session_cookie(&jwt, keys.ttl, state.config.secure_cookies));
            (jar, Redirect::temporary(&url))
        }
        Err(e) => {
            warn!(error = %e, "google sign-in failed");
            (jar, Redirect::temporary(OAUTH_FAILURE_REDIRECT))
        }
    }
}

async fn complete_oauth(
    state: &AppState,
    params: CallbackParams,
    expected_state: Option<String>,
) -> anyhow::Result<String> {
    let client = state
        .oauth
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("google sign-in is not configured"))?;
    if let Some(err) = params.error {
        anyhow::bail!("provider returned error: {err}");
    }
    match (params.state, expected_state) {
        (Some(received), Some(expected)) if received == expected => {}
        _ => anyhow::bail!("oauth state mismatch"),
    }
    let code = params
        .code
        .ok_or_else(|| anyhow::anyhow!("missing authorization code"))?;

    let profile = client.exchange_code(&code).await?;
    let sign_in = authorize_oauth(state.users.as_ref(), profile).await?;
    let payload = build_token(state.users.as_ref(), sign_in).await?;
    info!(user_id = %payload.id, "google sign-in");
    SessionKeys::from_ref(state).sign(&payload)
}

#[instrument(skip_all)]
pub async fn get_session(MaybeSession(claims): MaybeSession) -> Result<Json<Value>, ApiError> {
    let Some(claims) = claims else {
        return Ok(Json(json!({})));
    };
    let session = materialize(&claims)?;
    Ok(Json(serde_json::to_value(session).map_err(anyhow::Error::from)?))
}

#[instrument(skip_all)]
pub async fn update_session(
    State(state): State<AppState>,
    jar: CookieJar,
    AuthSession(claims): AuthSession,
    body: Result<Json<SessionUpdate>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(update) = body.map_err(|e| ApiError::Message(e.body_text()))?;
    let payload = apply_update(claims.user, update);

    let keys = SessionKeys::from_ref(&state);
    let jwt = keys.sign(&payload)?;
    let session = materialize(&keys.verify(&jwt)?)?;
    let jar = jar.add(cookies::session_cookie(&jwt, keys.ttl, state.config.secure_cookies));
    Ok((jar, Json(session)).into_response())
}

#[instrument(skip_all)]
pub async fn sign_out(jar: CookieJar, headers: HeaderMap) -> Response {
    let jar = jar.add(cookies::clear_session_cookie());
    if is_form(&headers) {
        return (jar, Redirect::to(SIGN_IN_PAGE)).into_response();
    }
    (
        jar,
        Json(UrlResponse {
            url: SIGN_IN_PAGE.into(),
        }),
    )
        .into_response()
}
