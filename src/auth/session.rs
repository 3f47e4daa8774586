use std::time::Duration;

use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::{
    cookies::SESSION_COOKIE,
    providers::SignIn,
    repo::UserStore,
    token::rotate_token,
};
use crate::{config::JwtConfig, state::AppState};

/// What the signed session token carries about the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub token: String,
    pub avatar: Option<String>,
    /// Provider picture; surfaced as the base session `image`.
    pub picture: Option<String>,
}

/// JWT claims: the payload plus the standard registered claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(flatten)]
    pub user: SessionPayload,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

/// Session as exposed to the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: SessionUser,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub token: String,
    pub avatar: Option<String>,
    pub image: Option<String>,
}

/// Fields a signed-in user may patch without signing in again.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// Session JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        SessionKeys::from_config(&state.config.jwt)
    }
}

impl SessionKeys {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::from_secs(config.ttl_minutes * 60),
        }
    }

    pub fn sign(&self, payload: &SessionPayload) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = SessionClaims {
            user: payload.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let jwt = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %payload.id, "session signed");
        Ok(jwt)
    }

    pub fn verify(&self, jwt: &str) -> anyhow::Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<SessionClaims>(jwt, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Decode the session carried by a request, if any. A bad or expired
    /// token counts as no session.
    pub fn resolve(&self, headers: &HeaderMap) -> Option<SessionClaims> {
        let jar = CookieJar::from_headers(headers);
        let jwt = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .or_else(|| {
                headers
                    .get(axum::http::header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(str::to_string)
            })?;

        match self.verify(&jwt) {
            Ok(claims) => Some(claims),
            Err(e) => {
                warn!(error = %e, "discarding invalid session token");
                None
            }
        }
    }
}

/// Token-building phase, run once per sign-in.
///
/// Credentials identities already carry their rotated token. OAuth
/// identities are re-read from the store, then get a freshly rotated token.
pub async fn build_token(users: &dyn UserStore, sign_in: SignIn) -> anyhow::Result<SessionPayload> {
    match sign_in {
        SignIn::Credentials(identity) => Ok(SessionPayload {
            id: identity.id,
            name: identity.name,
            email: identity.email,
            token: identity.token,
            avatar: identity.avatar,
            picture: None,
        }),
        SignIn::OAuth(profile) => {
            let user = users
                .find_by_email(&profile.email)
                .await?
                .with_context(|| format!("no account for oauth email {}", profile.email))?;
            let token = rotate_token(users, user.id).await?;
            Ok(SessionPayload {
                id: user.id,
                name: user.name,
                email: user.email,
                token,
                avatar: user.avatar,
                picture: profile.picture,
            })
        }
    }
}

/// Patch name and/or avatar. The token value is never touched; empty values
/// are ignored.
pub fn apply_update(mut payload: SessionPayload, update: SessionUpdate) -> SessionPayload {
    if let Some(name) = update.name.filter(|n| !n.is_empty()) {
        payload.name = name;
    }
    if let Some(avatar) = update.avatar.filter(|a| !a.is_empty()) {
        payload.avatar = Some(avatar);
    }
    payload
}

/// Session-materializing phase, run on every request that reads the session.
pub fn materialize(claims: &SessionClaims) -> anyhow::Result<Session> {
    let expires = OffsetDateTime::from_unix_timestamp(claims.exp as i64)
        .context("session exp out of range")?;
    let user = &claims.user;
    Ok(Session {
        user: SessionUser {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            token: user.token.clone(),
            avatar: user.avatar.clone(),
            image: user.picture.clone(),
        },
        expires,
    })
}

/// Post sign-in destination. Anything on our own origin goes home with a
/// `from_login` marker; external URLs are returned as given.
pub fn redirect_after_login(target: &str, base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    let home = format!("{base_url}/?from_login=true");

    if target.starts_with('/') && !target.starts_with("//") {
        return home;
    }
    let (Ok(target_url), Ok(base)) = (Url::parse(target), Url::parse(base_url)) else {
        return home;
    };
    if target_url.origin() == base.origin() {
        home
    } else {
        target.to_string()
    }
}

/// Current session, if the request carries a valid one.
pub struct MaybeSession(pub Option<SessionClaims>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        Ok(MaybeSession(keys.resolve(&parts.headers)))
    }
}

/// Current session; rejects with 401 when absent.
pub struct AuthSession(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        keys.resolve(&parts.headers)
            .map(AuthSession)
            .ok_or((StatusCode::UNAUTHORIZED, "Not authenticated".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        oauth::OAuthProfile, password::hash_password, providers::Identity,
        repo::memory::MemoryUserStore, repo_types::NewUser,
    };
    use axum::http::{header, HeaderValue};

    fn keys(issuer: &str) -> SessionKeys {
        SessionKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: issuer.into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        })
    }

    fn payload() -> SessionPayload {
        SessionPayload {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            token: "tok-1".into(),
            avatar: None,
            picture: None,
        }
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let keys = keys("test-issuer");
        let payload = payload();
        let jwt = keys.sign(&payload).unwrap();
        let claims = keys.verify(&jwt).unwrap();
        assert_eq!(claims.user, payload);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn verify_rejects_foreign_issuer() {
        let jwt = keys("good-iss").sign(&payload()).unwrap();
        assert!(keys("bad-iss").verify(&jwt).is_err());
    }

    #[test]
    fn resolve_reads_cookie_then_bearer() {
        let keys = keys("iss");
        let jwt = keys.sign(&payload()).unwrap();

        let mut headers = HeaderMap::new();
        assert!(keys.resolve(&headers).is_none());

        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={jwt}")).unwrap(),
        );
        assert!(keys.resolve(&headers).is_some());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {jwt}")).unwrap(),
        );
        assert!(keys.resolve(&headers).is_some());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("session_token=garbage"),
        );
        assert!(keys.resolve(&headers).is_none());
    }

    #[tokio::test]
    async fn credentials_identity_folds_directly() {
        let store = MemoryUserStore::default();
        let identity = Identity {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            avatar: Some("ada.png".into()),
            token: "fresh".into(),
        };
        let payload = build_token(&store, SignIn::Credentials(identity.clone()))
            .await
            .unwrap();
        assert_eq!(payload.id, identity.id);
        assert_eq!(payload.token, "fresh");
        assert_eq!(payload.avatar.as_deref(), Some("ada.png"));
    }

    #[tokio::test]
    async fn oauth_identity_is_refetched_and_rotated() {
        let store = MemoryUserStore::default();
        let user = store
            .create(NewUser {
                name: "Grace".into(),
                email: "grace@example.com".into(),
                password_hash: hash_password("irrelevant").unwrap(),
            })
            .await
            .unwrap();

        let profile = OAuthProfile {
            email: "grace@example.com".into(),
            name: Some("Rear Admiral Grace".into()),
            picture: Some("https://img.test/g.png".into()),
        };
        let payload = build_token(&store, SignIn::OAuth(profile)).await.unwrap();
        assert_eq!(payload.id, user.id);
        assert_eq!(payload.name, "Grace");
        assert_eq!(payload.picture.as_deref(), Some("https://img.test/g.png"));
        assert_eq!(store.token_of("grace@example.com"), Some(payload.token));
    }

    #[tokio::test]
    async fn oauth_identity_without_account_fails() {
        let store = MemoryUserStore::default();
        let profile = OAuthProfile {
            email: "ghost@example.com".into(),
            name: None,
            picture: None,
        };
        assert!(build_token(&store, SignIn::OAuth(profile)).await.is_err());
    }

    #[test]
    fn update_patches_only_given_fields() {
        let original = payload();
        let updated = apply_update(
            original.clone(),
            SessionUpdate {
                name: Some("Countess".into()),
                avatar: None,
            },
        );
        assert_eq!(updated.name, "Countess");
        assert_eq!(updated.token, original.token);
        assert_eq!(updated.avatar, None);

        let updated = apply_update(
            updated,
            SessionUpdate {
                name: Some(String::new()),
                avatar: Some("new.png".into()),
            },
        );
        assert_eq!(updated.name, "Countess");
        assert_eq!(updated.avatar.as_deref(), Some("new.png"));
        assert_eq!(updated.token, original.token);
    }

    #[test]
    fn materialize_copies_payload() {
        let keys = keys("iss");
        let payload = SessionPayload {
            picture: Some("pic.png".into()),
            ..payload()
        };
        let claims = keys.verify(&keys.sign(&payload).unwrap()).unwrap();
        let session = materialize(&claims).unwrap();
        assert_eq!(session.user.id, payload.id);
        assert_eq!(session.user.token, payload.token);
        assert_eq!(session.user.image.as_deref(), Some("pic.png"));
        assert_eq!(session.expires.unix_timestamp() as usize, claims.exp);
    }

    #[test]
    fn in_origin_targets_go_home_with_marker() {
        let base = "http://localhost:8080";
        assert_eq!(
            redirect_after_login("http://localhost:8080/dashboard?tab=1", base),
            "http://localhost:8080/?from_login=true"
        );
        assert_eq!(
            redirect_after_login("/settings", base),
            "http://localhost:8080/?from_login=true"
        );
        assert_eq!(
            redirect_after_login(base, "http://localhost:8080/"),
            "http://localhost:8080/?from_login=true"
        );
    }

    #[test]
    fn external_targets_pass_through() {
        let base = "http://localhost:8080";
        for target in ["https://docs.example.org/welcome", "http://localhost:9090/"] {
            assert_eq!(redirect_after_login(target, base), target);
        }
    }

    #[test]
    fn unparseable_targets_go_home() {
        let base = "http://localhost:8080";
        assert_eq!(
            redirect_after_login("//evil.example.com/x", base),
            "http://localhost:8080/?from_login=true"
        );
        assert_eq!(
            redirect_after_login("not a url", base),
            "http://localhost:8080/?from_login=true"
        );
    }
}
