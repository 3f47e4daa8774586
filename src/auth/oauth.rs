use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::GoogleConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Identity asserted by an OAuth provider. Only built from a verified email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Authorization-code client for one OAuth provider.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Where to send the browser, carrying our CSRF `state`.
    fn authorization_url(&self, state: &str) -> anyhow::Result<String>;

    /// Trade an authorization code for the user's verified profile.
    async fn exchange_code(&self, code: &str) -> anyhow::Result<OAuthProfile>;
}

pub struct GoogleClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleClient {
    pub fn new(config: &GoogleConfig, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: format!("{base_url}/api/auth/callback/google"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

impl TryFrom<GoogleUserInfo> for OAuthProfile {
    type Error = anyhow::Error;

    fn try_from(info: GoogleUserInfo) -> anyhow::Result<Self> {
        let email = info.email.context("google profile has no email")?;
        if !info.email_verified {
            anyhow::bail!("google email is not verified");
        }
        Ok(OAuthProfile {
            email,
            name: info.name,
            picture: info.picture,
        })
    }
}

#[async_trait]
impl OAuthClient for GoogleClient {
    fn authorization_url(&self, state: &str) -> anyhow::Result<String> {
        let url = Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<OAuthProfile> {
        let token: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("google token request")?
            .error_for_status()
            .context("google token exchange rejected")?
            .json()
            .await
            .context("google token response")?;

        let info: GoogleUserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("google userinfo request")?
            .error_for_status()
            .context("google userinfo rejected")?
            .json()
            .await
            .context("google userinfo response")?;

        debug!(email = ?info.email, verified = info.email_verified, "google userinfo fetched");
        info.try_into()
    }
}
