//! Sign-in providers. Each one either yields a normalized identity or
//! nothing; a wrong password is a `None`, never an error.

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    oauth::OAuthProfile,
    password::{unusable_password_hash, verify_password},
    repo::{RepoError, UserStore},
    repo_types::NewUser,
    token::rotate_token,
};
use crate::validation::auth::LoginInput;

/// What a successful credentials sign-in hands to the session pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub token: String,
}

/// Outcome of one provider, tagged by kind.
#[derive(Debug, Clone)]
pub enum SignIn {
    Credentials(Identity),
    OAuth(OAuthProfile),
}

/// Look the user up by email and check the password. On success the
/// session token is rotated before the identity is returned.
pub async fn authorize_credentials(
    users: &dyn UserStore,
    credentials: &LoginInput,
) -> anyhow::Result<Option<SignIn>> {
    let Some(user) = users.find_by_email(&credentials.email).await? else {
        warn!(email = %credentials.email, "sign-in unknown email");
        return Ok(None);
    };

    if !verify_password(&credentials.password, &user.password_hash) {
        warn!(email = %credentials.email, user_id = %user.id, "sign-in invalid password");
        return Ok(None);
    }

    let token = rotate_token(users, user.id).await?;
    info!(user_id = %user.id, "credentials sign-in");
    Ok(Some(SignIn::Credentials(Identity {
        id: user.id,
        name: user.name,
        email: user.email,
        avatar: user.avatar,
        token,
    })))
}

/// Accept a provider-verified identity, creating the account on first
/// sight. Existing accounts are left untouched, password hash included.
pub async fn authorize_oauth(
    users: &dyn UserStore,
    profile: OAuthProfile,
) -> anyhow::Result<SignIn> {
    if users.find_by_email(&profile.email).await?.is_none() {
        let name = profile
            .name
            .clone()
            .unwrap_or_else(|| profile.email.split('@').next().unwrap_or_default().to_string());
        let created = users
            .create(NewUser {
                name,
                email: profile.email.clone(),
                password_hash: unusable_password_hash()?,
            })
            .await;
        match created {
            Ok(user) => info!(user_id = %user.id, "account created from oauth profile"),
            // Lost a race with a concurrent first login; the account exists now.
            Err(RepoError::DuplicateEmail) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(SignIn::OAuth(profile))
}
