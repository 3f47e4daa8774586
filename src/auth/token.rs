use tracing::debug;
use uuid::Uuid;

use crate::auth::repo::{RepoError, UserStore};

/// Fresh opaque session token.
pub fn mint_token() -> String {
    Uuid::new_v4().to_string()
}

/// Mint a token and make it the user's current one.
pub async fn rotate_token(users: &dyn UserStore, user_id: Uuid) -> Result<String, RepoError> {
    let token = mint_token();
    users.update_token(user_id, &token).await?;
    debug!(user_id = %user_id, "session token rotated");
    Ok(token)
}
