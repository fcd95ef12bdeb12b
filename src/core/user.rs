use std::sync::Arc;

use dashmap::DashMap;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// A platform user. Accounts come in through the social-login callback, so
/// `external_id` is the identity; everything else is profile data.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize, Default)]
pub struct User {
    pub id: i64,

    /// Account id at the social-login provider (the upsert key)
    pub external_id: String,

    pub display_name: String,
    pub avatar_url: Option<String>,

    /// Captured during the post-login profile flow
    pub email: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,

    pub is_admin: bool,
}

/// Payload of the social-login callback. The provider has already
/// authenticated the account by the time this reaches us.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub external_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// In-memory session store: token -> user id. A restart logs everyone out.
pub type Sessions = Arc<DashMap<String, i64>>;

pub fn new_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_tokens_are_long_and_unique() {
        let a = new_session_token();
        let b = new_session_token();
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
    }
}
