use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::Role;

/// JWT payload carried by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,      // account ID
    pub email: String,
    pub role: Role,
    pub iat: i64,       // issued at (unix timestamp)
    pub exp: i64,       // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

impl SessionClaims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
