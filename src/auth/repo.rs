use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{Account, Profile, Role};

impl Account {
    /// Build a fresh account with a new ID.
    pub fn new(
        name: String,
        username: String,
        email: String,
        password_hash: String,
        role: Option<Role>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            username,
            email,
            password_hash,
            role: role.unwrap_or_default(),
            created_at: Some(OffsetDateTime::now_utc()),
        }
    }
}

/// The public view of an account: everything but the password hash and
/// bookkeeping timestamps.
impl From<Account> for Profile {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            name: a.name,
            username: a.username,
            email: a.email,
            role: a.role,
        }
    }
}
