use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::repo_types::Account;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("users file i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("users file is not a valid account list: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("email '{0}' is already registered")]
    DuplicateEmail(String),
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),
    #[error("account id {0} already exists")]
    DuplicateId(Uuid),
}

/// Account persistence. Lookups are exact, case-sensitive, and return the
/// first match in insertion order.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Every account in insertion order. Unreadable storage yields nothing.
    async fn list_all(&self) -> Vec<Account>;

    async fn find_by_email(&self, email: &str) -> Option<Account> {
        self.list_all().await.into_iter().find(|a| a.email == email)
    }

    async fn find_by_username(&self, username: &str) -> Option<Account> {
        self.list_all()
            .await
            .into_iter()
            .find(|a| a.username == username)
    }

    async fn find_by_id(&self, id: Uuid) -> Option<Account> {
        self.list_all().await.into_iter().find(|a| a.id == id)
    }

    /// Append an account and persist the whole set. A nil ID is replaced
    /// with a fresh one before writing.
    async fn insert(&self, account: Account) -> Result<Account, StoreError>;
}

/// Users kept as one JSON array on disk.
///
/// Inserts are serialized by a write lock covering the whole
/// read-check-write, and uniqueness of id/email/username is re-checked
/// under that lock. Writes go to a sibling temp file that is renamed into
/// place.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<Account>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, accounts: &[Account]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let body = serde_json::to_vec_pretty(accounts)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = accounts.len(), "users file written");
        Ok(())
    }
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn list_all(&self) -> Vec<Account> {
        match self.load().await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "users file unreadable; treating as empty");
                Vec::new()
            }
        }
    }

    async fn insert(&self, mut account: Account) -> Result<Account, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut accounts = self.load().await?;
        if account.id.is_nil() {
            account.id = Uuid::new_v4();
        }
        if accounts.iter().any(|a| a.email == account.email) {
            return Err(StoreError::DuplicateEmail(account.email));
        }
        if accounts.iter().any(|a| a.username == account.username) {
            return Err(StoreError::DuplicateUsername(account.username));
        }
        if accounts.iter().any(|a| a.id == account.id) {
            return Err(StoreError::DuplicateId(account.id));
        }

        accounts.push(account.clone());
        self.persist(&accounts).await?;
        info!(user_id = %account.id, "account stored");
        Ok(account)
    }
}
