use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    auth::{jwt::JwtKeys, password::PasswordManager, services::AccountService},
    config::AppConfig,
    rate_limit::RequestLimiter,
    storage::{JsonFileStore, UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: AccountService,
    pub keys: JwtKeys,
    pub limiter: Option<RequestLimiter>,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = Arc::new(JsonFileStore::new(&config.users_file)) as Arc<dyn UserStore>;
        tracing::info!(path = %config.users_file.display(), "using users file");
        Self::from_parts(config, store)
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt)?;
        let passwords = PasswordManager::new(&config.password)?;
        let accounts = AccountService::new(store, passwords, keys.clone());
        let limiter = RequestLimiter::per_minute(config.rate_limit_per_minute);

        Ok(Self {
            config,
            accounts,
            keys,
            limiter,
        })
    }

    /// State over a users file at `users_file`, with cheap hashing and no
    /// rate limiting.
    #[cfg(test)]
    pub fn fake(users_file: std::path::PathBuf) -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            users_file: users_file.clone(),
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
            },
            password: crate::auth::password::cheap_config(),
            rate_limit_per_minute: 0,
        });
        let store = Arc::new(JsonFileStore::new(users_file)) as Arc<dyn UserStore>;
        Self::from_parts(config, store).expect("fake state")
    }
}
