use std::sync::Arc;

use tracing::{error, info, warn};
use validator::Validate;

use crate::{
    auth::{
        claims::SessionClaims,
        dto::{LoginRequest, LoginResponse, RegisterRequest},
        jwt::JwtKeys,
        password::PasswordManager,
        repo_types::{Account, Profile},
    },
    error::{AppError, AppResult},
    storage::UserStore,
};

/// Register, login, profile and listing on top of the user store.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    passwords: PasswordManager,
    keys: JwtKeys,
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, passwords: PasswordManager, keys: JwtKeys) -> Self {
        Self {
            store,
            passwords,
            keys,
        }
    }

    pub async fn register(&self, input: RegisterRequest) -> AppResult<Profile> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.store.find_by_email(&input.email).await.is_some() {
            warn!(email = %input.email, "email already registered");
            return Err(AppError::DuplicateEmail);
        }
        if self.store.find_by_username(&input.username).await.is_some() {
            warn!(username = %input.username, "username already taken");
            return Err(AppError::DuplicateUsername);
        }

        let password_hash = self.hash(input.password).await?;
        let account = Account::new(
            input.name,
            input.username,
            input.email,
            password_hash,
            input.role,
        );

        let account = self.store.insert(account).await.map_err(|e| {
            error!(error = %e, "insert account failed");
            AppError::from(e)
        })?;

        info!(user_id = %account.id, role = %account.role, "user registered");
        Ok(Profile::from(account))
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, input: LoginRequest) -> AppResult<LoginResponse> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let Some(account) = self.store.find_by_email(&input.email).await else {
            self.verify(input.password, self.passwords.decoy_hash().to_owned())
                .await?;
            warn!(email = %input.email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !self.verify(input.password, account.password_hash.clone()).await? {
            warn!(user_id = %account.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.sign(&account).map_err(|e| {
            error!(error = %e, "jwt sign failed");
            AppError::Internal(e.to_string())
        })?;

        info!(user_id = %account.id, "user logged in");
        Ok(LoginResponse {
            token,
            token_type: "Bearer".into(),
            expires_in: self.keys.ttl().as_secs(),
        })
    }

    pub async fn profile(&self, claims: &SessionClaims) -> AppResult<Profile> {
        match self.store.find_by_email(&claims.email).await {
            Some(account) => Ok(Profile::from(account)),
            None => {
                warn!(user_id = %claims.sub, "token valid but account is gone");
                Err(AppError::NotFound)
            }
        }
    }

    pub async fn list_users(&self, claims: &SessionClaims) -> AppResult<Vec<Profile>> {
        if !claims.is_admin() {
            warn!(user_id = %claims.sub, role = %claims.role, "non-admin listed users");
            return Err(AppError::Forbidden);
        }
        let accounts = self.store.list_all().await;
        Ok(accounts.into_iter().map(Profile::from).collect())
    }

    async fn hash(&self, plain: String) -> AppResult<String> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.hash_password(&plain))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn verify(&self, plain: String, hash: String) -> AppResult<bool> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.verify_password(&plain, &hash))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{password::cheap_config, repo_types::Role},
        config::JwtConfig,
        storage::JsonFileStore,
    };
    use tempfile::TempDir;

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 60,
        })
        .unwrap()
    }

    fn service() -> (AccountService, Arc<JsonFileStore>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("users.json")));
        let passwords = PasswordManager::new(&cheap_config()).unwrap();
        let svc = AccountService::new(store.clone(), passwords, keys());
        (svc, store, dir)
    }

    fn register_req(name: &str, username: &str, email: &str, role: Option<Role>) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            username: username.into(),
            email: email.into(),
            password: "secret1".into(),
            repeat_password: "secret1".into(),
            role,
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_login_and_profile() {
        let (svc, store, _dir) = service();

        let created = svc
            .register(register_req("A", "a1", "a@x.com", None))
            .await
            .unwrap();
        assert_eq!(created.role, Role::User);

        let stored = store.find_by_email("a@x.com").await.unwrap();
        assert_ne!(stored.password_hash, "secret1");

        let err = svc
            .register(register_req("A2", "a2", "a@x.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));

        let login = svc.login(login_req("a@x.com", "secret1")).await.unwrap();
        assert_eq!(login.token_type, "Bearer");
        assert_eq!(login.expires_in, 3600);

        let claims = keys().verify(&login.token).unwrap();
        assert_eq!(claims.sub, created.id);

        let profile = svc.profile(&claims).await.unwrap();
        assert_eq!(
            profile,
            Profile {
                id: created.id,
                name: "A".into(),
                username: "a1".into(),
                email: "a@x.com".into(),
                role: Role::User,
            }
        );
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let (svc, _store, _dir) = service();
        svc.register(register_req("A", "a1", "a@x.com", None))
            .await
            .unwrap();
        let err = svc
            .register(register_req("B", "a1", "b@x.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateUsername));
    }

    #[tokio::test]
    async fn invalid_registration_is_validation_error() {
        let (svc, store, _dir) = service();
        let mut req = register_req("A", "a1", "a@x.com", None);
        req.repeat_password = "other1".into();
        let err = svc.register(req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (svc, _store, _dir) = service();
        svc.register(register_req("A", "a1", "a@x.com", None))
            .await
            .unwrap();

        let wrong = svc
            .login(login_req("a@x.com", "nope123"))
            .await
            .unwrap_err();
        let unknown = svc
            .login(login_req("ghost@x.com", "secret1"))
            .await
            .unwrap_err();

        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.status(), unknown.status());
        assert_eq!(wrong.kind(), unknown.kind());
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn unknown_email_still_pays_for_a_hash() {
        let (svc, _store, _dir) = service();
        let decoy = svc.passwords.decoy_hash().to_owned();
        assert!(!svc.verify("secret1".into(), decoy).await.unwrap());

        let err = svc
            .login(login_req("ghost@x.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_requires_well_formed_input() {
        let (svc, _store, _dir) = service();
        let err = svc.login(login_req("not-an-email", "x")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn profile_of_vanished_account_is_not_found() {
        let (svc, _store, _dir) = service();
        let ghost = Account::new("G".into(), "g1".into(), "g@x.com".into(), "h".into(), None);
        let claims = keys().verify(&keys().sign(&ghost).unwrap()).unwrap();
        let err = svc.profile(&claims).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn only_admins_list_users() {
        let (svc, _store, _dir) = service();
        svc.register(register_req("A", "a1", "a@x.com", None))
            .await
            .unwrap();
        svc.register(register_req("Root", "root", "root@x.com", Some(Role::Admin)))
            .await
            .unwrap();

        let user_token = svc.login(login_req("a@x.com", "secret1")).await.unwrap();
        let user_claims = keys().verify(&user_token.token).unwrap();
        let err = svc.list_users(&user_claims).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let admin_token = svc.login(login_req("root@x.com", "secret1")).await.unwrap();
        let admin_claims = keys().verify(&admin_token.token).unwrap();
        let all = svc.list_users(&admin_claims).await.unwrap();
        let usernames: Vec<_> = all.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(usernames, ["a1", "root"]);
        assert_eq!(all[0].role, Role::User);
    }
}
