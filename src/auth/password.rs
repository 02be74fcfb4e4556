use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::Arc;

use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::config::PasswordConfig;

/// Salted Argon2id hashing with a fixed work factor.
#[derive(Clone)]
pub struct PasswordManager {
    params: Params,
    /// Hash of a random secret at the configured cost. Logins for unknown
    /// emails verify against it so they take as long as a wrong password.
    decoy: Arc<str>,
}

impl PasswordManager {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        let mut manager = Self {
            params,
            decoy: Arc::from(""),
        };
        let secret = SaltString::generate(&mut OsRng);
        manager.decoy = manager.hash_password(secret.as_str())?.into();
        Ok(manager)
    }

    pub fn decoy_hash(&self) -> &str {
        &self.decoy
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_password(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Parameters come from the stored hash, not from `self`. A hash that
    /// cannot be parsed verifies as false.
    pub fn verify_password(&self, plain: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn cheap_config() -> PasswordConfig {
    PasswordConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PasswordManager {
        PasswordManager::new(&cheap_config()).expect("valid params")
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let pm = manager();
        let password = "Secur3P@ssw0rd!";
        let hash = pm.hash_password(password).expect("hashing should succeed");
        assert!(pm.verify_password(password, &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let pm = manager();
        let hash = pm.hash_password("correct-horse-battery-staple").unwrap();
        assert!(!pm.verify_password("wrong-password", &hash));
        assert!(!pm.verify_password("", &hash));
    }

    #[test]
    fn verify_is_false_on_malformed_hash() {
        let pm = manager();
        assert!(!pm.verify_password("anything", "not-a-valid-hash"));
        assert!(!pm.verify_password("anything", ""));
    }

    #[test]
    fn same_password_gets_fresh_salt() {
        let pm = manager();
        let a = pm.hash_password("secret1").unwrap();
        let b = pm.hash_password("secret1").unwrap();
        assert_ne!(a, b);
        assert!(!a.contains("secret1"));
        assert!(a.starts_with("$argon2id$"));
    }

    #[test]
    fn verify_uses_params_from_hash() {
        let strong = PasswordManager::new(&PasswordConfig {
            memory_kib: 128,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash_password("secret1").unwrap();
        assert!(manager().verify_password("secret1", &hash));
    }

    #[test]
    fn decoy_hash_costs_the_same_and_matches_nothing() {
        let pm = manager();
        let decoy = pm.decoy_hash();
        assert!(decoy.starts_with("$argon2id$"));
        assert!(decoy.contains("m=64,t=1,p=1"));
        assert!(PasswordHash::new(decoy).is_ok());
        assert!(!pm.verify_password("", decoy));
        assert!(!pm.verify_password("secret1", decoy));
        assert_ne!(decoy, manager().decoy_hash());
    }

    #[test]
    fn rejects_impossible_params() {
        let cfg = PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(PasswordManager::new(&cfg).is_err());
    }
}
