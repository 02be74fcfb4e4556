use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, bail};
use serde::Deserialize;

/// Ten years.
const MAX_TTL_MINUTES: u64 = 10 * 365 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    /// Token lifetime. Negative or oversized minute counts are rejected
    /// rather than clamped.
    pub fn ttl(&self) -> anyhow::Result<Duration> {
        let minutes = u64::try_from(self.ttl_minutes)
            .ok()
            .filter(|m| *m <= MAX_TTL_MINUTES)
            .ok_or_else(|| {
                anyhow!(
                    "JWT_TTL_MINUTES must be between 0 and {MAX_TTL_MINUTES}, got {}",
                    self.ttl_minutes
                )
            })?;
        let secs = minutes
            .checked_mul(60)
            .ok_or_else(|| anyhow!("JWT_TTL_MINUTES overflows"))?;
        Ok(Duration::from_secs(secs))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        self.ttl()?;
        Ok(())
    }
}

/// Argon2 work factor. Stored hashes carry their own parameters, so changing
/// these only affects newly hashed passwords.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub users_file: PathBuf,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    /// Requests per client IP per minute; 0 turns the limiter off.
    pub rate_limit_per_minute: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "user-accounts".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "user-accounts-clients".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
        };
        jwt.validate()?;

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("PASSWORD_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("PASSWORD_ITERATIONS", defaults.iterations),
            parallelism: env_or("PASSWORD_PARALLELISM", defaults.parallelism),
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 5000),
            users_file: std::env::var("USERS_FILE")
                .unwrap_or_else(|_| "./data/users.json".into())
                .into(),
            jwt,
            password,
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", 10),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("USER_ACCOUNTS_TEST_PORT", "not-a-number");
        assert_eq!(env_or("USER_ACCOUNTS_TEST_PORT", 5000u16), 5000);
        std::env::set_var("USER_ACCOUNTS_TEST_PORT", "8081");
        assert_eq!(env_or("USER_ACCOUNTS_TEST_PORT", 5000u16), 8081);
        std::env::remove_var("USER_ACCOUNTS_TEST_PORT");
    }

    #[test]
    fn env_or_uses_default_when_unset() {
        assert_eq!(env_or("USER_ACCOUNTS_TEST_UNSET_TTL", 60i64), 60);
    }

    fn jwt(secret: &str, ttl_minutes: i64) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes,
        }
    }

    #[test]
    fn blank_secret_is_rejected() {
        assert!(jwt("", 60).validate().is_err());
        assert!(jwt("   ", 60).validate().is_err());
        assert!(jwt("s3cret", 60).validate().is_ok());
    }

    #[test]
    fn ttl_is_range_checked() {
        assert_eq!(jwt("s", 60).ttl().unwrap(), Duration::from_secs(3600));
        assert_eq!(jwt("s", 0).ttl().unwrap(), Duration::ZERO);
        assert!(jwt("s", -1).validate().is_err());
        assert!(jwt("s", i64::MAX).validate().is_err());
        assert!(jwt("s", i64::MAX / 60 + 1).ttl().is_err());
        assert!(jwt("s", MAX_TTL_MINUTES as i64).ttl().is_ok());
        assert!(jwt("s", MAX_TTL_MINUTES as i64 + 1).ttl().is_err());
    }
}
