use dotenv::dotenv;
use serde::Deserialize;

use crate::auth::password::HashCost;

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub store_backend: String,
    pub db_pool_size: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub cookie_secure: bool,
    pub client_origin: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv().ok(); // Load .env file if present
        let defaults = Self::default();
        let settings = config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("database_url", defaults.database_url)?
            .set_default("store_backend", defaults.store_backend)?
            .set_default("db_pool_size", i64::from(defaults.db_pool_size))?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_ttl_hours", defaults.jwt_ttl_hours)?
            .set_default("cookie_secure", defaults.cookie_secure)?
            .set_default("client_origin", defaults.client_origin)?
            .set_default("upload_dir", defaults.upload_dir)?
            .set_default("max_upload_bytes", defaults.max_upload_bytes as i64)?
            .set_default("mail_from", defaults.mail_from)?
            .set_default("argon2_memory_kib", i64::from(defaults.argon2_memory_kib))?
            .set_default("argon2_iterations", i64::from(defaults.argon2_iterations))?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.store_backend.eq_ignore_ascii_case("memory")
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if !self.uses_memory_store() {
            if self.database_url.is_empty() {
                return Err(config::ConfigError::Message(
                    "DATABASE_URL must be set for the postgres store".to_string(),
                ));
            }
            if self.jwt_secret.is_empty() {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set for the postgres store".to_string(),
                ));
            }
        }
        if !matches!(self.store_backend.to_ascii_lowercase().as_str(), "postgres" | "memory") {
            return Err(config::ConfigError::Message(format!(
                "unknown STORE_BACKEND {:?}, expected postgres or memory",
                self.store_backend
            )));
        }
        Ok(())
    }

    /// Secret used to sign session tokens. Memory-backed runs fall back to a
    /// fixed development secret.
    pub fn signing_secret(&self) -> &str {
        if self.jwt_secret.is_empty() {
            "basha-lagbe-development-secret"
        } else {
            &self.jwt_secret
        }
    }

    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
        }
    }

    pub fn token_max_age_secs(&self) -> i64 {
        self.jwt_ttl_hours * 3600
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: String::new(),
            store_backend: "postgres".to_string(),
            db_pool_size: 10,
            jwt_secret: String::new(),
            jwt_ttl_hours: 24,
            cookie_secure: false,
            client_origin: "http://localhost:5173".to_string(),
            upload_dir: "uploads".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            mail_api_url: None,
            mail_api_key: None,
            mail_from: "Basha Lagbe <no-reply@bashalagbe.com>".to_string(),
            argon2_memory_kib: 19_456,
            argon2_iterations: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_require_database_for_postgres() {
        let config = AppConfig::default();
        assert!(!config.uses_memory_store());
        assert!(config.validate().is_err());
    }

    #[test]
    fn memory_store_runs_without_secrets() {
        let config = AppConfig {
            store_backend: "Memory".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.signing_secret(), "basha-lagbe-development-secret");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let config = AppConfig {
            store_backend: "mongo".to_string(),
            database_url: "postgres://localhost/basha".to_string(),
            jwt_secret: "secret".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
