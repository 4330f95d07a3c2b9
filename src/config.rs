//! Environment configuration.
//!
//! Built once at startup from an optional `.env` file plus the process
//! environment; tests inject overrides through [`EnvConfig::from_map`]
//! instead of mutating the environment.

use std::collections::HashMap;
use std::env;

use crate::model::DecisionCriteria;

/// Top-level configuration for the engine.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub broker: BrokerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub criteria: DecisionCriteria,
    pub log_level: String,
}

/// Broker connection settings. The URI is handed to the connector; queue
/// durability applies to every declaration the engine makes.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub uri: String,
    pub durable_queues: bool,
}

/// Relational-store settings, handed to the external store client.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub pool_size: u32,
    pub connect_timeout_ms: u64,
}

/// OAuth2 client-credentials settings for the fleet API.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout_ms: u64,
    pub token_expiry_skew_secs: u64,
}

/// Fleet data API settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("environment variable {name} must be {expected}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
    },
}

impl EnvConfig {
    /// Loads configuration from `.env` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_map(HashMap::new())
    }

    /// Like [`EnvConfig::load`], with explicit overrides taking precedence
    /// over everything else.
    pub fn from_map(overrides: HashMap<String, String>) -> Result<Self, ConfigError> {
        let env = EnvLoader::create(overrides);

        let broker = BrokerConfig {
            uri: env.required("BROKER_URI")?,
            durable_queues: env.optional_bool("BROKER_QUEUE_DURABLE", true),
        };

        let database = DatabaseConfig {
            url: env.required("DATABASE_URL")?,
            user: env.optional("DATABASE_USER"),
            password: env.optional("DATABASE_PASSWORD"),
            pool_size: env.optional_u32("DATABASE_POOL_SIZE", 5)?,
            connect_timeout_ms: env.optional_u64("DATABASE_CONNECT_TIMEOUT_MS", 30_000)?,
        };

        let auth = AuthConfig {
            token_url: env.required("AUTH_TOKEN_URL")?,
            client_id: env.required("AUTH_CLIENT_ID")?,
            client_secret: env.required("AUTH_CLIENT_SECRET")?,
            timeout_ms: env.optional_u64("AUTH_TIMEOUT_MS", 3_000)?,
            token_expiry_skew_secs: env.optional_u64("AUTH_TOKEN_EXPIRY_SKEW_SECS", 30)?,
        };

        let api = ApiConfig {
            base_url: env
                .optional("FLEET_API_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3001".to_string()),
            timeout_ms: env.optional_u64("FLEET_API_TIMEOUT_MS", 5_000)?,
        };

        let criteria = DecisionCriteria {
            max_distance_km: env.optional_f64("DECISION_MAX_DISTANCE_KM")?,
            min_energy_level: env.optional_f64("DECISION_MIN_ENERGY_LEVEL")?,
        };

        let log_level = env
            .optional("LOG_LEVEL")
            .unwrap_or_else(|| "info".to_string());

        Ok(Self {
            broker,
            database,
            auth,
            api,
            criteria,
            log_level,
        })
    }
}

/// Merged view over `.env`, the process environment, and overrides.
struct EnvLoader {
    values: HashMap<String, String>,
}

impl EnvLoader {
    fn create(overrides: HashMap<String, String>) -> Self {
        dotenvy::dotenv().ok();
        let mut values: HashMap<String, String> = env::vars().collect();
        values.extend(overrides);
        Self { values }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key)
            .map(str::to_string)
            .ok_or(ConfigError::MissingVar(key))
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    fn optional_bool(&self, key: &str, fallback: bool) -> bool {
        match self.get(key) {
            Some(value) => value.eq_ignore_ascii_case("true"),
            None => fallback,
        }
    }

    fn optional_u32(&self, key: &'static str, fallback: u32) -> Result<u32, ConfigError> {
        match self.get(key) {
            None => Ok(fallback),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: key,
                expected: "an unsigned integer",
            }),
        }
    }

    fn optional_u64(&self, key: &'static str, fallback: u64) -> Result<u64, ConfigError> {
        match self.get(key) {
            None => Ok(fallback),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: key,
                expected: "an unsigned integer",
            }),
        }
    }

    fn optional_f64(&self, key: &'static str) -> Result<Option<f64>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid {
                    name: key,
                    expected: "a number",
                }),
        }
    }
}
