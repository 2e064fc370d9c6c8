//! Service settings loaded from the process environment.
//!
//! Every setting has a documented default that applies when its variable is
//! unset or empty. Loading never fails: a numeric variable that does not parse
//! falls back to its default and is reported as an [`InvalidSetting`].
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DB_HOST` | `localhost` |
//! | `DB_PORT` | `27017` |
//! | `DB_USER` | (empty) |
//! | `DB_PASSWORD` | (empty) |
//! | `DB_NAME` | `notisync` |
//! | `DB_SSL_MODE` | `disable` |
//! | `MONGODB_URI` | (empty) |
//! | `REDIS_HOST` | `localhost` |
//! | `REDIS_PORT` | `6379` |
//! | `REDIS_PASSWORD` | (empty) |
//! | `REDIS_DB` | `0` |
//! | `JWT_SECRET` | `your-secret-key` |
//! | `JWT_EXPIRATION_HOURS` | `24` |
//! | `ENVIRONMENT` | `development` |
//! | `LOG_LEVEL` | `info` |

use crate::error::{SchemaError, SchemaResult};
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 27017;
pub const DEFAULT_DB_NAME: &str = "notisync";
pub const DEFAULT_DB_SSL_MODE: &str = "disable";
pub const DEFAULT_REDIS_HOST: &str = "localhost";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_REDIS_DB: u32 = 0;
pub const DEFAULT_JWT_SECRET: &str = "your-secret-key";
pub const DEFAULT_JWT_EXPIRATION_HOURS: u64 = 24;
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_LOG_LEVEL: &str = "info";

const REDACTED: &str = "***";

/// Environment variable names.
pub mod vars {
    pub const DB_HOST: &str = "DB_HOST";
    pub const DB_PORT: &str = "DB_PORT";
    pub const DB_USER: &str = "DB_USER";
    pub const DB_PASSWORD: &str = "DB_PASSWORD";
    pub const DB_NAME: &str = "DB_NAME";
    pub const DB_SSL_MODE: &str = "DB_SSL_MODE";
    pub const MONGODB_URI: &str = "MONGODB_URI";
    pub const REDIS_HOST: &str = "REDIS_HOST";
    pub const REDIS_PORT: &str = "REDIS_PORT";
    pub const REDIS_PASSWORD: &str = "REDIS_PASSWORD";
    pub const REDIS_DB: &str = "REDIS_DB";
    pub const JWT_SECRET: &str = "JWT_SECRET";
    pub const JWT_EXPIRATION_HOURS: &str = "JWT_EXPIRATION_HOURS";
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Primary database settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// May hold a full `mongodb://` / `mongodb+srv://` connection string.
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Sensitive - log through [`Settings::redacted`] only.
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    /// Full document-store URI; takes priority over the individual fields.
    pub uri: String,
}

impl DatabaseSettings {
    /// Connection string for the document store.
    ///
    /// Priority: explicit `uri`, then `host` when it already is a MongoDB
    /// connection string, then a URI assembled from host, port and name
    /// (credentials included only when both user and password are set).
    pub fn document_store_uri(&self) -> String {
        if !self.uri.is_empty() {
            return self.uri.clone();
        }
        if self.host.starts_with("mongodb://") || self.host.starts_with("mongodb+srv://") {
            return self.host.clone();
        }
        if !self.user.is_empty() && !self.password.is_empty() {
            format!(
                "mongodb://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            )
        } else {
            format!("mongodb://{}:{}/{}", self.host, self.port, self.name)
        }
    }

    /// PostgreSQL connection URL for the relational `user_rules` store.
    ///
    /// Credentials are percent-encoded; `ssl_mode` becomes the `sslmode` query
    /// parameter when non-empty.
    pub fn postgres_url(&self) -> SchemaResult<String> {
        let base = format!("postgres://{}:{}/{}", self.host, self.port, self.name);
        let mut url = Url::parse(&base).map_err(|e| {
            SchemaError::invalid_input(format!("Cannot build PostgreSQL URL from DB_* settings: {e}"))
        })?;

        if !self.user.is_empty() {
            url.set_username(&self.user)
                .map_err(|_| SchemaError::invalid_input("DB_USER cannot be used in a URL"))?;
            if !self.password.is_empty() {
                url.set_password(Some(&self.password))
                    .map_err(|_| SchemaError::invalid_input("DB_PASSWORD cannot be used in a URL"))?;
            }
        }
        if !self.ssl_mode.is_empty() {
            url.query_pairs_mut().append_pair("sslmode", &self.ssl_mode);
        }
        Ok(url.to_string())
    }
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    /// Sensitive - log through [`Settings::redacted`] only.
    pub password: String,
    /// Logical database index.
    pub db: u32,
}

impl RedisSettings {
    /// `host:port` address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Token signing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtSettings {
    /// Sensitive - log through [`Settings::redacted`] only.
    pub secret: String,
    pub expiration_hours: u64,
}

impl JwtSettings {
    /// Token lifetime.
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_hours.saturating_mul(3600))
    }
}

/// Deployment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub environment: String,
    pub log_level: String,
}

impl ServerSettings {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

/// All service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub jwt: JwtSettings,
    pub server: ServerSettings,
}

/// A numeric variable whose value was rejected in favour of the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidSetting {
    pub key: String,
    pub value: String,
    pub fallback: String,
}

impl InvalidSetting {
    pub fn log(&self) {
        warn!(
            key = %self.key,
            value = %self.value,
            fallback = %self.fallback,
            "Invalid numeric setting, using default"
        );
    }
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// Rejected values are returned rather than logged so callers can report
    /// them once logging is set up.
    pub fn from_env() -> (Self, Vec<InvalidSetting>) {
        Self::load_with_report(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup, logging each rejected value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let (settings, invalid) = Self::load_with_report(lookup);
        invalid.iter().for_each(InvalidSetting::log);
        settings
    }

    /// Load settings and return every rejected numeric value alongside them.
    pub fn load_with_report<F>(lookup: F) -> (Self, Vec<InvalidSetting>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(lookup);

        let settings = Self {
            database: DatabaseSettings {
                host: env.string(vars::DB_HOST, DEFAULT_DB_HOST),
                port: env.number(vars::DB_PORT, DEFAULT_DB_PORT),
                user: env.string(vars::DB_USER, ""),
                password: env.string(vars::DB_PASSWORD, ""),
                name: env.string(vars::DB_NAME, DEFAULT_DB_NAME),
                ssl_mode: env.string(vars::DB_SSL_MODE, DEFAULT_DB_SSL_MODE),
                uri: env.string(vars::MONGODB_URI, ""),
            },
            redis: RedisSettings {
                host: env.string(vars::REDIS_HOST, DEFAULT_REDIS_HOST),
                port: env.number(vars::REDIS_PORT, DEFAULT_REDIS_PORT),
                password: env.string(vars::REDIS_PASSWORD, ""),
                db: env.number(vars::REDIS_DB, DEFAULT_REDIS_DB),
            },
            jwt: JwtSettings {
                secret: env.string(vars::JWT_SECRET, DEFAULT_JWT_SECRET),
                expiration_hours: env
                    .number(vars::JWT_EXPIRATION_HOURS, DEFAULT_JWT_EXPIRATION_HOURS),
            },
            server: ServerSettings {
                environment: env.string(vars::ENVIRONMENT, DEFAULT_ENVIRONMENT),
                log_level: env.string(vars::LOG_LEVEL, DEFAULT_LOG_LEVEL),
            },
        };

        (settings, env.invalid)
    }

    /// A view safe to print or log: secrets are masked.
    pub fn redacted(&self) -> RedactedSettings {
        RedactedSettings {
            database: RedactedDatabase {
                host: self.database.host.clone(),
                port: self.database.port,
                user: self.database.user.clone(),
                password: mask(&self.database.password),
                name: self.database.name.clone(),
                ssl_mode: self.database.ssl_mode.clone(),
                uri: mask_uri(&self.database.uri),
            },
            redis: RedactedRedis {
                host: self.redis.host.clone(),
                port: self.redis.port,
                password: mask(&self.redis.password),
                db: self.redis.db,
            },
            jwt: RedactedJwt {
                secret: mask(&self.jwt.secret),
                expiration_hours: self.jwt.expiration_hours,
            },
            environment: self.server.environment.clone(),
            log_level: self.server.log_level.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RedactedSettings {
    pub database: RedactedDatabase,
    pub redis: RedactedRedis,
    pub jwt: RedactedJwt,
    pub environment: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedactedDatabase {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedactedRedis {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedactedJwt {
    pub secret: String,
    pub expiration_hours: u64,
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        REDACTED.to_string()
    }
}

/// Mask the password inside a connection URI; unparseable URIs are masked whole.
fn mask_uri(uri: &str) -> String {
    if uri.is_empty() {
        return String::new();
    }
    match Url::parse(uri) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some(REDACTED)).is_err() {
                return REDACTED.to_string();
            }
            url.to_string()
        }
        Err(_) => REDACTED.to_string(),
    }
}

/// Reads variables through a lookup, applying defaults and recording rejected values.
struct EnvReader<F> {
    lookup: F,
    invalid: Vec<InvalidSetting>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            invalid: Vec::new(),
        }
    }

    /// Non-empty value verbatim, otherwise the default.
    fn string(&self, key: &str, default: &str) -> String {
        match (self.lookup)(key) {
            Some(value) if !value.is_empty() => value,
            _ => default.to_string(),
        }
    }

    /// Trimmed value parsed as `T`; unset, empty or unparseable values yield the default.
    fn number<T>(&mut self, key: &str, default: T) -> T
    where
        T: FromStr + Display + Copy,
    {
        let Some(raw) = (self.lookup)(key).filter(|v| !v.is_empty()) else {
            return default;
        };
        match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                self.invalid.push(InvalidSetting {
                    key: key.to_string(),
                    value: raw,
                    fallback: default.to_string(),
                });
                default
            }
        }
    }
}
