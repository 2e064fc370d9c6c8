//! Integration tests for loading settings from environment variables.

use notisync_schema::config::{Settings, vars};
use std::collections::HashMap;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

const ALL_VARS: [&str; 15] = [
    vars::DB_HOST,
    vars::DB_PORT,
    vars::DB_USER,
    vars::DB_PASSWORD,
    vars::DB_NAME,
    vars::DB_SSL_MODE,
    vars::MONGODB_URI,
    vars::REDIS_HOST,
    vars::REDIS_PORT,
    vars::REDIS_PASSWORD,
    vars::REDIS_DB,
    vars::JWT_SECRET,
    vars::JWT_EXPIRATION_HOURS,
    vars::ENVIRONMENT,
    vars::LOG_LEVEL,
];

fn assert_defaults(settings: &Settings) {
    assert_eq!(settings.database.host, "localhost");
    assert_eq!(settings.database.port, 27017);
    assert_eq!(settings.database.user, "");
    assert_eq!(settings.database.password, "");
    assert_eq!(settings.database.name, "notisync");
    assert_eq!(settings.database.ssl_mode, "disable");
    assert_eq!(settings.database.uri, "");
    assert_eq!(settings.redis.host, "localhost");
    assert_eq!(settings.redis.port, 6379);
    assert_eq!(settings.redis.password, "");
    assert_eq!(settings.redis.db, 0);
    assert_eq!(settings.jwt.secret, "your-secret-key");
    assert_eq!(settings.jwt.expiration_hours, 24);
    assert_eq!(settings.server.environment, "development");
    assert_eq!(settings.server.log_level, "info");
}

#[test]
fn test_unset_variables_use_defaults() {
    let (settings, invalid) = Settings::load_with_report(env(&[]));
    assert_defaults(&settings);
    assert!(invalid.is_empty());
}

#[test]
fn test_empty_variables_use_defaults() {
    let empty: Vec<(&str, &str)> = ALL_VARS.iter().map(|k| (*k, "")).collect();
    let (settings, invalid) = Settings::load_with_report(env(&empty));
    assert_defaults(&settings);
    assert!(invalid.is_empty());
}

#[test]
fn test_set_variables_are_used_verbatim() {
    let (settings, invalid) = Settings::load_with_report(env(&[
        ("DB_HOST", "db.internal"),
        ("DB_PORT", "5432"),
        ("DB_USER", "notisync"),
        ("DB_PASSWORD", "s3cret"),
        ("DB_NAME", "notisync_prod"),
        ("DB_SSL_MODE", "require"),
        ("MONGODB_URI", "mongodb://cluster/notisync"),
        ("REDIS_HOST", "cache.internal"),
        ("REDIS_PORT", "6380"),
        ("REDIS_PASSWORD", "redispw"),
        ("REDIS_DB", "3"),
        ("JWT_SECRET", "jwt-signing-key"),
        ("JWT_EXPIRATION_HOURS", "48"),
        ("ENVIRONMENT", "production"),
        ("LOG_LEVEL", "debug"),
    ]));

    assert!(invalid.is_empty());
    assert_eq!(settings.database.host, "db.internal");
    assert_eq!(settings.database.port, 5432);
    assert_eq!(settings.database.user, "notisync");
    assert_eq!(settings.database.password, "s3cret");
    assert_eq!(settings.database.name, "notisync_prod");
    assert_eq!(settings.database.ssl_mode, "require");
    assert_eq!(settings.database.uri, "mongodb://cluster/notisync");
    assert_eq!(settings.redis.host, "cache.internal");
    assert_eq!(settings.redis.port, 6380);
    assert_eq!(settings.redis.password, "redispw");
    assert_eq!(settings.redis.db, 3);
    assert_eq!(settings.jwt.secret, "jwt-signing-key");
    assert_eq!(settings.jwt.expiration_hours, 48);
    assert_eq!(settings.server.environment, "production");
    assert_eq!(settings.server.log_level, "debug");
    assert!(settings.server.is_production());
}

#[test]
fn test_invalid_numbers_fall_back_to_defaults() {
    let (settings, invalid) = Settings::load_with_report(env(&[
        ("DB_PORT", "abc"),
        ("REDIS_PORT", "63 79"),
        ("REDIS_DB", "one"),
        ("JWT_EXPIRATION_HOURS", "24h"),
    ]));

    assert_eq!(settings.database.port, 27017);
    assert_eq!(settings.redis.port, 6379);
    assert_eq!(settings.redis.db, 0);
    assert_eq!(settings.jwt.expiration_hours, 24);

    let keys: Vec<&str> = invalid.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["DB_PORT", "REDIS_PORT", "REDIS_DB", "JWT_EXPIRATION_HOURS"]
    );
    assert_eq!(invalid[0].value, "abc");
    assert_eq!(invalid[0].fallback, "27017");
}

#[test]
fn test_invalid_number_does_not_affect_other_fields() {
    let (settings, invalid) =
        Settings::load_with_report(env(&[("DB_PORT", "not-a-port"), ("DB_HOST", "pg")]));
    assert_eq!(invalid.len(), 1);
    assert_eq!(settings.database.host, "pg");
    assert_eq!(settings.database.port, 27017);
}

#[test]
fn test_redacted_view_serializes_without_secrets() {
    let settings = Settings::from_lookup(env(&[
        ("DB_PASSWORD", "s3cret"),
        ("JWT_SECRET", "jwt-signing-key"),
    ]));
    let rendered = serde_json::to_string(&settings.redacted()).unwrap();
    assert!(!rendered.contains("s3cret"));
    assert!(!rendered.contains("jwt-signing-key"));
    assert!(rendered.contains("***"));
}
