//! Loading settings from the real process environment.
//!
//! Kept to a single test: the environment is shared by every thread of this
//! test binary.

use notisync_schema::config::Settings;

#[test]
fn test_from_env_reads_process_variables() {
    // SAFETY: the only test in this binary, so no other thread reads the environment.
    unsafe {
        std::env::set_var("LOG_LEVEL", "debug");
        std::env::set_var("REDIS_HOST", "cache.internal");
        std::env::set_var("DB_PORT", "abc");
        std::env::remove_var("JWT_EXPIRATION_HOURS");
    }

    let (settings, invalid) = Settings::from_env();

    assert_eq!(settings.server.log_level, "debug");
    assert_eq!(settings.redis.host, "cache.internal");
    assert_eq!(settings.database.port, 27017);
    assert_eq!(settings.jwt.expiration_hours, 24);
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].key, "DB_PORT");
    assert_eq!(invalid[0].value, "abc");
}
