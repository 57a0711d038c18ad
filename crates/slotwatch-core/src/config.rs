use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation are decoupled from the process environment so tests
/// can drive them with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        match lookup(var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::MissingEnvVar(var.to_string())),
        }
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<i64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let session_cookie = require("SLOTWATCH_SESSION_COOKIE")?;
    let application_key = require("SLOTWATCH_APPLICATION_KEY")?;

    let env = parse_environment(&or_default("SLOTWATCH_ENV", "development"))?;
    let log_level = or_default("SLOTWATCH_LOG_LEVEL", "info");
    let application_name = or_default("SLOTWATCH_APPLICATION_NAME", "slotwatch");
    let base_url = or_default(
        "SLOTWATCH_BASE_URL",
        "https://central.myvisit.com/CentralAPI",
    );
    if env.requires_https() && !base_url.starts_with("https://") {
        return Err(ConfigError::InvalidEnvVar {
            var: "SLOTWATCH_BASE_URL".to_string(),
            reason: format!("{env} requires an https:// URL"),
        });
    }
    let organization_id = parse_i64("SLOTWATCH_ORGANIZATION_ID", "56")?;
    let service_type_id = parse_i64("SLOTWATCH_SERVICE_TYPE_ID", "156")?;

    let preferences_path = PathBuf::from(or_default(
        "SLOTWATCH_PREFERENCES_PATH",
        "./slotwatch-preferences.json",
    ));
    let locations_path = lookup("SLOTWATCH_LOCATIONS_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from);

    let request_timeout_secs = parse_u64("SLOTWATCH_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("SLOTWATCH_USER_AGENT", "slotwatch/0.1 (appointment-search)");
    let poll_interval_ms = parse_u64("SLOTWATCH_POLL_INTERVAL_MS", "10000")?;
    if poll_interval_ms == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SLOTWATCH_POLL_INTERVAL_MS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    let max_retries = parse_u32("SLOTWATCH_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("SLOTWATCH_RETRY_BACKOFF_BASE_MS", "500")?;

    Ok(AppConfig {
        env,
        log_level,
        session_cookie,
        application_key,
        application_name,
        base_url,
        organization_id,
        service_type_id,
        preferences_path,
        locations_path,
        request_timeout_secs,
        user_agent,
        poll_interval_ms,
        max_retries,
        retry_backoff_base_ms,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SLOTWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
