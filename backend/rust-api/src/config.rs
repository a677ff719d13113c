use serde::Deserialize;
use std::env;

/// Task pool snapshots live between these bounds; values outside are clamped
/// at load time.
const TASK_POOL_TTL_MIN_SECONDS: u64 = 500;
const TASK_POOL_TTL_MAX_SECONDS: u64 = 3600;

const DEFAULT_TASK_POOL_TTL_SECONDS: u64 = 3600;
const DEFAULT_SESSION_DURATION_MINUTES: i64 = 60;
const DEFAULT_PRACTICE_RATE_LIMIT: u32 = 10;
const DEFAULT_PRACTICE_RATE_WINDOW_SECONDS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub task_pool_ttl_seconds: u64,
    pub session_duration_minutes: i64,
    pub practice_rate_limit: u32,
    pub practice_rate_window_seconds: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            // Fallback to current directory .env for backward compatibility
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017/examhall".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "examhall".to_string());

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let task_pool_ttl_seconds = settings
            .get_int("tasks.pool_ttl_seconds")
            .ok()
            .map(|v| v as u64)
            .or_else(|| {
                env::var("TASK_POOL_TTL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
            })
            .map(clamp_pool_ttl)
            .unwrap_or(DEFAULT_TASK_POOL_TTL_SECONDS);

        let session_duration_minutes = settings
            .get_int("sessions.duration_minutes")
            .ok()
            .or_else(|| {
                env::var("SESSION_DURATION_MINUTES")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
            })
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SESSION_DURATION_MINUTES);

        let practice_rate_limit = settings
            .get_int("rate_limit.practice_requests")
            .ok()
            .map(|v| v as u32)
            .or_else(|| {
                env::var("RATE_LIMIT_PRACTICE")
                    .ok()
                    .and_then(|v| v.parse::<u32>().ok())
            })
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_PRACTICE_RATE_LIMIT);

        let practice_rate_window_seconds = settings
            .get_int("rate_limit.practice_window_seconds")
            .ok()
            .map(|v| v as u64)
            .or_else(|| {
                env::var("RATE_LIMIT_PRACTICE_WINDOW_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
            })
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_PRACTICE_RATE_WINDOW_SECONDS);

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            task_pool_ttl_seconds,
            session_duration_minutes,
            practice_rate_limit,
            practice_rate_window_seconds,
        })
    }
}

fn clamp_pool_ttl(seconds: u64) -> u64 {
    seconds.clamp(TASK_POOL_TTL_MIN_SECONDS, TASK_POOL_TTL_MAX_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_ttl_is_clamped_to_the_recommended_range() {
        assert_eq!(clamp_pool_ttl(10), 500);
        assert_eq!(clamp_pool_ttl(500), 500);
        assert_eq!(clamp_pool_ttl(1800), 1800);
        assert_eq!(clamp_pool_ttl(86400), 3600);
    }
}
