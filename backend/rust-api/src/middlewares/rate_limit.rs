use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::ApiError;
use crate::services::AppState;

fn extract_client_ip_from(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    // Preferred order: X-Forwarded-For, Forwarded, X-Real-IP, ConnectInfo
    if let Some(v) = headers.get("x-forwarded-for") {
        if let Ok(s) = v.to_str() {
            // x-forwarded-for can be a comma separated list; take first
            return s.split(',').next().unwrap_or(s).trim().to_string();
        }
    }

    if let Some(v) = headers.get("forwarded") {
        if let Ok(s) = v.to_str() {
            // forwarded: for=1.2.3.4; proto=http; by=...
            for part in s.split(';') {
                let p = part.trim();
                if p.starts_with("for=") {
                    let val = p.trim_start_matches("for=").trim().trim_matches('\"');
                    return val.to_string();
                }
            }
        }
    }

    if let Some(v) = headers.get("x-real-ip") {
        if let Ok(s) = v.to_str() {
            return s.trim().to_string();
        }
    }

    // Fall back to ConnectInfo socket address if available
    if let Some(ci) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return ci.0.ip().to_string();
    }

    "unknown".to_string()
}

/// Rolling-window quota on new practice exams, keyed by user identity (with
/// an IP fallback for requests that somehow carry no claims). Exceeding the
/// quota is the distinct RateLimited outcome, separate from lock conflicts
/// and empty pools.
pub async fn practice_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Allow disabling rate limits in local perf runs by setting RATE_LIMIT_DISABLED=1
    if std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1" {
        tracing::debug!("Rate limiting disabled via RATE_LIMIT_DISABLED=1");
        return Ok(next.run(request).await);
    }

    let key = match request
        .extensions()
        .get::<super::auth::JwtClaims>()
        .map(|claims| claims.sub.clone())
    {
        Some(uid) => format!("ratelimit:practice:user:{}", uid),
        None => {
            let ip = extract_client_ip_from(request.headers(), request.extensions());
            format!("ratelimit:practice:ip:{}", ip)
        }
    };

    let limit = state.config.practice_rate_limit;
    let window = state.config.practice_rate_window_seconds;

    let allowed = check_rate_limit_with_window(&state.redis, &key, limit, window)
        .await
        .map_err(|e| ApiError::Internal(e.context("Rate limit check failed")))?;

    if !allowed {
        tracing::info!("Rate limit exceeded: {}", key);
        return Err(ApiError::RateLimited);
    }

    Ok(next.run(request).await)
}

/// Atomic check-and-increment for one rolling window. The whole decision runs
/// inside Redis so concurrent requests never undercount.
async fn check_rate_limit_with_window(
    redis: &ConnectionManager,
    key: &str,
    limit: u32,
    window_seconds: u64,
) -> anyhow::Result<bool> {
    let mut conn = redis.clone();

    let lua_script = r#"
        local key = KEYS[1]
        local limit = tonumber(ARGV[1])
        local window = tonumber(ARGV[2])

        local current = redis.call('GET', key)

        if current == false then
            redis.call('SET', key, 1, 'EX', window)
            return 1
        end

        current = tonumber(current)

        if current >= limit then
            return 0
        end

        redis.call('INCR', key)
        return 1
    "#;

    let allowed: u32 = redis::Script::new(lua_script)
        .key(key)
        .arg(limit)
        .arg(window_seconds)
        .invoke_async(&mut conn)
        .await?;

    Ok(allowed == 1)
}
