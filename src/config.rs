//! Configuration management
//!
//! All configurable parameters in one place with environment variable
//! overrides. Sensible defaults for local development, explicit settings
//! required in production.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default development-only signing secret, refused in production
const DEV_AUTH_SECRET: &str = "edusight-dev-secret-change-in-production";

/// Generation provider settings
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// OpenAI-compatible API base, e.g. https://api.openai.com/v1
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Per-attempt request timeout
    pub request_timeout: Duration,
    /// Total attempt budget against the overload signal
    pub max_attempts: u32,
    /// Backoff base delay
    pub base_delay: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            request_timeout: Duration::from_secs(60),
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Allowed origins (empty = allow all)
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Convert to tower-http CorsLayer
    pub fn to_layer(&self) -> tower_http::cors::CorsLayer {
        use tower_http::cors::{AllowOrigin, Any, CorsLayer};

        let layer = CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any);

        if self.allowed_origins.is_empty() {
            // Intentionally permissive - no origins configured
            return layer.allow_origin(Any);
        }

        let mut valid_origins = Vec::new();
        for origin_str in &self.allowed_origins {
            match origin_str.parse::<axum::http::HeaderValue>() {
                Ok(origin) => valid_origins.push(origin),
                Err(_) => tracing::warn!("CORS: invalid origin '{}' - skipping", origin_str),
            }
        }

        if valid_origins.is_empty() {
            // All configured origins failed to parse. Do NOT fall back to
            // permissive; reject all cross-origin requests instead.
            tracing::error!(
                "CORS: all {} configured origin(s) failed to parse, rejecting cross-origin requests",
                self.allowed_origins.len()
            );
            return layer.allow_origin(AllowOrigin::list(Vec::new()));
        }

        layer.allow_origin(AllowOrigin::list(valid_origins))
    }
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub storage_path: PathBuf,
    /// HS256 shared secret for bearer-token verification
    pub auth_secret: String,
    pub generation: GenerationConfig,
    pub cors: CorsConfig,
    /// Cap on concurrently processed requests
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3400,
            storage_path: PathBuf::from("./edusight_data"),
            auth_secret: DEV_AUTH_SECRET.to_string(),
            generation: GenerationConfig::default(),
            cors: CorsConfig::default(),
            max_concurrent_requests: 100,
        }
    }
}

impl ServerConfig {
    /// Load from environment variables with production safety checks
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = env::var("EDUSIGHT_PORT") {
            if let Ok(port) = val.parse() {
                config.port = port;
            }
        }

        if let Ok(path) = env::var("EDUSIGHT_STORAGE_PATH") {
            config.storage_path = PathBuf::from(path);
        }

        if let Ok(secret) = env::var("EDUSIGHT_AUTH_SECRET") {
            if !secret.trim().is_empty() {
                config.auth_secret = secret;
            }
        }

        if let Ok(url) = env::var("EDUSIGHT_GENERATION_URL") {
            config.generation.base_url = url;
        }
        if let Ok(key) = env::var("EDUSIGHT_GENERATION_API_KEY") {
            config.generation.api_key = key;
        }
        if let Ok(model) = env::var("EDUSIGHT_GENERATION_MODEL") {
            config.generation.model = model;
        }
        if let Ok(val) = env::var("EDUSIGHT_GENERATION_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.generation.request_timeout = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = env::var("EDUSIGHT_GENERATION_MAX_ATTEMPTS") {
            if let Ok(n) = val.parse::<u32>() {
                config.generation.max_attempts = n.max(1);
            }
        }
        if let Ok(val) = env::var("EDUSIGHT_GENERATION_BASE_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                config.generation.base_delay = Duration::from_millis(ms);
            }
        }

        if let Ok(origins) = env::var("EDUSIGHT_CORS_ORIGINS") {
            config.cors.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(val) = env::var("EDUSIGHT_MAX_CONCURRENT") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_requests = n;
            }
        }

        // Production safety checks
        let is_production = env::var("EDUSIGHT_ENV")
            .map(|v| {
                let v = v.to_lowercase();
                v == "production" || v == "prod"
            })
            .unwrap_or(false);

        if is_production {
            if config.auth_secret == DEV_AUTH_SECRET {
                anyhow::bail!(
                    "EDUSIGHT_AUTH_SECRET not set in production mode; refusing to start \
                     with the development secret"
                );
            }
            if config.generation.api_key.is_empty() {
                anyhow::bail!("EDUSIGHT_GENERATION_API_KEY not set in production mode");
            }
            if config.cors.allowed_origins.is_empty() {
                tracing::warn!(
                    "PRODUCTION WARNING: CORS allows all origins. Set EDUSIGHT_CORS_ORIGINS."
                );
            }
        } else if config.auth_secret == DEV_AUTH_SECRET {
            tracing::warn!(
                "EDUSIGHT_AUTH_SECRET not set - using development secret (not for production!)"
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.generation.base_delay, Duration::from_secs(1));
        assert!(config.cors.allowed_origins.is_empty());
    }

    #[test]
    fn cors_layer_builds_with_empty_and_configured_origins() {
        let _ = CorsConfig::default().to_layer();
        let _ = CorsConfig {
            allowed_origins: vec!["https://school.example".into(), "not a url\u{7f}".into()],
        }
        .to_layer();
    }
}
