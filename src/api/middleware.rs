//! API key authentication.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::config::Config;

/// Access settings for the HTTP API.
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// Bearer token clients must present. `None` disables authentication.
    pub api_key: Option<String>,
    /// Origins allowed by CORS. `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
}

impl SecurityConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.api_key.clone(),
            cors_origins: config.cors_origins.clone(),
        }
    }

    /// No authentication, any origin. For local use and tests.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            cors_origins: None,
        }
    }
}

/// Reject requests that do not carry the configured bearer token.
pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected_key) = &config.api_key else {
        return Ok(next.run(request).await);
    };

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.map(|h| h.strip_prefix("Bearer ")) {
        Some(Some(token)) if token == expected_key => Ok(next.run(request).await),
        Some(Some(_)) => {
            tracing::warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        Some(None) => {
            tracing::warn!("Invalid Authorization header format");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_has_no_auth() {
        let config = SecurityConfig::disabled();
        assert!(config.api_key.is_none());
        assert!(config.cors_origins.is_none());
    }

    #[test]
    fn takes_key_and_origins_from_config() {
        let config = SecurityConfig::from_config(&Config {
            api_key: Some("secret".into()),
            cors_origins: Some(vec!["http://satellite.example".into()]),
            ..Default::default()
        });

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(
            config.cors_origins,
            Some(vec!["http://satellite.example".to_string()])
        );
    }
}
