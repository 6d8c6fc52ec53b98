use async_trait::async_trait;

use crate::error::PortalError;

pub const TOKEN_ENV: &str = "PORTAL_TOKEN";

/// External source of bearer credentials. Refresh mechanics live behind it.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, PortalError>;
}

#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, PortalError> {
        Ok(self.0.clone())
    }
}

/// Reads the token from `PORTAL_TOKEN` on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvTokenProvider;

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn token(&self) -> Result<String, PortalError> {
        match std::env::var(TOKEN_ENV) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(PortalError::TokenUnavailable(format!("{TOKEN_ENV} is not set"))),
        }
    }
}

#[async_trait]
impl<T: TokenProvider + ?Sized> TokenProvider for std::sync::Arc<T> {
    async fn token(&self) -> Result<String, PortalError> {
        (**self).token().await
    }
}
