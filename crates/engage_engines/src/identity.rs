#![forbid(unsafe_code)]

use std::env;
use std::fmt;

pub const API_TOKEN_ENV: &str = "ENGAGE_API_TOKEN";

#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// The identity provider, reduced to "give me a token if there is a session".
pub trait TokenProvider: Send + Sync {
    fn get_token(&self) -> Option<BearerToken>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<BearerToken>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<BearerToken>) -> Self {
        Self { token }
    }

    pub fn signed_out() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn get_token(&self) -> Option<BearerToken> {
        self.token.clone()
    }
}

/// Reads `ENGAGE_API_TOKEN` on every call so a rotated token is picked up.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvTokenProvider;

impl TokenProvider for EnvTokenProvider {
    fn get_token(&self) -> Option<BearerToken> {
        env::var(API_TOKEN_ENV).ok().and_then(BearerToken::new)
    }
}
