use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;

use crate::api::{ApiError, TokenProvider};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("token is not a JWT")]
    Malformed,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Authenticated { token: String, user_id: String },
    Anonymous,
}

#[derive(Debug, Deserialize)]
struct Claims {
    id: String,
    #[serde(default)]
    exp: Option<i64>,
}

/// In-memory authentication state shared by the API client and the UI.
pub struct Session {
    state: RwLock<AuthState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            state: RwLock::new(AuthState::Anonymous),
        }
    }

    /// Starts a session from a stored token. Expired or unreadable tokens
    /// leave the session anonymous.
    pub fn from_token(token: Option<&str>) -> Self {
        let session = Self::anonymous();
        if let Some(token) = token.filter(|token| !token.trim().is_empty()) {
            if let Err(err) = session.authenticate(token) {
                tracing::warn!(error = %err, "session: ignoring stored token");
            }
        }
        session
    }

    pub fn authenticate(&self, token: &str) -> Result<()> {
        let claims = decode_claims(token.trim())?;
        if let Some(exp) = claims.exp {
            if exp < Utc::now().timestamp() {
                return Err(SessionError::Expired.into());
            }
        }
        tracing::info!(user_id = %claims.id, "session: authenticated");
        *self.state.write() = AuthState::Authenticated {
            token: token.trim().to_string(),
            user_id: claims.id,
        };
        Ok(())
    }

    pub fn signout(&self) {
        *self.state.write() = AuthState::Anonymous;
    }

    pub fn state(&self) -> AuthState {
        self.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.read(), AuthState::Authenticated { .. })
    }

    pub fn user_id(&self) -> Option<String> {
        match &*self.state.read() {
            AuthState::Authenticated { user_id, .. } => Some(user_id.clone()),
            AuthState::Anonymous => None,
        }
    }
}

impl TokenProvider for Session {
    fn token(&self) -> Result<String, ApiError> {
        match &*self.state.read() {
            AuthState::Authenticated { token, .. } => Ok(token.clone()),
            AuthState::Anonymous => Err(ApiError::Unauthorized),
        }
    }

    fn invalidate(&self) {
        self.signout();
    }
}

fn decode_claims(token: &str) -> Result<Claims> {
    let payload = token.split('.').nth(1).ok_or(SessionError::Malformed)?;
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| SessionError::Malformed)?;
    serde_json::from_slice(&bytes).context("session: decode token claims")
}

#[cfg(test)]
pub(crate) fn test_token(user_id: &str, exp: i64) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = general_purpose::URL_SAFE_NO_PAD
        .encode(serde_json::json!({ "id": user_id, "exp": exp }).to_string());
    format!("{header}.{claims}.signature")
}
