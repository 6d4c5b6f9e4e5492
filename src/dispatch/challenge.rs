//! Pluggable authentication-retry protocol.

use super::{HttpRequest, HttpResponse};
use crate::error::ChallengeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;

/// Detects and answers an HTTP authentication challenge.
///
/// `challenge_response` is only called after `challenge_accepted` returned
/// true, and must hand back a request whose body can be sent again.
pub trait Challenger: Send + Sync {
    /// Whether `response` is a challenge this implementation can answer.
    fn challenge_accepted(&self, response: &HttpResponse) -> bool {
        response.status == StatusCode::UNAUTHORIZED && response.headers.contains_key(WWW_AUTHENTICATE)
    }

    /// Build the authenticated replay of `request`.
    fn challenge_response(
        &self,
        request: HttpRequest,
        response: &HttpResponse,
    ) -> Result<HttpRequest, ChallengeError>;
}

/// HTTP Basic authentication.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: Option<String>,
}

impl BasicAuth {
    /// Create a responder without a password; it fails until one is set.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Replace the stored secret.
    pub fn set_credentials(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.username = username.into();
        self.password = Some(password.into());
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl Challenger for BasicAuth {
    fn challenge_response(
        &self,
        request: HttpRequest,
        _response: &HttpResponse,
    ) -> Result<HttpRequest, ChallengeError> {
        let password = self
            .password
            .as_deref()
            .ok_or(ChallengeError::MissingCredentials)?;

        let token = STANDARD.encode(format!("{}:{}", self.username, password));
        let value = HeaderValue::from_str(&format!("Basic {}", token))
            .map_err(|e| ChallengeError::InvalidHeader(e.to_string()))?;

        Ok(request.with_header(AUTHORIZATION, value))
    }
}
