//! Three-way result of a remote call.
//!
//! A fetch never returns `Err` and never panics: transport faults, HTTP
//! failures and decode problems all come back as data.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use skycast_core::{NetworkError, ReqwestErrorExt};

use crate::types::ApiErrorBody;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// 2xx with a decodable body
    Success(T),
    /// The server answered, but not with a usable success body
    Failure { code: u16, message: Option<String> },
    /// Transport, timeout or decode fault
    Exception(NetworkError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(v) => Outcome::Success(f(v)),
            Self::Failure { code, message } => Outcome::Failure { code, message },
            Self::Exception(e) => Outcome::Exception(e),
        }
    }

    /// `(code, message)` for anything but success; exceptions use code 0.
    pub fn error_parts(&self) -> Option<(u16, String)> {
        match self {
            Self::Success(_) => None,
            Self::Failure { code, message } => Some((*code, message.clone().unwrap_or_default())),
            Self::Exception(e) => Some((0, e.to_string())),
        }
    }
}

/// Send `request` and classify the response.
pub async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Outcome<T> {
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!("Request failed before a response: {}", e);
            return Outcome::Exception(e.into_network_error());
        }
    };

    let status = response.status();
    let body = match response.bytes().await {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!("Failed to read response body: {}", e);
            return Outcome::Exception(e.into_network_error());
        }
    };

    if !status.is_success() {
        let message = server_message(&body);
        tracing::debug!("Provider returned {}: {:?}", status, message);
        return Outcome::Failure {
            code: status.as_u16(),
            message,
        };
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Outcome::Failure {
            code: status.as_u16(),
            message: None,
        };
    }

    match serde_json::from_slice(&body) {
        Ok(value) => Outcome::Success(value),
        Err(e) => {
            tracing::debug!("Response body did not decode: {}", e);
            Outcome::Exception(NetworkError::InvalidResponse(e.to_string()))
        }
    }
}

/// Provider error message if the body carries one, else the raw text.
fn server_message(body: &[u8]) -> Option<String> {
    if let Ok(envelope) = serde_json::from_slice::<ApiErrorBody>(body) {
        return Some(envelope.error.message);
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    (!text.is_empty()).then_some(text)
}
