//! Configuration for the Bedrock Runtime client.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error, PartialEq)]
pub enum SonicConfigError {
    #[error("Invalid region: {0}")]
    InvalidRegion(String),
    #[error("Invalid credentials: access key id is empty")]
    EmptyAccessKeyId,
    #[error("Invalid credentials: secret access key is empty")]
    EmptySecretAccessKey,
}

/// Explicit AWS credentials. Without them the default provider chain is used.
#[derive(Debug)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<String>,
}

#[derive(Debug)]
pub struct SonicClientConfig {
    pub region: String,
    /// Overrides the regional Bedrock Runtime endpoint.
    pub endpoint_url: Option<String>,
    pub credentials: Option<StaticCredentials>,
}

impl Default for SonicClientConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            credentials: None,
        }
    }
}

impl SonicClientConfig {
    /// The endpoint the client talks to.
    pub fn endpoint_url(&self) -> String {
        self.endpoint_url
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region))
    }

    pub fn validate(&self) -> Result<(), SonicConfigError> {
        let region_ok = !self.region.is_empty()
            && self
                .region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !region_ok {
            return Err(SonicConfigError::InvalidRegion(self.region.clone()));
        }

        if let Some(credentials) = &self.credentials {
            if credentials.access_key_id.trim().is_empty() {
                return Err(SonicConfigError::EmptyAccessKeyId);
            }
            if credentials.secret_access_key.expose_secret().trim().is_empty() {
                return Err(SonicConfigError::EmptySecretAccessKey);
            }
        }
        Ok(())
    }
}
