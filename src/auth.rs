//! Bearer tokens for Google API calls.
//!
//! On Cloud Run and GCE the metadata server hands out tokens for the attached
//! service account. A static token (e.g. from `gcloud auth print-access-token`)
//! covers local runs, and emulators take no token at all.

use crate::error::AuthError;
use serde::Deserialize;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// No `Authorization` header (emulators)
    Anonymous,
    /// Fixed token from configuration
    Static(String),
    /// Fetched from the instance metadata server on every call
    MetadataServer { url: String },
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    #[serde(default)]
    access_token: String,
}

impl TokenSource {
    /// Static token when one is configured, the metadata server otherwise.
    pub fn from_settings(access_token: Option<String>) -> Self {
        match access_token {
            Some(token) => TokenSource::Static(token),
            None => TokenSource::MetadataServer {
                url: METADATA_TOKEN_URL.to_string(),
            },
        }
    }

    /// Token to send as `Authorization: Bearer ...`, `None` for anonymous.
    pub fn bearer(&self, client: &reqwest::blocking::Client) -> Result<Option<String>, AuthError> {
        match self {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::MetadataServer { url } => {
                let response = client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .map_err(AuthError::Transport)?;

                if !response.status().is_success() {
                    return Err(AuthError::Status(response.status().as_u16()));
                }

                let token: MetadataToken = response.json().map_err(AuthError::Transport)?;
                if token.access_token.is_empty() {
                    return Err(AuthError::MissingToken);
                }
                Ok(Some(token.access_token))
            }
        }
    }

    /// Attach the bearer token, if any, to an outgoing request.
    pub fn authorize(
        &self,
        client: &reqwest::blocking::Client,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::RequestBuilder, AuthError> {
        Ok(match self.bearer(client)? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}
