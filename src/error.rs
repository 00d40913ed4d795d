//! Error types for the ingestion adapter and the publisher

use thiserror::Error;

/// Failure of a single push request. Never fatal to the serving process.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The request body could not be read from the transport
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The body is not a push envelope
    #[error("malformed push envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// `message.data` is not valid base64
    #[error("message data is not valid base64: {0}")]
    PayloadEncoding(#[from] base64::DecodeError),

    /// The decoded payload is not a reading
    #[error("failed to unmarshal the reading payload: {0}")]
    Payload(#[source] serde_json::Error),

    /// `PollutionIndex` is outside the status code table
    #[error("no valid pollution status description was found using the code {0}")]
    UnknownPollutionCode(i32),

    /// The row could not be written
    #[error("table write failed: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// True when the request itself is at fault; retrying it unchanged cannot succeed.
    pub fn is_rejected_input(&self) -> bool {
        !matches!(self, IngestError::Store(_))
    }
}

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// HTTP client could not be constructed
    #[error("could not build storage client: {0}")]
    Client(#[source] reqwest::Error),

    /// No credentials for the request
    #[error("storage authorization failed: {0}")]
    Auth(#[from] AuthError),

    /// Request never produced a response
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Backend answered with a non-success status
    #[error("backend rejected mutation with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Access token errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Metadata server unreachable
    #[error("metadata server request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Metadata server refused to issue a token
    #[error("metadata server returned HTTP {0}")]
    Status(u16),

    /// Metadata server answered without a token
    #[error("metadata server response carried no access token")]
    MissingToken,
}

/// Publisher errors
#[derive(Error, Debug)]
pub enum PublishError {
    /// HTTP client could not be constructed
    #[error("error occurred when obtaining a new client: {0}")]
    Client(#[source] reqwest::Error),

    /// Reading could not be serialized
    #[error("failed to serialize the reading: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No credentials for the request
    #[error("publish authorization failed: {0}")]
    Auth(#[from] AuthError),

    /// Request never produced a response
    #[error("error occurred when publishing the message: {0}")]
    Transport(#[source] reqwest::Error),

    /// Pub/Sub answered with a non-success status
    #[error("topic rejected the message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Pub/Sub accepted the request but assigned no message id
    #[error("publish response contained no message id")]
    EmptyResponse,
}

/// Configuration errors, reported before the process binds a port
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more mandatory settings are unset or empty
    #[error(
        "unable to start the service as one or more required fields is not supplied: {}",
        .0.join(", ")
    )]
    Missing(Vec<&'static str>),

    /// A setting is present but unusable
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    /// Configuration file could not be read
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for the expected settings
    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
