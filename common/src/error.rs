use thiserror::Error;

use crate::data::{MAX_NAME_BYTES, MAX_PARTS, MAX_PART_SIZE, MIN_PART_SIZE};

/// Why a create negotiation did not produce an outcome.
///
/// The three variants are disjoint and none of them is retried here;
/// whether to try again is up to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// The request never completed or its response could not be read.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service rejected the request with its common error envelope.
    /// `code` and `message` are passed through verbatim.
    #[error("service error {code}: {message}")]
    Service { code: String, message: String },
    /// The response was readable and not an error envelope, but did not
    /// match the expected create result.
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Service,
    Decode,
}

impl NegotiationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NegotiationError::Transport(_) => ErrorKind::Transport,
            NegotiationError::Service { .. } => ErrorKind::Service,
            NegotiationError::Decode(_) => ErrorKind::Decode,
        }
    }

    /// The service error code, if the service produced one.
    pub fn code(&self) -> Option<&str> {
        match self {
            NegotiationError::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<TransportError> for NegotiationError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Failures reported by a [`Transport`](crate::transport::Transport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout(value.to_string())
        } else if value.is_connect() {
            Self::Connect(value.to_string())
        } else {
            Self::Other(value.to_string())
        }
    }
}

/// An [`UploadIntent`](crate::data::UploadIntent) that cannot be submitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("drive id must not be empty")]
    EmptyDriveId,
    #[error("name must not be empty")]
    EmptyName,
    #[error("name is {0} bytes, at most {max} are allowed", max = MAX_NAME_BYTES)]
    NameTooLong(usize),
    #[error("name must not end with '/'")]
    TrailingSeparator,
    #[error("a file needs at least one part")]
    NoParts,
    #[error("{0} parts requested, at most {max} are allowed", max = MAX_PARTS)]
    TooManyParts(usize),
    #[error("part {part_number} is out of order, expected part {expected}")]
    PartOutOfOrder { part_number: u32, expected: u32 },
    #[error(
        "part {part_number} has size {size}, parts must be between {min} and {max} bytes",
        min = MIN_PART_SIZE,
        max = MAX_PART_SIZE
    )]
    PartSize { part_number: u32, size: u64 },
    #[error("parts add up to {actual} bytes but the file has {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("file of {0} bytes cannot be split into {max} parts", max = MAX_PARTS)]
    FileTooLarge(u64),
}

/// Problems with a [`NegotiatorConfig`](crate::config::NegotiatorConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid base url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("access token is not a valid header value")]
    InvalidAccessToken,
    #[error("could not build http client: {0}")]
    Client(#[from] TransportError),
}
