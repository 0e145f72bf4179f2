// src/error.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Error types surfaced by the storage client collaborator and the download path.
//!
//! Everything a host sees is a [`TransportError`]; its [`TransportErrorKind`]
//! tells the credential, service, incomplete-transfer and catch-all cases apart.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed cause kept for diagnostics.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure raised by an [`ObjectClient`](crate::object_client::ObjectClient) or
/// while building one.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No usable credentials: nothing configured and no ambient provider answered.
    #[error("credentials could not be loaded")]
    Credentials(#[source] BoxError),

    /// The service (or the network in front of it) rejected or failed the request.
    #[error("storage service request failed")]
    Service(#[source] BoxError),

    #[error("storage client failure")]
    Other(#[source] BoxError),
}

impl ClientError {
    pub fn credentials(cause: impl Into<BoxError>) -> Self {
        ClientError::Credentials(cause.into())
    }

    pub fn service(cause: impl Into<BoxError>) -> Self {
        ClientError::Service(cause.into())
    }

    pub fn other(cause: impl Into<BoxError>) -> Self {
        ClientError::Other(cause.into())
    }
}

/// Which branch of the failure taxonomy a [`TransportError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Credential,
    ServiceConnection,
    IncompleteTransfer,
    Unclassified,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Credential => "credential",
            TransportErrorKind::ServiceConnection => "service-connection",
            TransportErrorKind::IncompleteTransfer => "incomplete-transfer",
            TransportErrorKind::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}

/// Uniform download failure handed back to the host.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    status: Option<u16>,
    message: String,
    #[source]
    source: Option<BoxError>,
}

pub const CREDENTIAL_HINT: &str = "Please add key/secret or a profile name to the amazon-aws \
    configuration, or attach an instance role to this machine.";

impl TransportError {
    pub fn credential(cause: impl Into<BoxError>) -> Self {
        Self {
            kind: TransportErrorKind::Credential,
            status: Some(403),
            message: CREDENTIAL_HINT.to_string(),
            source: Some(cause.into()),
        }
    }

    pub fn service_connection(cause: impl Into<BoxError>) -> Self {
        Self {
            kind: TransportErrorKind::ServiceConnection,
            status: None,
            message: "Connection to Amazon S3 failed.".to_string(),
            source: Some(cause.into()),
        }
    }

    pub fn incomplete_transfer(key: &str, url: &str) -> Self {
        Self {
            kind: TransportErrorKind::IncompleteTransfer,
            status: None,
            message: format!("Unknown error occurred: '{key}' was not downloaded from '{url}'."),
            source: None,
        }
    }

    pub fn unclassified(cause: impl Into<BoxError>) -> Self {
        Self {
            kind: TransportErrorKind::Unclassified,
            status: None,
            message: "Unexpected failure while downloading from S3.".to_string(),
            source: Some(cause.into()),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// HTTP-like status when known (403 for credential failures).
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Credentials(_) => TransportError::credential(err),
            ClientError::Service(_) => TransportError::service_connection(err),
            ClientError::Other(_) => TransportError::unclassified(err),
        }
    }
}
