//! Error type for cloud client operations
//!
//! `CloudError` displays as its bare message: these errors end up verbatim
//! in status condition messages and in composed deletion errors, where the
//! text is the contract.

use thiserror::Error;

/// Classification of a cloud client error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudErrorKind {
    /// The request itself was malformed; retrying cannot succeed until the
    /// spec changes
    BadRequest,
    /// The referenced resource does not exist
    NotFound,
    /// Anything else; assumed transient and retried
    Other,
}

/// Error returned by the EKS cloud client
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CloudError {
    kind: CloudErrorKind,
    message: String,
}

impl CloudError {
    /// A terminal bad-request error (malformed spec)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            kind: CloudErrorKind::BadRequest,
            message: message.into(),
        }
    }

    /// A not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: CloudErrorKind::NotFound,
            message: message.into(),
        }
    }

    /// A transient error
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: CloudErrorKind::Other,
            message: message.into(),
        }
    }

    /// The error classification
    pub fn kind(&self) -> CloudErrorKind {
        self.kind
    }

    /// True when the error is terminal: a typed bad-request error, or a
    /// message carrying the cloud API's InvalidParameterException marker.
    ///
    /// The substring check mirrors how upstream SDKs surface this failure
    /// class through opaque error chains.
    pub fn is_bad_request(&self) -> bool {
        self.kind == CloudErrorKind::BadRequest
            || self.message.contains("InvalidParameterException")
    }

    /// True when the error indicates the resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.kind == CloudErrorKind::NotFound
    }
}
