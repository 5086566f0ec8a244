//! Typed error types for the download bot.
//!
//! Terminal job results (too large, not found, ...) are not errors: they are
//! [`crate::job::Outcome`] values reported to the user. The types here cover
//! infrastructure failures around them.
//!
//! Error codes are stable identifiers for logs:
//! - `E_VAL_*`: Validation errors (bad input or configuration)
//! - `E_IO_*`: File system errors
//! - `E_RES_*`: Metadata resolution errors (never retried automatically)
//! - `E_DL_*`: Retrieval process errors
//! - `E_NET_*`: Network errors (often retryable)
//! - `E_Q_*`: Queue and admission errors
//! - `E_DELIVERY_*`: Errors while sending results to the chat
//! - `E_INT_*`: Internal errors (should be reported)

use serde::Serialize;
use thiserror::Error;

/// Stable error codes attached to log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (E_VAL_*)
    EValInvalidReference,
    EValInvalidPayload,
    EValInvalidConfig,

    // IO errors (E_IO_*)
    EIoNotFound,
    EIoPermissionDenied,
    EIoWriteFailed,

    // Resolution errors (E_RES_*)
    EResProcessFailed,
    EResMalformedOutput,
    EResNoResults,
    EResTimeout,

    // Download errors (E_DL_*)
    EDlProcessFailed,
    EDlTooLarge,
    EDlTimeout,

    // Network errors (E_NET_*)
    ENetConnectionFailed,

    // Queue errors (E_Q_*)
    EQueueRejected,
    EQueueDuplicate,

    // Delivery errors
    EDeliveryFailed,

    // Internal errors (E_INT_*)
    EInternal,
}

impl ErrorCode {
    /// Returns whether this error is typically retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ENetConnectionFailed | Self::EDlTimeout | Self::EDlProcessFailed)
    }

    /// Returns the error code as a string (e.g., "E_RES_NO_RESULTS").
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EValInvalidReference => "E_VAL_INVALID_REFERENCE",
            Self::EValInvalidPayload => "E_VAL_INVALID_PAYLOAD",
            Self::EValInvalidConfig => "E_VAL_INVALID_CONFIG",
            Self::EIoNotFound => "E_IO_NOT_FOUND",
            Self::EIoPermissionDenied => "E_IO_PERMISSION_DENIED",
            Self::EIoWriteFailed => "E_IO_WRITE_FAILED",
            Self::EResProcessFailed => "E_RES_PROCESS_FAILED",
            Self::EResMalformedOutput => "E_RES_MALFORMED_OUTPUT",
            Self::EResNoResults => "E_RES_NO_RESULTS",
            Self::EResTimeout => "E_RES_TIMEOUT",
            Self::EDlProcessFailed => "E_DL_PROCESS_FAILED",
            Self::EDlTooLarge => "E_DL_TOO_LARGE",
            Self::EDlTimeout => "E_DL_TIMEOUT",
            Self::ENetConnectionFailed => "E_NET_CONNECTION_FAILED",
            Self::EQueueRejected => "E_Q_REJECTED",
            Self::EQueueDuplicate => "E_Q_DUPLICATE",
            Self::EDeliveryFailed => "E_DELIVERY_FAILED",
            Self::EInternal => "E_INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationKind {
    InvalidReference,
    InvalidPayload,
    InvalidConfig,
}

/// Why a reference could not be turned into a media summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionKind {
    ProcessFailed,
    MalformedOutput,
    NoResults,
    Timeout,
}

/// Kinds of queue errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueueErrorKind {
    Duplicate,
}

/// Unified error type for the download bot.
#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("validation error ({kind:?}): {message}")]
    Validation { kind: ValidationKind, message: String },

    #[error("io error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not resolve {reference:?} ({kind:?}): {message}")]
    Resolution {
        kind: ResolutionKind,
        reference: String,
        message: String,
    },

    #[error("estimated size {estimated_size_bytes} bytes is at or above the {threshold} byte admission threshold")]
    Admission { estimated_size_bytes: u64, threshold: u64 },

    #[error("queue error ({kind:?}): {message}")]
    Queue { kind: QueueErrorKind, message: String },

    #[error("delivery failed: {message}")]
    Delivery { message: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DownloaderError {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { kind, .. } => match kind {
                ValidationKind::InvalidReference => ErrorCode::EValInvalidReference,
                ValidationKind::InvalidPayload => ErrorCode::EValInvalidPayload,
                ValidationKind::InvalidConfig => ErrorCode::EValInvalidConfig,
            },
            Self::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::EIoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::EIoPermissionDenied,
                _ => ErrorCode::EIoWriteFailed,
            },
            Self::Resolution { kind, .. } => match kind {
                ResolutionKind::ProcessFailed => ErrorCode::EResProcessFailed,
                ResolutionKind::MalformedOutput => ErrorCode::EResMalformedOutput,
                ResolutionKind::NoResults => ErrorCode::EResNoResults,
                ResolutionKind::Timeout => ErrorCode::EResTimeout,
            },
            Self::Admission { .. } => ErrorCode::EQueueRejected,
            Self::Queue { kind, .. } => match kind {
                QueueErrorKind::Duplicate => ErrorCode::EQueueDuplicate,
            },
            Self::Delivery { .. } => ErrorCode::EDeliveryFailed,
            Self::Network { .. } => ErrorCode::ENetConnectionFailed,
            Self::Internal { .. } => ErrorCode::EInternal,
        }
    }

    /// Whether the caller may retry without user involvement.
    ///
    /// Resolution failures are never retryable: the user has to be re-prompted.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

// Convenience constructors
impl DownloaderError {
    /// Create a reference validation error.
    pub fn invalid_reference(message: impl Into<String>) -> Self {
        Self::Validation {
            kind: ValidationKind::InvalidReference,
            message: message.into(),
        }
    }

    /// Create a callback payload validation error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::Validation {
            kind: ValidationKind::InvalidPayload,
            message: message.into(),
        }
    }

    /// Create a configuration validation error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::Validation {
            kind: ValidationKind::InvalidConfig,
            message: message.into(),
        }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a resolution error.
    pub fn resolution(kind: ResolutionKind, reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            kind,
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Create a queue duplicate error.
    pub fn queue_duplicate(message: impl Into<String>) -> Self {
        Self::Queue {
            kind: QueueErrorKind::Duplicate,
            message: message.into(),
        }
    }

    /// Create a delivery error.
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<teloxide::RequestError> for DownloaderError {
    fn from(err: teloxide::RequestError) -> Self {
        Self::delivery(err.to_string())
    }
}
