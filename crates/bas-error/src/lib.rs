// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable error codes for the breach-and-attack simulation engine.
//!
//! Every engine-level error carries an [`ErrorCode`] (a machine-readable,
//! stable string tag), a human-readable message, an optional cause chain and
//! arbitrary key-value context. Step failures recorded in a job's event log
//! carry the code so that, for example, an operation poll timeout can be told
//! apart from an ordinary remote API error.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Job orchestration and state machine errors.
    Engine,
    /// Platform adapter errors.
    Adapter,
    /// Remote red-team automation service errors.
    Remote,
    /// Configuration errors.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Engine => "engine",
            Self::Adapter => "adapter",
            Self::Remote => "remote",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Engine --
    /// A job tried to move along an edge the state machine does not allow.
    InvalidTransition,
    /// The execution loop itself failed (not a single step).
    ExecutionFailed,

    // -- Adapter --
    /// No adapter is registered for the scenario's platform.
    AdapterNotRegistered,
    /// An adapter returned an unexpected error while executing a step.
    AdapterFailed,
    /// An adapter panicked while executing a step.
    AdapterPanicked,
    /// A step's platform metadata could not be interpreted by the adapter.
    InvalidStepMetadata,

    // -- Remote --
    /// The remote service rejected our credentials (401/403).
    RemoteAuthentication,
    /// The remote service answered with a non-success status.
    RemoteApi,
    /// The remote service could not be reached or timed out.
    RemoteUnavailable,
    /// A polling deadline elapsed before its success criterion was met.
    OperationTimeout,
    /// A step needed a remote operation but none was created for the job.
    OperationNotInitialized,

    // -- Config --
    /// Configuration file or value is invalid.
    ConfigInvalid,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTransition | Self::ExecutionFailed => ErrorCategory::Engine,

            Self::AdapterNotRegistered
            | Self::AdapterFailed
            | Self::AdapterPanicked
            | Self::InvalidStepMetadata => ErrorCategory::Adapter,

            Self::RemoteAuthentication
            | Self::RemoteApi
            | Self::RemoteUnavailable
            | Self::OperationTimeout
            | Self::OperationNotInitialized => ErrorCategory::Remote,

            Self::ConfigInvalid => ErrorCategory::Config,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"OPERATION_TIMEOUT"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::ExecutionFailed => "EXECUTION_FAILED",
            Self::AdapterNotRegistered => "ADAPTER_NOT_REGISTERED",
            Self::AdapterFailed => "ADAPTER_FAILED",
            Self::AdapterPanicked => "ADAPTER_PANICKED",
            Self::InvalidStepMetadata => "INVALID_STEP_METADATA",
            Self::RemoteAuthentication => "REMOTE_AUTHENTICATION",
            Self::RemoteApi => "REMOTE_API",
            Self::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            Self::OperationTimeout => "OPERATION_TIMEOUT",
            Self::OperationNotInitialized => "OPERATION_NOT_INITIALIZED",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BasError
// ---------------------------------------------------------------------------

/// Unified simulation error.
///
/// # Builder usage
///
/// ```
/// use bas_error::{BasError, ErrorCode};
///
/// let err = BasError::new(ErrorCode::OperationTimeout, "only 2 links seen")
///     .with_context("minimum_links", 5)
///     .with_context("operation_id", "op-1");
/// assert_eq!(err.code, ErrorCode::OperationTimeout);
/// ```
pub struct BasError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl BasError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// Values that fail to serialise are skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for BasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("BasError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for BasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty()
            && let Ok(ctx) = serde_json::to_string(&self.context)
        {
            write!(f, " {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`BasError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&BasError> for BasErrorDto {
    fn from(err: &BasError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<BasErrorDto> for BasError {
    fn from(dto: BasErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::InvalidTransition,
        ErrorCode::ExecutionFailed,
        ErrorCode::AdapterNotRegistered,
        ErrorCode::AdapterFailed,
        ErrorCode::AdapterPanicked,
        ErrorCode::InvalidStepMetadata,
        ErrorCode::RemoteAuthentication,
        ErrorCode::RemoteApi,
        ErrorCode::RemoteUnavailable,
        ErrorCode::OperationTimeout,
        ErrorCode::OperationNotInitialized,
        ErrorCode::ConfigInvalid,
        ErrorCode::Internal,
    ];

    #[test]
    fn display_without_context() {
        let err = BasError::new(ErrorCode::AdapterNotRegistered, "no adapter for metasploit");
        assert_eq!(
            err.to_string(),
            "[ADAPTER_NOT_REGISTERED] no adapter for metasploit"
        );
    }

    #[test]
    fn display_with_context() {
        let err = BasError::new(ErrorCode::OperationTimeout, "timed out")
            .with_context("links_seen", 2);
        let s = err.to_string();
        assert!(s.starts_with("[OPERATION_TIMEOUT] timed out"));
        assert!(s.contains("links_seen"));
    }

    #[test]
    fn debug_with_source() {
        let src = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = BasError::new(ErrorCode::RemoteUnavailable, "unreachable").with_source(src);
        let dbg = format!("{err:?}");
        assert!(dbg.contains("RemoteUnavailable"));
        assert!(dbg.contains("refused"));
    }

    #[test]
    fn remote_codes_categorised() {
        for code in [
            ErrorCode::RemoteAuthentication,
            ErrorCode::RemoteApi,
            ErrorCode::RemoteUnavailable,
            ErrorCode::OperationTimeout,
            ErrorCode::OperationNotInitialized,
        ] {
            assert_eq!(code.category(), ErrorCategory::Remote, "{code:?}");
        }
    }

    #[test]
    fn adapter_codes_categorised() {
        assert_eq!(
            ErrorCode::AdapterNotRegistered.category(),
            ErrorCategory::Adapter
        );
        assert_eq!(ErrorCode::AdapterPanicked.category(), ErrorCategory::Adapter);
        assert_eq!(ErrorCode::ConfigInvalid.category(), ErrorCategory::Config);
        assert_eq!(ErrorCode::Internal.category(), ErrorCategory::Internal);
    }

    #[test]
    fn std_error_source_chain() {
        let inner = io::Error::other("socket closed");
        let err = BasError::new(ErrorCode::RemoteUnavailable, "gone").with_source(inner);
        let src = std::error::Error::source(&err).unwrap();
        assert_eq!(src.to_string(), "socket closed");
    }

    #[test]
    fn dto_keeps_source_message_only() {
        let src = io::Error::other("inner");
        let err = BasError::new(ErrorCode::RemoteApi, "500")
            .with_context("status", 500)
            .with_source(src);
        let dto: BasErrorDto = (&err).into();
        assert_eq!(dto.source_message.as_deref(), Some("inner"));
        let back: BasError = dto.into();
        assert_eq!(back.code, ErrorCode::RemoteApi);
        assert!(back.source.is_none());
        assert_eq!(back.context["status"], serde_json::json!(500));
    }

    #[test]
    fn all_codes_have_unique_as_str() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            assert!(seen.insert(code.as_str()), "duplicate {code:?}");
        }
    }

    #[test]
    fn all_codes_serialize_to_as_str() {
        for code in ALL_CODES {
            let json = serde_json::to_string(code).unwrap();
            assert_eq!(json, format!(r#""{}""#, code.as_str()));
        }
    }

    #[test]
    fn error_category_display() {
        assert_eq!(ErrorCategory::Engine.to_string(), "engine");
        assert_eq!(ErrorCategory::Remote.to_string(), "remote");
    }
}
