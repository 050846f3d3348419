// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error kinds surfaced by the remote client and adapter.

use bas_error::{BasError, ErrorCode};
use serde_json::Value;

/// Failure talking to, or waiting on, the remote service.
///
/// None of these are retried by the client or the adapter.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The service rejected the credentials (HTTP 401/403).
    #[error("remote authentication failed with status {status}")]
    Authentication {
        /// HTTP status.
        status: u16,
        /// Response body, or `{"raw": text}` when it was not JSON.
        payload: Value,
    },

    /// The service answered with another non-success status.
    #[error("remote API error {status} for {path}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Request path.
        path: String,
        /// Response body, or `{"raw": text}` when it was not JSON.
        payload: Value,
    },

    /// The service could not be reached, timed out, or is disabled.
    #[error("remote service unavailable: {0}")]
    Unavailable(String),

    /// A polling deadline elapsed before its success criterion was met.
    #[error("remote operation timed out: {0}")]
    OperationTimeout(String),

    /// The job has no operation yet.
    #[error("remote operation not initialized for job {0}")]
    NotInitialized(uuid::Uuid),

    /// A response did not have the expected shape.
    #[error("unexpected remote response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Stable error code for this kind.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { .. } => ErrorCode::RemoteAuthentication,
            Self::Api { .. } | Self::Malformed(_) => ErrorCode::RemoteApi,
            Self::Unavailable(_) => ErrorCode::RemoteUnavailable,
            Self::OperationTimeout(_) => ErrorCode::OperationTimeout,
            Self::NotInitialized(_) => ErrorCode::OperationNotInitialized,
        }
    }

    /// HTTP status, when the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<RemoteError> for BasError {
    fn from(err: RemoteError) -> Self {
        let mut out = BasError::new(err.code(), err.to_string());
        if let Some(status) = err.status() {
            out = out.with_context("status", status);
        }
        match &err {
            RemoteError::Authentication { payload, .. } | RemoteError::Api { payload, .. } => {
                out = out.with_context("payload", payload);
            }
            RemoteError::NotInitialized(job_id) => {
                out = out.with_context("job_id", job_id.to_string());
            }
            _ => {}
        }
        out.with_source(err)
    }
}
