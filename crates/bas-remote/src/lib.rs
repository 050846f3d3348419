// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Remote red-team automation service integration.
//!
//! [`client`] speaks the service's REST API, [`health`] checks it and
//! [`adapter`] drives one operation per job through the polling protocol.

/// Remote-operation platform adapter.
pub mod adapter;
/// REST client.
pub mod client;
mod error;
/// Health check.
pub mod health;

pub use adapter::{OperationReport, RemoteOperationAdapter, StepAction};
pub use client::{HttpOperationClient, Link, Operation, OperationClient};
pub use error::RemoteError;
pub use health::{HealthReport, check_health, ensure_available};
