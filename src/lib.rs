// SPDX-License-Identifier: MIT OR Apache-2.0
//! breach-sim
//!
//! Facade over the simulation engine workspace. Downstream code can depend on
//! this one crate and reach every layer through it.

#![deny(unsafe_code)]

pub use bas_adapter as adapter;
pub use bas_adapter_mock as mock;
pub use bas_config as config;
pub use bas_core as model;
pub use bas_error as error;
pub use bas_remote as remote;
pub use bas_runtime as runtime;

pub use bas_core::{Job, JobStatus, Platform, Scenario, Step};
pub use bas_runtime::Engine;
