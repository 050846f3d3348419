// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library half of the `bas` command-line tool.

#![deny(unsafe_code)]

/// Subcommand implementations.
pub mod commands;
/// Text rendering of jobs and events.
pub mod format;
