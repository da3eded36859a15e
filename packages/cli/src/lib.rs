//! # sslward
//!
//! Certificate provisioning for deployments: validate the configured pair,
//! generate a self-signed replacement when policy allows, and report whether a
//! reload is due.

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod provision;

pub use provision::{ProvisionAction, ProvisionError, ProvisionReport, Provisioner};
pub use sslward_engine as engine;

/// Exit code for a usable pair
pub const EXIT_OK: i32 = 0;
/// Exit code for validation hard failures and configuration errors
pub const EXIT_INVALID: i32 = 1;
/// Exit code for generation failures
pub const EXIT_GENERATION_FAILED: i32 = 2;
