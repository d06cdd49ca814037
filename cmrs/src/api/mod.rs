//! Public API module.
//!
//! This module contains the high-level user-facing API for the `cmrs` crate.

pub mod config;
pub mod connman;
pub mod ethernet;
pub mod models;
pub mod wifi;
