//! Core internal logic for supervising ConnMan.
//!
//! This module contains the internal implementation details: attribute
//! parsing, credential storage, per-technology state tracking, and the
//! event waits the workflows are built on.

pub(crate) mod credentials;
pub(crate) mod hotspot;
pub(crate) mod parser;
pub(crate) mod registry;
pub(crate) mod state_wait;
