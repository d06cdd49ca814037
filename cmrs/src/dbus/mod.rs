//! D-Bus proxy interfaces for ConnMan.
//!
//! This module contains low-level D-Bus proxy definitions for communicating
//! with ConnMan (`net.connman`) over the system bus.

mod manager;
mod service;
mod technology;

pub(crate) use manager::ConnmanManagerProxy;
pub(crate) use service::ConnmanServiceProxy;
pub(crate) use technology::ConnmanTechnologyProxy;
