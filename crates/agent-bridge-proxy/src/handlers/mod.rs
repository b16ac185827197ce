//! HTTP request handlers for the bridge surface.
//!
//! Handlers are thin: request parsing and response shaping live here, the
//! relaying itself in [`crate::relay`] and [`crate::adapter`].

pub mod admin;
pub mod chat;
pub mod models;
pub mod passthrough;
