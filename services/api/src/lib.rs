//! Tutor API Library Crate
//!
//! This library contains the HTTP surface of the tutoring service: configuration,
//! application state, request handlers, and routing. The lesson pipeline itself
//! lives in `tutor-core`; the `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
