//! HTTP front end for the image-edit job service.
//!
//! Exposes config, state, error handling, auth and routes so integration
//! tests and the binary entrypoint share them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod state;
