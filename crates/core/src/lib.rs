//! Domain types and pure helpers for the image-edit job service.
//!
//! Nothing in this crate performs I/O. It is shared by the queue core, the
//! inference pipeline and the HTTP layer.

pub mod api_keys;
pub mod error;
pub mod image_format;
pub mod job;
pub mod naming;
pub mod preset;
pub mod prompt;
pub mod prompt_filter;
pub mod types;
