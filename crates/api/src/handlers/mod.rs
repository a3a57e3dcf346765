pub mod admin;
pub mod jobs;
pub mod models;
pub mod queue;
