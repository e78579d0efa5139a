//! GitHub App webhook service: verifies signed deliveries, decides which
//! ones need work, and either approves pull requests inline or queues jobs
//! for a background worker.

pub mod app_state;
pub mod config;
pub mod events;
pub mod github;
pub mod jobs;
pub mod routes;
pub mod utils;
