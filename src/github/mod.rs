pub mod auth;
pub mod error;
pub mod jwt;
pub mod models;
pub mod reviews;
