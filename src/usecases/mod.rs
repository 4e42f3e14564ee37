//! Application services implementing business logic.

pub mod auth;

pub use auth::*;
