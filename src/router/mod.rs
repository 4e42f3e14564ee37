//! HTTP adapters.

pub mod login;
pub mod status;
