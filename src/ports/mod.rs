//! These traits define what the application needs from the outside world,
//! and what it offers to it.

pub mod inbound;
pub mod outbound;
