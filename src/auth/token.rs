//! Token secrets and the immutable token sets cached by the token manager.

pub mod secret;
pub mod set;
