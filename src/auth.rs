//! Auth-domain identities, scope sets, PKCE material, and token models.

pub mod identity;
pub mod pkce;
pub mod scope;
pub mod token;

pub use identity::*;
pub use pkce::*;
pub use scope::*;
pub use token::{secret::*, set::*};
