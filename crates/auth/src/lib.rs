//! Authentication for the diary study platform.
//!
//! This crate provides:
//! - JWT issuing and verification (the token carries the user's email)
//! - The [`IdentityProvider`] seam for exchanging an OAuth2 authorization
//!   code for a verified email
//! - An OIDC implementation of that seam backed by `reqwest`

mod error;
mod identity;
mod jwt;
mod oidc;

pub use error::*;
pub use identity::*;
pub use jwt::*;
pub use oidc::*;

/// Default JWT expiration time in hours.
pub const DEFAULT_JWT_EXPIRATION_HOURS: u64 = 24;

/// Default JWT issuer.
pub const DEFAULT_JWT_ISSUER: &str = "diary-study";
