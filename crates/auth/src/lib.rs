//! `quill-auth`: authentication/authorization boundary.
//!
//! Token issuance and password handling live with the external identity
//! provider. This crate verifies the bearer tokens it issues, keeps the author
//! profiles learned from them, and hosts the ownership gate applied to every
//! content mutation.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod claims;
pub mod jwt;
pub mod ownership;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use ownership::{AuthzError, Owned, authorize_owner, is_authorized};
pub use user::{InMemoryUserDirectory, UserDirectory, UserProfile};
