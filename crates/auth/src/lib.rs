//! `commerce-auth` — authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage: the API layer hands in a bearer token and
//! gets back verified claims, then asks `authorize` before running admin
//! operations.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod roles;

pub use authorize::{AuthzError, Principal, authorize, permissions_for_roles};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use roles::Role;
