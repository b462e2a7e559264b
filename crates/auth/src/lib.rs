//! `propledger-auth`: token validation and role-based authorization.
//!
//! This crate is decoupled from HTTP and storage: it decodes bearer tokens
//! into claims and answers "may this principal do that in this tenant".

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod roles;

pub use authorize::{authorize, AuthzError, Principal, TenantMembership};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use roles::{permissions_for, Role};
