//! `stockline-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows what a
//! user, a role and a permission are, and how to check a bearer token, but not
//! where users are stored or how requests arrive.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, Principal, RequiredPermissions, authorize, authorize_owner_or};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::{Permission, RolePolicy};
pub use roles::{Role, RoleDefinition};
pub use user::{User, UserStatus};
