//! Token issuance, password hashing and the account lifecycle.

pub mod invitations;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use invitations::{grantable_roles, CreateInvitation, InvitationTransformer, UpdateInvitation};
pub use jwt::{DecodedToken, IssuedToken, JwtConfig, JwtTokenService, Token};
pub use middleware::{authenticate, require_roles, Caller, RoleRequirement};
pub use models::{ChangePassword, Invitation, SignIn, SignUp, TokenEntry, User};
pub use password::{Argon2Hasher, PasswordHasher};
pub use service::{AuthCollections, DomainAuthService};
