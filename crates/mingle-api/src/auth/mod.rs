//! Credential issuance and session lifecycle
//!
//! This module implements the session subsystem:
//! - Access token signing and verification
//! - Refresh token issuance, rotation, and revocation
//! - Password hashing with Argon2
//! - Email ownership verification
//! - Federated identity bridging
//! - The session service orchestrating all of the above

pub mod federated;
pub mod jwt;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod store;
pub mod verification;

pub use federated::{FederatedLoginBridge, FederatedProfile};
pub use jwt::{create_access_token, verify_access_token, Claims, JwtConfig};
pub use ledger::{RefreshTokenLedger, RotationError};
pub use middleware::{auth_middleware, AuthError, AuthenticatedUser};
pub use models::{Account, RefreshToken};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use service::{
    EstablishedSession, LoginRequest, RegisterRequest, SessionService, SessionUser,
};
pub use store::{AccountStore, MemoryAccountStore, StoreError};
pub use verification::EmailVerificationFlow;
