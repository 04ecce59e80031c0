//! Authentication utilities library
//!
//! Provides the credential primitives used by the user service:
//! - Password hashing (Argon2id)
//! - JWT claims, encoding and validation
//! - Token issuing with a fixed lifetime
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash).unwrap());
//! ```
//!
//! ## Access Tokens
//! ```
//! use auth::Authenticator;
//!
//! let auth = Authenticator::new(b"secret_key_at_least_32_bytes_long!", 168);
//! let issued = auth.issue_token("user123").unwrap();
//! let claims = auth.validate_token(&issued.access_token).unwrap();
//! assert_eq!(claims.subject(), "user123");
//! ```

pub mod authenticator;
pub mod jwt;
pub mod password;

pub use authenticator::AuthenticationResult;
pub use authenticator::Authenticator;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use password::PasswordError;
pub use password::PasswordHasher;
