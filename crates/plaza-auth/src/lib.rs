//! # plaza-auth: Authentication & Authorization for Plaza POS
//!
//! Session tokens, credential checks, permission gates, and the tenant
//! lifecycle gate.
//!
//! ## Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          plaza-auth                                     │
//! │                                                                         │
//! │  Token (JWT) ── identity + tenant binding ONLY                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SessionAuthenticator::verify ── live user lookup, permissions         │
//! │       │                          re-derived per request                 │
//! │       ▼                                                                 │
//! │  authorize_shop ── status + subscription gate, per request             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  gate(permission).check(&identity) ── operation entry points           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod authenticator;
pub mod config;
pub mod error;
pub mod gate;
pub mod token;

pub use authenticator::{hash_password, verify_password, Identity, SessionAuthenticator};
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use gate::{gate, Gate};
pub use token::{Claims, TokenService};
