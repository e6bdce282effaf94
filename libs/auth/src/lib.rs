//! Capability-based authorization for bus-connected services
//!
//! Validates bearer tokens (HS256), checks revocation and account status, and
//! produces an [`AuthContext`] carrying the caller's capability set. Every
//! protected operation checks capabilities against that context before doing
//! any work; the distinguished `admin:full` capability satisfies every check.
//!
//! The revocation store and account lookup are external collaborators behind
//! traits; in-memory implementations are provided for process-local wiring
//! and tests.

pub mod context;
pub mod error;
pub mod service;
pub mod store;

pub use context::{permissions, AuthContext};
pub use error::AuthError;
pub use service::{AuthService, Claims};
pub use store::{
    AccountLookup, AccountRecord, InMemoryAccountLookup, InMemoryRevocationStore, RevocationStore,
    REVOCATION_TTL,
};
