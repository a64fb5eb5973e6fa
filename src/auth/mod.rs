//! Authentication and authorization
//!
//! Provides:
//! - JWT token encoding/decoding (`jwt` submodule)
//! - `require_auth` middleware and the `AuthUser` extractor
//! - The team/mindmap access gate (`gate` submodule)

pub mod extractor;
pub mod gate;
pub mod jwt;
pub mod middleware;

pub use gate::AccessGate;
