//! REST core of the light-wallet server.
//!
//! Handlers authenticate with the submitted secret view key, walk the
//! account store under one read snapshot, optionally consult the upstream
//! daemon, and emit the mymonero-compatible JSON bodies. `server` wires
//! them into an axum router with the framing rules (method, body caps,
//! status mapping).

pub mod error;
pub mod handlers;
pub mod json;
pub mod projector;
pub mod server;
pub mod tx;
pub mod types;

pub use error::{Condition, Error};
pub use handlers::{Context, HandlerState};
pub use server::{parse_bind, router, AppState};
