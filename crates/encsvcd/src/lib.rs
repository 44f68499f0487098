//! encsvcd: HTTP encryption service
//!
//! Exposes the router and lifecycle so the binary stays small and the HTTP
//! surface can be exercised in-process by tests.

pub mod api;
pub mod app;
pub mod daemon;
pub mod health;
pub mod metrics;
pub mod sweeper;
pub mod transfer;

pub use app::{build_router, AppState};
