//! HTTP handlers and wire types

pub mod error;
pub mod files;
pub mod keys;
pub mod system;
pub mod types;
