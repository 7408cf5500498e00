//! Shared types and models for the Metal ERP warehouse workflows
//!
//! This crate holds the purchase, inventory and write-off state machines and
//! the quantity rules they enforce. It performs no I/O; the backend loads and
//! stores these models and calls the rules before every mutation.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
