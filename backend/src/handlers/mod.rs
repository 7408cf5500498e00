//! HTTP handlers for the warehouse workflow endpoints
//!
//! Every protected handler checks the caller's permission before calling
//! into a service.

pub mod health;
pub mod inventory;
pub mod material;
pub mod purchase;
pub mod write_off;

pub use health::*;
pub use inventory::*;
pub use material::*;
pub use purchase::*;
pub use write_off::*;
