//! Business logic services for the warehouse workflows

pub mod catalog;
pub mod inventory;
mod ledger;
pub mod purchase;
pub mod write_off;

use serde::Deserialize;

pub use catalog::CatalogService;
pub use inventory::InventoryService;
pub use purchase::PurchaseService;
pub use write_off::WriteOffService;

/// Input for rejecting a submitted inventory or write-off
#[derive(Debug, Deserialize)]
pub struct RejectInput {
    pub reason: String,
}
