//! Domain models for the warehouse workflows
//!
//! Rule functions are reached through their module (`purchase::check_submission`,
//! `inventory::check_submission`); only the types are re-exported here.

pub mod inventory;
pub mod material;
pub mod purchase;
pub mod write_off;

pub use inventory::{
    DiscrepancySummary, Inventory, InventoryDetails, InventoryItem, InventoryStatus,
};
pub use material::{Material, MaterialPrice};
pub use purchase::{
    OpenPurchaseStatus, Purchase, PurchaseDetails, PurchaseItem, PurchaseItemStatus,
    PurchaseStatus,
};
pub use write_off::{WriteOff, WriteOffDetails, WriteOffItem, WriteOffStatus, WriteOffTotals};
