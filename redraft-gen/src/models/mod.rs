//! Data models for redraft-gen
//!
//! Task → Item → Variant hierarchy plus credit ledger records.

pub mod credit;
pub mod item;
pub mod task;
pub mod variant;

pub use credit::{CreditKind, CreditTransaction};
pub use item::{Item, ItemStatus, StagedContent};
pub use task::{Task, TaskConfig, TaskStatus};
pub use variant::{Variant, VariantStatus};
