//! # Redraft Common Library
//!
//! Shared code for the redraft services:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - Database pool initialization and schema
//! - Event types and the broadcast EventBus

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
