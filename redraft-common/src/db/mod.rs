//! Database initialization shared by redraft services

pub mod init;

pub use init::{init_database, create_schema};
