//! HTTP API handlers for redraft-gen

pub mod credits;
pub mod health;
pub mod sse;
pub mod tasks;

pub use credits::credit_routes;
pub use health::health_routes;
pub use sse::task_event_stream;
pub use tasks::task_routes;
