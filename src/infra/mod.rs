//! Infrastructure adapters and runtime bootstrap.

pub mod cache;
pub mod db;
pub mod error;
pub mod files;
pub mod http;
pub mod memory;
pub mod telemetry;
