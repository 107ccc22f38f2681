//! Core domain types and logic.

pub mod error;
pub mod ingest;
pub mod market;
pub mod metrics;
pub mod price;
pub mod retention;
pub mod settings;
pub mod update;
