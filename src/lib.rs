//! stockmetrics: daily stock price metrics pipeline.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable at least one store backend: `sqlite` or `postgres`");

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod ports;
