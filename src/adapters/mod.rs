//! Concrete adapter implementations for ports.

#[cfg(feature = "feed")]
pub mod alphavantage_adapter;
pub mod csv_adapter;
pub mod env_config_adapter;
pub mod file_config_adapter;
#[cfg(feature = "postgres")]
pub mod postgres_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
