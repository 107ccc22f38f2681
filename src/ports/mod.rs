//! Port traits the domain depends on; adapters provide the implementations.

pub mod config_port;
pub mod market_data_port;
pub mod metrics_store_port;
pub mod price_store_port;
pub mod quote_port;
