//! Port traits the domain is driven through.

pub mod config_port;
pub mod market_port;
pub mod store_port;
