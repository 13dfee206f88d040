//! tradegate: decision support for an equity portfolio.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. Scoring and risk are pure; every
//! book mutation goes through one exclusive store transaction.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod ports;
