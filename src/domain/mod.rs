//! Core domain types and logic.

pub mod error;
pub mod composite;
pub mod normalizer;
pub mod fundamental;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod classifier;
pub mod position;
pub mod portfolio;
pub mod journal;
pub mod metrics;
pub mod snapshot;
pub mod book;
pub mod risk;
pub mod sizing;
pub mod config;
pub mod desk;
pub mod plan;
