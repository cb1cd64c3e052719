//! Question answering over terminal shipment records.
//!
//! A CSV upload becomes the current [`models::Dataset`]; each question is
//! classified and answered by built-in rules, a daily trend chart, a
//! short-horizon forecast, or, failing the rules, an optional agent.

pub mod actors;
pub mod brain;
pub mod charts;
pub mod config;
pub mod error;
pub mod fallback;
pub mod health;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod store;

pub use error::AppError;
pub use orchestrator::ShipmentAnalyst;

#[cfg(test)]
mod tests;
