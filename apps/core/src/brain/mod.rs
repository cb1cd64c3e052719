//! # Brain Module
//!
//! Local, deterministic analysis of the loaded dataset.
//!
//! ## Components
//! - `intent`: Keyword-tier question classification
//! - `rules`: Built-in answers (total quantity, highest flow, shipment count)
//! - `trend`: Daily aggregation and trend charts
//! - `forecast`: Additive trend + weekly model and forecast summaries
//! - `format`: Number formatting shared by the answers

pub mod forecast;
pub mod format;
pub mod intent;
pub mod rules;
pub mod trend;

pub use forecast::{AdditiveModel, FittedModel, ForecastModel, Forecaster};
pub use intent::{Intent, IntentClassifier, IntentResult};
pub use rules::{RuleEngine, RuleOutcome, UNANSWERED_TEXT};
pub use trend::{daily_aggregate, TrendAnalyzer};
