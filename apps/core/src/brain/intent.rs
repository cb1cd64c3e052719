//! Intent Classification using ordered keyword tiers.
//!
//! A question is lowercased and tested against each tier in priority order;
//! the first tier with a matching keyword decides the intent. No scoring, no
//! model - forecast keywords are checked before trend keywords so that
//! "predict the trend" forecasts instead of merely charting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Detected intent type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Project the daily series forward (forecast, predict, next ...)
    Forecast,
    /// Chart a measure over time (trend, plot, by day, ...)
    Trend,
    /// Everything else: rule lookup, then the agent fallback
    Analysis,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    /// Returns a human-readable label for the intent
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Forecast => "forecast",
            Intent::Trend => "trend",
            Intent::Analysis => "analysis",
        }
    }
}

/// Result of intent classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentResult {
    /// Detected intent
    pub intent: Intent,
    /// Keyword that decided the intent, `None` for the default tier
    pub matched_keyword: Option<&'static str>,
}

/// One priority tier of the classifier.
struct IntentTier {
    intent: Intent,
    keywords: &'static [&'static str],
}

const FORECAST_KEYWORDS: &[&str] = &["forecast", "predict", "projection", "next "];

const TREND_KEYWORDS: &[&str] = &[
    "trend",
    "over time",
    "time series",
    "by day",
    "by month",
    "chart",
    "plot",
    "graph",
];

/// Intent classifier over an ordered keyword table
pub struct IntentClassifier {
    tiers: Vec<IntentTier>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    /// Create a classifier with the forecast tier ahead of the trend tier
    pub fn new() -> Self {
        let tiers = vec![
            IntentTier {
                intent: Intent::Forecast,
                keywords: FORECAST_KEYWORDS,
            },
            IntentTier {
                intent: Intent::Trend,
                keywords: TREND_KEYWORDS,
            },
        ];

        Self { tiers }
    }

    /// Classify the intent of a question
    pub fn classify(&self, question: &str) -> IntentResult {
        let q = question.to_lowercase();

        for tier in &self.tiers {
            if let Some(keyword) = tier.keywords.iter().find(|k| q.contains(*k)) {
                return IntentResult {
                    intent: tier.intent,
                    matched_keyword: Some(*keyword),
                };
            }
        }

        IntentResult {
            intent: Intent::Analysis,
            matched_keyword: None,
        }
    }
}
