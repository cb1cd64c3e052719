//! Deterministic answers for a fixed set of question patterns.
//!
//! Rules are tried in table order and are mutually exclusive: the first rule
//! whose predicate matches the lowercased question produces the answer. When
//! none matches, the engine answers with [`UNANSWERED_TEXT`], which the
//! orchestrator treats as the signal to try the agent fallback.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::{AnalysisResult, Dataset, ShipmentRecord};

use super::format::format_grouped;

/// Text returned when no rule matches the question.
pub const UNANSWERED_TEXT: &str = "I could not answer with built-in rules. Trying AI analysis...";

type RulePredicate = fn(&str) -> bool;
type RuleHandler = fn(&Dataset) -> Result<String, AppError>;

struct Rule {
    name: &'static str,
    matches: RulePredicate,
    answer: RuleHandler,
}

/// Outcome of running the rule table against one question.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    Answered {
        rule: &'static str,
        result: AnalysisResult,
    },
    Unanswered,
}

impl RuleOutcome {
    /// Collapses the outcome into the result returned to callers.
    pub fn into_result(self) -> AnalysisResult {
        match self {
            RuleOutcome::Answered { result, .. } => result,
            RuleOutcome::Unanswered => AnalysisResult::text(UNANSWERED_TEXT),
        }
    }
}

fn asks_total_quantity(q: &str) -> bool {
    q.contains("total") && q.contains("quantity")
}

fn asks_highest_flow(q: &str) -> bool {
    q.contains("highest") && (q.contains("flow") || q.contains("flowrate"))
}

/// Trailing phrases that leave a "how many shipments" question unqualified.
const UNQUALIFIED_COUNT_TAILS: [&str; 6] = [
    "",
    "are there",
    "in total",
    "total",
    "do we have",
    "are in the dataset",
];

fn asks_shipment_count(q: &str) -> bool {
    if q.contains("count") && (q.contains("shipments") || q.contains("shipment")) {
        return true;
    }
    // "how many" only counts globally when nothing narrows the selection,
    // e.g. "how many shipments went to bay b3?" is left to the agent.
    ["how many shipments", "how many shipment"].iter().any(|phrase| {
        q.find(phrase).is_some_and(|at| {
            let tail = q[at + phrase.len()..].trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation());
            UNQUALIFIED_COUNT_TAILS.contains(&tail)
        })
    })
}

fn total_quantity(dataset: &Dataset) -> Result<String, AppError> {
    if dataset.is_empty() {
        return Err(AppError::EmptyDataset("no GrossQuantity values".to_string()));
    }
    let total: f64 = dataset.records.iter().map(|r| r.gross_quantity).sum();
    Ok(format!("Total GrossQuantity: {}", format_grouped(total, 2)))
}

/// Row with the maximum FlowRate; ties keep the earliest row.
pub fn max_flow_record(dataset: &Dataset) -> Option<(&ShipmentRecord, f64)> {
    dataset
        .records
        .iter()
        .filter_map(|r| r.flow_rate.map(|f| (r, f)))
        .fold(None, |best, (r, f)| match best {
            Some((_, best_f)) if f <= best_f => best,
            _ => Some((r, f)),
        })
}

fn highest_flow(dataset: &Dataset) -> Result<String, AppError> {
    let (record, flow) = max_flow_record(dataset)
        .ok_or_else(|| AppError::EmptyDataset("no FlowRate values".to_string()))?;
    Ok(format!(
        "Highest FlowRate {:.2} at Bay {} for Shipment {}.",
        flow,
        record.bay_code.as_deref().unwrap_or("unknown"),
        record.shipment_code.as_deref().unwrap_or("unknown"),
    ))
}

fn shipment_count(dataset: &Dataset) -> Result<String, AppError> {
    let unique: HashSet<&str> = dataset.records.iter().map(|r| r.shipment_id.as_str()).collect();
    Ok(format!("Unique shipments: {}", unique.len()))
}

/// The ordered rule table
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        let rules = vec![
            Rule {
                name: "total_quantity",
                matches: asks_total_quantity,
                answer: total_quantity,
            },
            Rule {
                name: "highest_flow",
                matches: asks_highest_flow,
                answer: highest_flow,
            },
            Rule {
                name: "shipment_count",
                matches: asks_shipment_count,
                answer: shipment_count,
            },
        ];
        Self { rules }
    }

    /// Runs the first matching rule.
    pub fn evaluate(&self, dataset: &Dataset, question: &str) -> RuleOutcome {
        let q = question.to_lowercase();
        let Some(rule) = self.rules.iter().find(|rule| (rule.matches)(&q)) else {
            debug!("No built-in rule matched");
            return RuleOutcome::Unanswered;
        };

        let text = match (rule.answer)(dataset) {
            Ok(text) => text,
            Err(e) => {
                warn!("Rule {} could not be applied: {}", rule.name, e);
                format!("Cannot answer with built-in rules: {}", e)
            }
        };
        RuleOutcome::Answered {
            rule: rule.name,
            result: AnalysisResult::text(text),
        }
    }

    /// Answers the question, using [`UNANSWERED_TEXT`] when no rule applies.
    pub fn answer(&self, dataset: &Dataset, question: &str) -> AnalysisResult {
        self.evaluate(dataset, question).into_result()
    }
}
