//! Liveness report for the analysis service.
//!
//! The service is always up once constructed, so `status` is always `"ok"`.
//! The individual checks describe what is usable right now.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Result of a single check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub dataset_loaded: bool,
    pub row_count: usize,
    pub agent_configured: bool,
    pub charts_dir: String,
    pub checks: Vec<CheckResult>,
}

impl HealthReport {
    pub fn build(row_count: Option<usize>, agent_configured: bool, charts_dir: &Path) -> Self {
        let checks = vec![
            check_dataset(row_count),
            check_charts_dir(charts_dir),
            check_agent(agent_configured),
        ];

        for check in &checks {
            if check.passed {
                info!("health {}: {}", check.name, check.message);
            } else {
                warn!("health {}: {}", check.name, check.message);
            }
        }

        Self {
            status: "ok".to_string(),
            dataset_loaded: row_count.is_some(),
            row_count: row_count.unwrap_or(0),
            agent_configured,
            charts_dir: charts_dir.display().to_string(),
            checks,
        }
    }
}

fn check_dataset(row_count: Option<usize>) -> CheckResult {
    match row_count {
        Some(rows) => CheckResult::pass("dataset", &format!("{} rows loaded", rows)),
        None => CheckResult::fail("dataset", "No dataset loaded", None),
    }
}

fn check_charts_dir(dir: &Path) -> CheckResult {
    if dir.is_dir() {
        CheckResult::pass("charts_dir", "Chart directory exists")
    } else if dir.exists() {
        CheckResult::fail(
            "charts_dir",
            "Chart path is not a directory",
            Some(dir.display().to_string()),
        )
    } else {
        CheckResult::pass("charts_dir", "Chart directory will be created on first chart")
    }
}

fn check_agent(configured: bool) -> CheckResult {
    if configured {
        CheckResult::pass("agent", "Agent fallback configured")
    } else {
        CheckResult::fail(
            "agent",
            "Agent fallback disabled",
            Some("Set OPENAI_API_KEY to enable it".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_report_without_dataset() {
        let dir = tempdir().unwrap();
        let report = HealthReport::build(None, false, dir.path());
        assert_eq!(report.status, "ok");
        assert!(!report.dataset_loaded);
        assert_eq!(report.row_count, 0);
        assert!(!report.checks[0].passed);
        assert!(report.checks[1].passed);
    }

    #[test]
    fn test_report_flags_file_as_charts_dir() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("charts");
        std::fs::write(&file, b"x").unwrap();

        let report = HealthReport::build(Some(3), true, &file);

        assert!(report.dataset_loaded);
        assert_eq!(report.row_count, 3);
        let charts = report.checks.iter().find(|c| c.name == "charts_dir").unwrap();
        assert!(!charts.passed);
        assert!(report.checks.iter().find(|c| c.name == "agent").unwrap().passed);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let dir = tempdir().unwrap();
        let json = serde_json::to_value(HealthReport::build(Some(1), false, dir.path())).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["datasetLoaded"], true);
        assert_eq!(json["rowCount"], 1);
        assert_eq!(json["agentConfigured"], false);
    }
}
