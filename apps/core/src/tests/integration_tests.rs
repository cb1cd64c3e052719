//! Integration Tests
//!
//! End-to-end tests that verify complete workflows across multiple components.

use crate::actors::messages::AppError;
use crate::brain::{AdditiveModel, UNANSWERED_TEXT};
use crate::charts::FileChartSink;
use crate::config::AppConfig;
use crate::orchestrator::ShipmentAnalyst;
use std::sync::Arc;
use tempfile::tempdir;

use super::{csv_bytes, sample_csv, MemorySink};

// ============================================================================
// Test Fixtures
// ============================================================================

fn memory_analyst() -> (ShipmentAnalyst, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    let analyst = ShipmentAnalyst::with_parts(
        AppConfig::default(),
        sink.clone(),
        Arc::new(AdditiveModel::default()),
        None,
    );
    (analyst, sink)
}

/// Three weeks of daily volumes rising by 10 per day.
fn rising_csv() -> Vec<u8> {
    let rows: Vec<String> = (1..=21)
        .map(|d| format!("{},1,,,,S-{},,2024-05-{:02} 10:00:00,,,", 100 + 10 * d, d, d))
        .collect();
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    csv_bytes(&refs)
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_full_workflow_with_charts_on_disk() {
    let dir = tempdir().unwrap();
    let analyst = ShipmentAnalyst::with_parts(
        AppConfig {
            charts_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        },
        Arc::new(FileChartSink::new(dir.path(), "/static/charts")),
        Arc::new(AdditiveModel::default()),
        None,
    );

    // 1. Upload
    let summary = analyst.upload(&sample_csv()).unwrap();
    assert_eq!(summary.row_count, 3);
    assert_eq!(summary.column_names.len(), 11);
    assert_eq!(summary.column_names[0], "GrossQuantity");

    // 2. Rule answers
    let total = analyst.ask("What is the total quantity?", None).await.unwrap();
    assert!(total.text.contains("60.00"));
    let count = analyst.ask("How many shipments?", None).await.unwrap();
    assert!(count.text.contains('2'));

    // 3. Trend chart on disk
    let trend = analyst.ask("Show me the trend", None).await.unwrap();
    assert_eq!(trend.text, "Trend of GrossQuantity over time.");
    let url = trend.image_url.expect("trend chart reference");
    let file_name = url.strip_prefix("/static/charts/").expect("url prefix");
    assert!(file_name.starts_with("trend_GrossQuantity_"));
    let svg = std::fs::read_to_string(dir.path().join(file_name)).unwrap();
    assert!(svg.contains("Daily GrossQuantity trend"));

    // 4. Health reflects the upload
    let health = analyst.health();
    assert_eq!(health.status, "ok");
    assert!(health.dataset_loaded);
    assert_eq!(health.row_count, 3);
    assert!(!health.agent_configured);
}

#[tokio::test]
async fn test_trend_has_one_point_per_distinct_day() {
    let (analyst, sink) = memory_analyst();
    analyst
        .upload(&csv_bytes(&[
            "10,,,,,S-1,,2024-01-01 08:00:00,,,",
            "20,,,,,S-1,,2024-01-01 20:00:00,,,",
            "30,,,,,S-2,,2024-01-04 17:45:00,,,",
        ]))
        .unwrap();

    let result = analyst.ask("plot quantity over time", None).await.unwrap();

    assert!(result.image_url.is_some());
    let figures = sink.figures.lock().unwrap();
    let points = &figures[0].1.series[0].points;
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].1, 30.0);
    assert_eq!(points[1].1, 30.0);
}

#[tokio::test]
async fn test_ask_before_upload_is_no_dataset() {
    let (analyst, _) = memory_analyst();

    let err = analyst.ask("total quantity", None).await.unwrap_err();

    assert!(matches!(err, AppError::NoDataset));
    assert!(err.is_client_error());
    assert!(!analyst.health().dataset_loaded);
}

#[tokio::test]
async fn test_failed_first_upload_leaves_store_empty() {
    let (analyst, _) = memory_analyst();

    let err = analyst.upload(b"Foo,Bar\n1,2\n").unwrap_err();
    match err {
        AppError::Validation(msg) => {
            assert!(msg.starts_with("Missing required columns"));
            assert!(msg.contains("GrossQuantity"));
        }
        other => panic!("Expected Validation, got {:?}", other),
    }
    assert!(matches!(analyst.ask("total quantity", None).await, Err(AppError::NoDataset)));
}

#[tokio::test]
async fn test_upload_replaces_previous_dataset() {
    let (analyst, _) = memory_analyst();
    analyst.upload(&sample_csv()).unwrap();
    analyst
        .upload(&csv_bytes(&["5,,,,,S-1,,2024-01-01 00:00:00,,,"]))
        .unwrap();

    let result = analyst.ask("total quantity", None).await.unwrap();
    assert_eq!(result.text, "Total GrossQuantity: 5.00");
}

#[tokio::test]
async fn test_upload_of_only_invalid_rows_yields_empty_dataset() {
    let (analyst, _) = memory_analyst();
    let summary = analyst
        .upload(&csv_bytes(&["abc,,,,,S-1,,2024-01-01 00:00:00,,,", "1,,,,,,,2024-01-01,,,"]))
        .unwrap();
    assert_eq!(summary.row_count, 0);

    let total = analyst.ask("total quantity", None).await.unwrap();
    assert!(total.text.starts_with("Cannot answer with built-in rules:"));
    let trend = analyst.ask("show the trend", None).await.unwrap();
    assert_eq!(trend.text, "No data to plot");
    let forecast = analyst.ask("forecast", None).await.unwrap();
    assert_eq!(forecast.text, "No data available for forecasting");
    assert!(forecast.image_url.is_none());
}

// ============================================================================
// Forecast
// ============================================================================

#[tokio::test]
async fn test_forecast_of_rising_volumes() {
    let (analyst, sink) = memory_analyst();
    analyst.upload(&rising_csv()).unwrap();

    let result = analyst.ask("Forecast the next two weeks", None).await.unwrap();

    assert!(
        result.text.starts_with("Forecast suggests a increase of approximately"),
        "unexpected text: {}",
        result.text
    );
    assert!(result.image_url.unwrap().starts_with("mem://forecast_gross_quantity"));
    let figures = sink.figures.lock().unwrap();
    // 21 observed days plus the default horizon of 14
    assert_eq!(figures[0].1.series[1].points.len(), 35);
}

#[tokio::test]
async fn test_forecast_periods_are_resolved() {
    let (analyst, sink) = memory_analyst();
    analyst.upload(&rising_csv()).unwrap();

    analyst.ask("predict", Some(3)).await.unwrap();
    analyst.ask("predict", Some(0)).await.unwrap();
    analyst.ask("predict", Some(-5)).await.unwrap();
    analyst.ask("predict", Some(100_000)).await.unwrap();

    let figures = sink.figures.lock().unwrap();
    let lengths: Vec<usize> = figures.iter().map(|(_, f)| f.series[1].points.len()).collect();
    assert_eq!(lengths, vec![21 + 3, 21 + 14, 21 + 14, 21 + 365]);
}

#[tokio::test]
async fn test_forecast_is_repeatable() {
    let (analyst, _) = memory_analyst();
    analyst.upload(&rising_csv()).unwrap();

    let first = analyst.ask("forecast", Some(10)).await.unwrap();
    let second = analyst.ask("forecast", Some(10)).await.unwrap();
    assert_eq!(first.text, second.text);
}

#[tokio::test]
async fn test_single_day_forecast_does_not_fail() {
    let (analyst, _) = memory_analyst();
    analyst
        .upload(&csv_bytes(&["42,,,,,S-1,,2024-01-01 00:00:00,,,"]))
        .unwrap();

    let result = analyst.ask("forecast", None).await.unwrap();
    assert!(result.text.starts_with("Forecast suggests a"));
}

// ============================================================================
// Idempotence and configuration
// ============================================================================

#[tokio::test]
async fn test_rule_and_trend_answers_are_idempotent() {
    let (analyst, _) = memory_analyst();
    analyst.upload(&sample_csv()).unwrap();

    for question in ["total quantity", "highest flow", "count shipments", "something else"] {
        let a = analyst.ask(question, None).await.unwrap();
        let b = analyst.ask(question, None).await.unwrap();
        assert_eq!(a, b, "answers differ for '{}'", question);
    }
    let other = analyst.ask("something else", None).await.unwrap();
    assert_eq!(other.text, UNANSWERED_TEXT);

    let t1 = analyst.ask("trend", None).await.unwrap();
    let t2 = analyst.ask("trend", None).await.unwrap();
    assert_eq!(t1.text, t2.text);
}

#[tokio::test]
async fn test_from_config_reads_environment() {
    let dir = tempdir().unwrap();
    let charts = dir.path().join("charts");
    let charts_str = charts.to_string_lossy().to_string();

    let config = temp_env::with_vars(
        [
            ("OPENAI_API_KEY", None),
            ("CHARTS_DIR", Some(charts_str.as_str())),
            ("CHART_URL_PREFIX", Some("/charts")),
            ("DEFAULT_FORECAST_PERIODS", Some("7")),
        ],
        AppConfig::from_env,
    )
    .unwrap();
    let analyst = ShipmentAnalyst::from_config(config).unwrap();
    assert_eq!(analyst.config().default_forecast_periods, 7);

    analyst.upload(&sample_csv()).unwrap();
    let result = analyst.ask("show the trend", None).await.unwrap();

    assert!(result.image_url.unwrap().starts_with("/charts/trend_GrossQuantity_"));
    assert_eq!(std::fs::read_dir(&charts).unwrap().count(), 1);
    assert!(!analyst.health().agent_configured);
}
