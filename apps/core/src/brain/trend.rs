//! Daily aggregation and trend charts.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::charts::{ChartSink, Figure, SeriesStyle};
use crate::models::{AnalysisResult, DailyAggregate, DailyPoint, Dataset, NumericColumn, TimestampColumn};

/// Sums `value` per calendar day of `date`, skipping rows where either is null.
///
/// Days come out strictly ascending with no gaps filled in: only days that
/// actually carry data appear.
pub fn daily_aggregate(dataset: &Dataset, value: NumericColumn, date: TimestampColumn) -> DailyAggregate {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in &dataset.records {
        if let (Some(v), Some(ts)) = (record.numeric(value), record.timestamp(date)) {
            *buckets.entry(ts.date()).or_insert(0.0) += v;
        }
    }
    DailyAggregate::from_sorted(
        buckets
            .into_iter()
            .map(|(day, value)| DailyPoint { day, value })
            .collect(),
    )
}

/// Charts a measure per calendar day.
#[derive(Clone)]
pub struct TrendAnalyzer {
    sink: Arc<dyn ChartSink>,
}

impl TrendAnalyzer {
    pub fn new(sink: Arc<dyn ChartSink>) -> Self {
        Self { sink }
    }

    pub fn trend_chart(&self, dataset: &Dataset, value: NumericColumn, date: TimestampColumn) -> AnalysisResult {
        let aggregate = daily_aggregate(dataset, value, date);
        if aggregate.is_empty() {
            return AnalysisResult::text("No data to plot");
        }

        let figure = Figure::new(format!("Daily {} trend", value), "Date", value.as_str()).with_series(
            value.as_str(),
            aggregate.points().iter().map(|p| (p.day, p.value)).collect(),
            SeriesStyle::LineWithMarkers,
        );

        match self.sink.persist(&figure, &format!("trend_{}", value)) {
            Ok(url) => {
                info!("Trend chart for {} over {} days", value, aggregate.len());
                AnalysisResult::with_chart(format!("Trend of {} over time.", value), url)
            }
            Err(e) => {
                warn!("Trend chart could not be stored: {}", e);
                AnalysisResult::text(format!("Could not render the {} trend chart: {}", value, e))
            }
        }
    }
}
