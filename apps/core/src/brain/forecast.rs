//! Short-horizon forecasting of daily GrossQuantity.
//!
//! The model sits behind [`ForecastModel`] so tests can pin it. The default
//! [`AdditiveModel`] fits `y(t) = intercept + slope * t + weekly(weekday(t))`
//! where `t` is the day offset from the first observed day.

use chrono::{Datelike, Days, NaiveDate};
use std::sync::Arc;
use tracing::{info, warn};

use crate::charts::{ChartSink, Figure, SeriesStyle};
use crate::error::AppError;
use crate::models::{AnalysisResult, DailyAggregate, Dataset, NumericColumn, TimestampColumn};

use super::trend::daily_aggregate;

/// Window (in days) averaged on each side of the history/forecast boundary.
pub const SUMMARY_WINDOW: usize = 7;
const EPSILON: f64 = 1e-6;
const CHART_PREFIX: &str = "forecast_gross_quantity";

/// A model that can be fitted on a daily history.
pub trait ForecastModel: Send + Sync + 'static {
    fn fit(&self, history: &DailyAggregate) -> Result<Box<dyn FittedModel>, AppError>;
}

/// A fitted model, able to predict any calendar day.
pub trait FittedModel: Send {
    fn predict(&self, day: NaiveDate) -> f64;
}

/// Linear trend plus an optional weekly seasonal component.
#[derive(Debug, Clone)]
pub struct AdditiveModel {
    /// Minimum history span (last day minus first day) before weekly
    /// seasonality is estimated.
    pub weekly_min_span_days: i64,
}

impl Default for AdditiveModel {
    fn default() -> Self {
        Self {
            weekly_min_span_days: 14,
        }
    }
}

#[derive(Debug, Clone)]
struct FittedAdditive {
    origin: NaiveDate,
    intercept: f64,
    slope: f64,
    weekly: Option<[f64; 7]>,
}

impl FittedAdditive {
    fn trend(&self, day: NaiveDate) -> f64 {
        let t = (day - self.origin).num_days() as f64;
        self.intercept + self.slope * t
    }
}

impl FittedModel for FittedAdditive {
    fn predict(&self, day: NaiveDate) -> f64 {
        let seasonal = self
            .weekly
            .map(|w| w[day.weekday().num_days_from_monday() as usize])
            .unwrap_or(0.0);
        self.trend(day) + seasonal
    }
}

impl ForecastModel for AdditiveModel {
    fn fit(&self, history: &DailyAggregate) -> Result<Box<dyn FittedModel>, AppError> {
        Ok(Box::new(self.fit_additive(history)?))
    }
}

impl AdditiveModel {
    fn fit_additive(&self, history: &DailyAggregate) -> Result<FittedAdditive, AppError> {
        let points = history.points();
        let (Some(first), Some(last)) = (history.first_day(), history.last_day()) else {
            return Err(AppError::Forecast("cannot fit a model on an empty history".to_string()));
        };

        let n = points.len() as f64;
        let ts: Vec<f64> = points.iter().map(|p| (p.day - first).num_days() as f64).collect();
        let mean_t = ts.iter().sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.value).sum::<f64>() / n;

        let sxx: f64 = ts.iter().map(|t| (t - mean_t).powi(2)).sum();
        let (intercept, slope) = if sxx < 1e-12 {
            (mean_y, 0.0)
        } else {
            let sxy: f64 = ts
                .iter()
                .zip(points)
                .map(|(t, p)| (t - mean_t) * (p.value - mean_y))
                .sum();
            let slope = sxy / sxx;
            (mean_y - slope * mean_t, slope)
        };

        if !intercept.is_finite() || !slope.is_finite() {
            return Err(AppError::Forecast("trend fit produced non-finite coefficients".to_string()));
        }

        let mut fitted = FittedAdditive {
            origin: first,
            intercept,
            slope,
            weekly: None,
        };

        if (last - first).num_days() >= self.weekly_min_span_days {
            let mut sums = [0.0f64; 7];
            let mut counts = [0usize; 7];
            for p in points {
                let idx = p.day.weekday().num_days_from_monday() as usize;
                sums[idx] += p.value - fitted.trend(p.day);
                counts[idx] += 1;
            }
            let observed: Vec<usize> = (0..7).filter(|i| counts[*i] > 0).collect();
            let center = observed.iter().map(|i| sums[*i] / counts[*i] as f64).sum::<f64>() / observed.len() as f64;
            let mut effects = [0.0f64; 7];
            for i in observed {
                effects[i] = sums[i] / counts[i] as f64 - center;
            }
            fitted.weekly = Some(effects);
        }

        Ok(fitted)
    }
}

/// Whether the forecast window is above or below the recent history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Increase,
    Decrease,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increase => "increase",
            TrendDirection::Decrease => "decrease",
        }
    }
}

/// Comparison of predicted means either side of the last observed day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSummary {
    pub last_hist_mean: f64,
    pub next_fc_mean: f64,
    pub direction: TrendDirection,
    pub percent_change: f64,
}

impl ForecastSummary {
    pub fn text(&self) -> String {
        format!(
            "Forecast suggests a {} of approximately {:.1}% over the next period.",
            self.direction.as_str(),
            self.percent_change
        )
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Summarizes predictions (sorted by day) around `last_history_day`.
pub fn summarize(predictions: &[(NaiveDate, f64)], last_history_day: NaiveDate) -> Option<ForecastSummary> {
    let split = predictions.partition_point(|(day, _)| *day <= last_history_day);
    let (history, future) = predictions.split_at(split);

    let hist_tail: Vec<f64> = history
        .iter()
        .skip(history.len().saturating_sub(SUMMARY_WINDOW))
        .map(|(_, v)| *v)
        .collect();
    let future_head: Vec<f64> = future.iter().take(SUMMARY_WINDOW).map(|(_, v)| *v).collect();

    let last_hist_mean = mean(&hist_tail)?;
    let next_fc_mean = mean(&future_head)?;
    let direction = if next_fc_mean > last_hist_mean {
        TrendDirection::Increase
    } else {
        TrendDirection::Decrease
    };
    let percent_change = (next_fc_mean - last_hist_mean) / last_hist_mean.abs().max(EPSILON) * 100.0;

    Some(ForecastSummary {
        last_hist_mean,
        next_fc_mean,
        direction,
        percent_change,
    })
}

/// Forecasts daily GrossQuantity and charts history against the projection.
#[derive(Clone)]
pub struct Forecaster {
    model: Arc<dyn ForecastModel>,
    sink: Arc<dyn ChartSink>,
}

impl Forecaster {
    pub fn new(model: Arc<dyn ForecastModel>, sink: Arc<dyn ChartSink>) -> Self {
        Self { model, sink }
    }

    /// Never fails: any fitting or rendering problem becomes the answer text.
    pub fn forecast(&self, dataset: &Dataset, periods: u32) -> AnalysisResult {
        match self.try_forecast(dataset, periods.max(1)) {
            Ok(result) => result,
            Err(e) => {
                warn!("Forecasting failed: {}", e);
                AnalysisResult::text(format!("Forecasting failed: {}", e))
            }
        }
    }

    fn try_forecast(&self, dataset: &Dataset, periods: u32) -> Result<AnalysisResult, AppError> {
        let history = daily_aggregate(dataset, NumericColumn::GrossQuantity, TimestampColumn::ExitTime);
        let (Some(first), Some(last)) = (history.first_day(), history.last_day()) else {
            return Ok(AnalysisResult::text("No data available for forecasting"));
        };

        let fitted = self.model.fit(&history)?;

        let end = last
            .checked_add_days(Days::new(periods as u64))
            .ok_or_else(|| AppError::Forecast(format!("horizon of {} days is out of range", periods)))?;
        let predictions: Vec<(NaiveDate, f64)> = first
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| (day, fitted.predict(day)))
            .collect();

        if predictions.iter().any(|(_, v)| !v.is_finite()) {
            return Err(AppError::Forecast("model produced non-finite predictions".to_string()));
        }

        let summary = summarize(&predictions, last)
            .ok_or_else(|| AppError::Forecast("not enough predictions to summarize".to_string()))?;

        let figure = Figure::new("Forecast of daily GrossQuantity", "Date", "GrossQuantity")
            .with_series(
                "observed",
                history.points().iter().map(|p| (p.day, p.value)).collect(),
                SeriesStyle::Markers,
            )
            .with_series("forecast", predictions, SeriesStyle::Line);
        let url = self.sink.persist(&figure, CHART_PREFIX)?;

        info!(
            "Forecast over {} history days, {} periods: {} {:.1}%",
            history.len(),
            periods,
            summary.direction.as_str(),
            summary.percent_change
        );
        Ok(AnalysisResult::with_chart(summary.text(), url))
    }
}
