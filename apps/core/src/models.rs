use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Columns every uploaded CSV must carry, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "GrossQuantity",
    "FlowRate",
    "ShipmentCompartmentID",
    "BaseProductID",
    "BaseProductCode",
    "ShipmentID",
    "ShipmentCode",
    "ExitTime",
    "BayCode",
    "ScheduledDate",
    "CreatedTime",
];

/// Numeric measures a trend can be computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericColumn {
    GrossQuantity,
    FlowRate,
}

impl NumericColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericColumn::GrossQuantity => "GrossQuantity",
            NumericColumn::FlowRate => "FlowRate",
        }
    }
}

impl fmt::Display for NumericColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamp columns a trend can be bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampColumn {
    ExitTime,
    ScheduledDate,
    CreatedTime,
}

impl TimestampColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampColumn::ExitTime => "ExitTime",
            TimestampColumn::ScheduledDate => "ScheduledDate",
            TimestampColumn::CreatedTime => "CreatedTime",
        }
    }
}

impl fmt::Display for TimestampColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated shipment row.
///
/// `gross_quantity`, `shipment_id` and `exit_time` are guaranteed present;
/// rows lacking any of them never make it past ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub gross_quantity: f64,
    pub flow_rate: Option<f64>,
    pub shipment_compartment_id: Option<String>,
    pub base_product_id: Option<String>,
    pub base_product_code: Option<String>,
    pub shipment_id: String,
    pub shipment_code: Option<String>,
    pub exit_time: NaiveDateTime,
    pub bay_code: Option<String>,
    pub scheduled_date: Option<NaiveDateTime>,
    pub created_time: Option<NaiveDateTime>,
    /// Values of the non-required columns, aligned with `Dataset::extra_columns`.
    #[serde(default)]
    pub extra: Vec<Option<String>>,
}

impl ShipmentRecord {
    pub fn numeric(&self, column: NumericColumn) -> Option<f64> {
        match column {
            NumericColumn::GrossQuantity => Some(self.gross_quantity),
            NumericColumn::FlowRate => self.flow_rate,
        }
    }

    pub fn timestamp(&self, column: TimestampColumn) -> Option<NaiveDateTime> {
        match column {
            TimestampColumn::ExitTime => Some(self.exit_time),
            TimestampColumn::ScheduledDate => self.scheduled_date,
            TimestampColumn::CreatedTime => self.created_time,
        }
    }
}

/// The validated, normalized shipment table currently loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Every header column, in file order.
    pub columns: Vec<String>,
    /// Header columns that are not part of `REQUIRED_COLUMNS`, in file order.
    pub extra_columns: Vec<String>,
    pub records: Vec<ShipmentRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A single question against the loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub question: String,
    /// Forecast horizon in days, always at least 1.
    pub periods: u32,
}

impl Query {
    pub fn new(question: impl Into<String>, periods: u32) -> Self {
        Self {
            question: question.into(),
            periods: periods.max(1),
        }
    }
}

/// The answer returned for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub text: String,
    /// Opaque reference to a persisted chart, if one was rendered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl AnalysisResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: None,
        }
    }

    pub fn with_chart(text: impl Into<String>, image_url: String) -> Self {
        Self {
            text: text.into(),
            image_url: Some(image_url),
        }
    }
}

/// What a successful upload reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub row_count: usize,
    pub column_names: Vec<String>,
}

/// One calendar-day bucket of a summed measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub day: NaiveDate,
    pub value: f64,
}

/// Daily sums sorted strictly ascending by day, one entry per day present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    points: Vec<DailyPoint>,
}

impl DailyAggregate {
    /// Builds an aggregate from points already sorted by day with no duplicates.
    pub(crate) fn from_sorted(points: Vec<DailyPoint>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].day < w[1].day));
        Self { points }
    }

    pub fn points(&self) -> &[DailyPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.day)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.day)
    }
}
