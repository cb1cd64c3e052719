//! Test Module
//!
//! Cross-module test suite for the shipment analyst.
//!
//! ## Test Categories
//! - `brain_tests`: Intent classification, rules and trends over parsed CSVs
//! - `actor_tests`: Agent actor behavior and fallback composition
//! - `chaos_test`: Concurrent uploads and questions
//! - `integration_tests`: Full upload-then-ask workflows

pub mod integration_tests;

use crate::charts::{ChartSink, Figure};
use crate::error::AppError;
use std::sync::Mutex;

pub const HEADER: &str = "GrossQuantity,FlowRate,ShipmentCompartmentID,BaseProductID,BaseProductCode,ShipmentID,ShipmentCode,ExitTime,BayCode,ScheduledDate,CreatedTime";

/// Builds CSV bytes from the standard header plus `rows`.
pub fn csv_bytes(rows: &[&str]) -> Vec<u8> {
    let mut out = String::from(HEADER);
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out.push('\n');
    out.into_bytes()
}

/// Three rows over two shipments and three days.
pub fn sample_csv() -> Vec<u8> {
    csv_bytes(&[
        "10,1.5,C1,P1,DSL,S-1,SC-1,2024-01-01 08:00:00,B1,2024-01-01,2023-12-31 09:00:00",
        "20,3.25,C2,P1,DSL,S-1,SC-1,2024-01-02 09:30:00,B2,2024-01-02,2024-01-01 10:00:00",
        "30,2.0,C3,P2,GAS,S-2,SC-2,2024-01-03 17:45:00,B3,2024-01-03,2024-01-02 11:00:00",
    ])
}

/// Chart sink that keeps figures in memory.
#[derive(Default)]
pub struct MemorySink {
    pub figures: Mutex<Vec<(String, Figure)>>,
}

impl ChartSink for MemorySink {
    fn persist(&self, figure: &Figure, prefix: &str) -> Result<String, AppError> {
        let mut figures = self.figures.lock().unwrap();
        figures.push((prefix.to_string(), figure.clone()));
        Ok(format!("mem://{}/{}", prefix, figures.len()))
    }
}
