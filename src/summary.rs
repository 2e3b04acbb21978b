//! Summary statistics over a recorded data file.

use crate::recorder::{read_records, ReadError, SampleRecord};
use crate::source::{QuantityType, Unit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Descriptive statistics of one recording.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub quantity_type: Option<QuantityType>,
    pub unit: Option<Unit>,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; needs at least two records
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub first_start: Option<DateTime<Utc>>,
    pub last_start: Option<DateTime<Utc>>,
}

impl RecordingSummary {
    pub fn from_records(records: &[SampleRecord]) -> Self {
        let Some(first) = records.first() else {
            return Self::default();
        };

        let values: Vec<f64> = records.iter().map(|r| r.value).collect();
        let stats = describe(&values);

        Self {
            quantity_type: Some(first.quantity_type),
            unit: Some(first.unit),
            count: records.len(),
            mean: Some(stats.mean),
            std_dev: stats.std_dev,
            min: Some(stats.min),
            max: Some(stats.max),
            first_start: records.iter().map(|r| r.start_date).min(),
            last_start: records.iter().map(|r| r.start_date).max(),
        }
    }

    /// Read a data file and summarize it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let records = read_records(path)?;
        Ok(Self::from_records(&records))
    }

    /// Span between the first and last sample start, in seconds.
    pub fn span_secs(&self) -> Option<f64> {
        match (self.first_start, self.last_start) {
            (Some(first), Some(last)) => Some((last - first).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

struct Descriptive {
    mean: f64,
    std_dev: Option<f64>,
    min: f64,
    max: f64,
}

/// Descriptive statistics of a non-empty slice.
fn describe(values: &[f64]) -> Descriptive {
    use statrs::statistics::Statistics;

    Descriptive {
        mean: values.mean(),
        std_dev: (values.len() > 1).then(|| values.std_dev()),
        min: Statistics::min(values),
        max: Statistics::max(values),
    }
}

impl fmt::Display for RecordingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.unit.map(|u| u.symbol()).unwrap_or("");
        let quantity = self
            .quantity_type
            .map(|q| q.identifier())
            .unwrap_or("unknown");
        let show = |v: Option<f64>| match v {
            Some(v) => format!("{v:.2} {unit}"),
            None => "n/a".to_string(),
        };

        writeln!(f, "Quantity: {quantity}")?;
        writeln!(f, "Records: {}", self.count)?;
        writeln!(f, "Mean: {}", show(self.mean))?;
        writeln!(f, "Std dev: {}", show(self.std_dev))?;
        writeln!(f, "Min: {}", show(self.min))?;
        writeln!(f, "Max: {}", show(self.max))?;
        match self.span_secs() {
            Some(span) => write!(f, "Span: {span:.1}s"),
            None => write!(f, "Span: n/a"),
        }
    }
}
