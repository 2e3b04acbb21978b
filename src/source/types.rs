//! Quantity types and samples delivered by data sources.

use crate::source::units::{Dimension, Unit, UnitError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The physiological signal a recorder subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityType {
    HeartRate,
    RespiratoryRate,
    OxygenSaturation,
    BodyMass,
    StepCount,
}

impl QuantityType {
    pub const ALL: [QuantityType; 5] = [
        QuantityType::HeartRate,
        QuantityType::RespiratoryRate,
        QuantityType::OxygenSaturation,
        QuantityType::BodyMass,
        QuantityType::StepCount,
    ];

    /// Stable identifier used in file names and records.
    pub fn identifier(&self) -> &'static str {
        match self {
            QuantityType::HeartRate => "heart_rate",
            QuantityType::RespiratoryRate => "respiratory_rate",
            QuantityType::OxygenSaturation => "oxygen_saturation",
            QuantityType::BodyMass => "body_mass",
            QuantityType::StepCount => "step_count",
        }
    }

    /// Dimension every unit for this quantity must have.
    pub fn dimension(&self) -> Dimension {
        match self {
            QuantityType::HeartRate | QuantityType::RespiratoryRate => Dimension::Frequency,
            QuantityType::OxygenSaturation => Dimension::Fraction,
            QuantityType::BodyMass => Dimension::Mass,
            QuantityType::StepCount => Dimension::Count,
        }
    }

    /// The unit studies usually record this quantity in.
    pub fn default_unit(&self) -> Unit {
        match self {
            QuantityType::HeartRate | QuantityType::RespiratoryRate => Unit::count_per_minute(),
            QuantityType::OxygenSaturation => Unit::percent(),
            QuantityType::BodyMass => Unit::kilogram(),
            QuantityType::StepCount => Unit::count(),
        }
    }

    /// Whether samples of this quantity can be expressed in `unit`.
    pub fn accepts(&self, unit: &Unit) -> bool {
        unit.dimension() == self.dimension()
    }
}

impl fmt::Display for QuantityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for QuantityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        QuantityType::ALL
            .into_iter()
            .find(|q| q.identifier() == normalized)
            .ok_or_else(|| format!("unknown quantity type '{s}'"))
    }
}

/// One timestamped, unit-qualified observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Observed value, expressed in `unit`
    pub value: f64,
    /// Unit of `value`
    pub unit: Unit,
    /// Start of the validity interval
    pub start: DateTime<Utc>,
    /// End of the validity interval
    pub end: DateTime<Utc>,
    /// Device or app that produced the observation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Sample {
    /// Create an instantaneous sample (start == end).
    pub fn new(value: f64, unit: Unit, at: DateTime<Utc>) -> Self {
        Self {
            value,
            unit,
            start: at,
            end: at,
            source: None,
        }
    }

    /// Attach a source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the end of the validity interval.
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = end;
        self
    }

    /// Timestamp used for ordering samples.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.start
    }

    /// Return a copy of this sample with its value expressed in `target`.
    pub fn converted_to(&self, target: &Unit) -> Result<Sample, UnitError> {
        let value = self.unit.convert(self.value, target)?;
        Ok(Sample {
            value,
            unit: *target,
            start: self.start,
            end: self.end,
            source: self.source.clone(),
        })
    }
}
