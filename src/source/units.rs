//! Measurement units for quantity samples.
//!
//! Units come from a small fixed catalog. Each unit belongs to a dimension and
//! carries a scale factor to the base unit of that dimension, so any two units
//! of the same dimension can be converted into each other.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Physical dimension of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Events per time (base: count/s)
    Frequency,
    /// Dimensionless ratio (base: fraction)
    Fraction,
    /// Mass (base: kg)
    Mass,
    /// Plain count (base: count)
    Count,
}

/// A measurement unit from the catalog.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(into = "String")]
pub struct Unit {
    symbol: &'static str,
    dimension: Dimension,
    /// Multiplier converting a value in this unit to the dimension's base unit.
    scale: f64,
}

const CATALOG: &[Unit] = &[
    Unit::new("count/s", Dimension::Frequency, 1.0),
    Unit::new("count/min", Dimension::Frequency, 1.0 / 60.0),
    Unit::new("fraction", Dimension::Fraction, 1.0),
    Unit::new("%", Dimension::Fraction, 0.01),
    Unit::new("kg", Dimension::Mass, 1.0),
    Unit::new("g", Dimension::Mass, 0.001),
    Unit::new("lb", Dimension::Mass, 0.453_592_37),
    Unit::new("count", Dimension::Count, 1.0),
];

impl Unit {
    const fn new(symbol: &'static str, dimension: Dimension, scale: f64) -> Self {
        Self {
            symbol,
            dimension,
            scale,
        }
    }

    /// Beats (or breaths) per minute.
    pub fn count_per_minute() -> Self {
        CATALOG[1]
    }

    /// Events per second.
    pub fn count_per_second() -> Self {
        CATALOG[0]
    }

    pub fn percent() -> Self {
        CATALOG[3]
    }

    pub fn kilogram() -> Self {
        CATALOG[4]
    }

    pub fn count() -> Self {
        CATALOG[7]
    }

    /// Look a unit up by its symbol.
    pub fn parse(symbol: &str) -> Result<Self, UnitError> {
        let symbol = symbol.trim();
        // "bpm" is common enough in study configs to accept as an alias.
        let symbol = if symbol.eq_ignore_ascii_case("bpm") {
            "count/min"
        } else {
            symbol
        };

        CATALOG
            .iter()
            .find(|u| u.symbol == symbol)
            .copied()
            .ok_or_else(|| UnitError::Unknown(symbol.to_string()))
    }

    /// All catalog units of a dimension.
    pub fn all_of(dimension: Dimension) -> impl Iterator<Item = Unit> {
        CATALOG
            .iter()
            .copied()
            .filter(move |u| u.dimension == dimension)
    }

    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Whether values in `self` can be expressed in `other`.
    pub fn is_compatible_with(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Convert `value` expressed in `self` into `target`.
    pub fn convert(&self, value: f64, target: &Unit) -> Result<f64, UnitError> {
        if !self.is_compatible_with(target) {
            return Err(UnitError::Incompatible {
                from: self.symbol,
                to: target.symbol,
            });
        }
        if self.symbol == target.symbol {
            return Ok(value);
        }
        Ok(value * self.scale / target.scale)
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Eq for Unit {}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol)
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

impl TryFrom<String> for Unit {
    type Error = UnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Unit::parse(&value)
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let symbol = String::deserialize(deserializer)?;
        Unit::parse(&symbol).map_err(serde::de::Error::custom)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.symbol.to_string()
    }
}

/// Unit lookup and conversion errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("unknown unit '{0}'")]
    Unknown(String),
    #[error("cannot convert {from} to {to}")]
    Incompatible {
        from: &'static str,
        to: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_units() {
        assert_eq!(Unit::parse("count/min").unwrap(), Unit::count_per_minute());
        assert_eq!(Unit::parse(" kg ").unwrap(), Unit::kilogram());
        assert_eq!(Unit::parse("BPM").unwrap(), Unit::count_per_minute());
        assert!(matches!(Unit::parse("furlong"), Err(UnitError::Unknown(_))));
    }

    #[test]
    fn test_frequency_conversion() {
        let per_sec = Unit::count_per_second();
        let per_min = Unit::count_per_minute();

        let bpm = per_sec.convert(1.2, &per_min).unwrap();
        assert!((bpm - 72.0).abs() < 1e-9);

        let hz = per_min.convert(90.0, &per_sec).unwrap();
        assert!((hz - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_mass_and_fraction_conversion() {
        let lb = Unit::parse("lb").unwrap();
        let kg = lb.convert(10.0, &Unit::kilogram()).unwrap();
        assert!((kg - 4.5359237).abs() < 1e-9);

        let fraction = Unit::percent()
            .convert(97.0, &Unit::parse("fraction").unwrap())
            .unwrap();
        assert!((fraction - 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_incompatible_conversion() {
        let err = Unit::kilogram()
            .convert(1.0, &Unit::count_per_minute())
            .unwrap_err();
        assert_eq!(
            err,
            UnitError::Incompatible {
                from: "kg",
                to: "count/min"
            }
        );
    }

    #[test]
    fn test_serde_uses_symbol() {
        let json = serde_json::to_string(&Unit::count_per_minute()).unwrap();
        assert_eq!(json, "\"count/min\"");

        let unit: Unit = serde_json::from_str("\"%\"").unwrap();
        assert_eq!(unit, Unit::percent());
        assert!(serde_json::from_str::<Unit>("\"parsec\"").is_err());
    }

    #[test]
    fn test_deserialize_from_owned_input() {
        #[derive(Deserialize)]
        struct Reading {
            unit: Unit,
        }

        let input = String::from(r#"{"unit": "bpm"}"#).into_bytes();
        let reading: Reading = serde_json::from_reader(input.as_slice()).unwrap();
        assert_eq!(reading.unit, Unit::count_per_minute());

        let err = serde_json::from_str::<Unit>("\"parsec\"").unwrap_err();
        assert!(err.to_string().contains("unknown unit 'parsec'"));
    }
}
