//! Presentation timestamps

use super::Rational;
use std::fmt;

/// A timestamp counted in stream timebase units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub value: i64,
}

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Timestamp { value }
    }

    /// Unknown timestamp
    pub fn none() -> Self {
        Timestamp { value: i64::MIN }
    }

    pub fn is_valid(&self) -> bool {
        self.value != i64::MIN
    }

    /// Seconds from stream start, 0.0 when unknown
    pub fn to_seconds(&self, timebase: Rational) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        self.value as f64 * timebase.to_f64()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::none()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "NOPTS")
        }
    }
}
