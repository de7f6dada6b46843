//! Rational numbers for stream timebases

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rational number represented as numerator/denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    /// Create a new rational number in lowest terms
    pub fn new(num: i64, den: i64) -> Self {
        let mut r = Rational { num, den };
        r.reduce();
        r
    }

    /// Convert to floating point
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Both terms positive
    pub fn is_positive(self) -> bool {
        self.num > 0 && self.den > 0
    }

    fn reduce(&mut self) {
        if self.den == 0 {
            return;
        }

        let gcd = Self::gcd(self.num.abs(), self.den.abs());
        if gcd > 1 {
            self.num /= gcd;
            self.den /= gcd;
        }

        // Keep denominator positive
        if self.den < 0 {
            self.num = -self.num;
            self.den = -self.den;
        }
    }

    fn gcd(mut a: i64, mut b: i64) -> i64 {
        while b != 0 {
            let t = b;
            b = a % b;
            a = t;
        }
        a
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational { num: 0, den: 1 }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_reduction() {
        let r = Rational::new(2, 60);
        assert_eq!(r.num, 1);
        assert_eq!(r.den, 30);

        let r = Rational::new(1, -25);
        assert_eq!(r, Rational::new(-1, 25));
        assert!(!r.is_positive());
    }

    #[test]
    fn test_rational_to_float() {
        assert_eq!(Rational::new(1, 2).to_f64(), 0.5);
        assert_eq!(Rational::new(1, 30).to_string(), "1/30");
    }
}
