use serde::{Deserialize, Serialize};
use std::fmt;

/// A price in integer minor units of `currency`. No conversion between
/// currencies is ever performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// ISO-4217 shape check: exactly three ASCII uppercase letters.
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_code_shape() {
        assert!(is_currency_code("VND"));
        assert!(is_currency_code("USD"));
        assert!(!is_currency_code("usd"));
        assert!(!is_currency_code("US"));
        assert!(!is_currency_code("EURO"));
        assert!(!is_currency_code("U$D"));
    }

    #[test]
    fn positive_and_display() {
        let price = Money::new(500_000, "VND");
        assert!(price.is_positive());
        assert_eq!(price.to_string(), "500000 VND");
        assert!(!Money::new(0, "VND").is_positive());
        assert!(!Money::new(-1, "VND").is_positive());
    }
}
