use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must not be negative")]
    Negative,
    #[error("amount must be at least {0}")]
    BelowMinimum(String),
    #[error("currency must be a 3-letter ISO code")]
    InvalidCurrency,
}

/// Smallest amount a caller may submit for settlement.
pub fn minimum_charge() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

/// Reject negative amounts. Scale is left untouched; stored amounts keep the precision they arrived with.
pub fn validate_amount(value: &BigDecimal) -> Result<(), MoneyError> {
    if value < &BigDecimal::zero() {
        return Err(MoneyError::Negative);
    }
    Ok(())
}

/// Request-level rule: a charge must be non-negative and at least one cent.
pub fn validate_charge(value: &BigDecimal) -> Result<(), MoneyError> {
    validate_amount(value)?;
    let min = minimum_charge();
    if value < &min {
        return Err(MoneyError::BelowMinimum(min.to_string()));
    }
    Ok(())
}

/// Exact sum of amounts; `None` for an empty input so callers can tell "no rows" from zero.
pub fn sum_amounts<'a, I>(values: I) -> Option<BigDecimal>
where
    I: IntoIterator<Item = &'a BigDecimal>,
{
    let mut iter = values.into_iter();
    let first = iter.next()?.clone();
    Some(iter.fold(first, |acc, v| acc + v))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 3 && s.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(s.to_string()))
        } else {
            Err(MoneyError::InvalidCurrency)
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = MoneyError;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self { value.0 }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal { BigDecimal::from_str(s).unwrap() }

    #[test]
    fn negative_amount_rejected() {
        assert_eq!(validate_amount(&dec("-0.01")), Err(MoneyError::Negative));
        assert!(validate_amount(&dec("0")).is_ok());
    }

    #[test]
    fn charge_needs_one_cent() {
        assert!(matches!(validate_charge(&dec("0.009")), Err(MoneyError::BelowMinimum(_))));
        assert!(validate_charge(&dec("0.01")).is_ok());
    }

    #[test]
    fn validation_keeps_scale() {
        let v = dec("100.50");
        validate_charge(&v).unwrap();
        assert_eq!(v.to_string(), "100.50");
    }

    #[test]
    fn sum_is_exact_and_absent_when_empty() {
        let values = vec![dec("0.10"), dec("0.20"), dec("100.005")];
        assert_eq!(sum_amounts(&values), Some(dec("100.305")));
        assert_eq!(sum_amounts(std::iter::empty()), None);
    }

    #[test]
    fn currency_code_shape() {
        assert!("USD".parse::<CurrencyCode>().is_ok());
        assert_eq!("usd".parse::<CurrencyCode>(), Err(MoneyError::InvalidCurrency));
        assert_eq!("EURO".parse::<CurrencyCode>(), Err(MoneyError::InvalidCurrency));
        assert_eq!("E1R".parse::<CurrencyCode>(), Err(MoneyError::InvalidCurrency));
    }
}
