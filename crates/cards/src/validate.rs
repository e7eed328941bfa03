use std::{fmt, ops::Deref, str::FromStr};

use masking::{PeekInterface, Strategy, StrongSecret, WithType};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Error returned when a string fails card number validation.
#[derive(Debug, Deserialize, Serialize, Error)]
#[error("not a valid card number")]
pub struct CardNumberValidationError;

impl From<core::convert::Infallible> for CardNumberValidationError {
    fn from(_: core::convert::Infallible) -> Self {
        Self
    }
}

/// Card number, validated on construction, masked everywhere but the wire.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CardNumber(StrongSecret<String, CardNumberStrategy>);

impl CardNumber {
    /// First six digits, identifying the issuer.
    pub fn get_card_isin(&self) -> String {
        self.0.peek().chars().take(6).collect()
    }

    /// Last four digits, as shown on receipts.
    pub fn get_last4(&self) -> String {
        let digits: Vec<char> = self.0.peek().chars().collect();
        digits
            .iter()
            .skip(digits.len().saturating_sub(4))
            .collect()
    }
}

impl FromStr for CardNumber {
    type Err = CardNumberValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let no_whitespace: String = s.split_whitespace().collect();
        if !no_whitespace.chars().all(|c| c.is_ascii_digit()) {
            return Err(CardNumberValidationError);
        }
        match luhn::valid(&no_whitespace) {
            true => Ok(Self(StrongSecret::from_str(&no_whitespace)?)),
            false => Err(CardNumberValidationError),
        }
    }
}

impl TryFrom<String> for CardNumber {
    type Error = CardNumberValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl Deref for CardNumber {
    type Target = StrongSecret<String, CardNumberStrategy>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for CardNumber {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Masking strategy printing the first six digits and starring the rest.
pub enum CardNumberStrategy {}

impl<T> Strategy<T> for CardNumberStrategy
where
    T: AsRef<str>,
{
    fn fmt(val: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val_str: &str = val.as_ref();

        if val_str.len() < 15 || val_str.len() > 19 {
            return WithType::fmt(val, f);
        }

        if let Some(value) = val_str.get(..6) {
            write!(f, "{}{}", value, "*".repeat(val_str.len() - 6))
        } else {
            WithType::fmt(val, f)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use masking::Secret;

    use super::*;

    #[test]
    fn valid_card_number() {
        let card = CardNumber::from_str("4242 4242 4242 4242").expect("valid number");
        assert_eq!(card.get_card_isin(), "424242");
        assert_eq!(card.get_last4(), "4242");
    }

    #[test]
    fn invalid_luhn_is_rejected() {
        assert!(CardNumber::from_str("4242424242424241").is_err());
        assert!(CardNumber::from_str("not-a-card").is_err());
    }

    #[test]
    fn debug_masks_all_but_the_isin() {
        let card = CardNumber::from_str("4242424242424242").expect("valid number");
        assert_eq!(format!("{card:?}"), "CardNumber(424242**********)");

        let short: Secret<String, CardNumberStrategy> = Secret::new("1234567890".to_string());
        assert_eq!(
            format!("{short:?}"),
            "*** alloc::string::String ***"
        );
    }
}
