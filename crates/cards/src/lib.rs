//! Validated card primitives: number, expiration, security code and the
//! issue data certain debit brands require. All panes are strong secrets;
//! nothing here can be logged in the clear.

mod validate;

use error_stack::report;
use masking::{PeekInterface, Secret, StrongSecret};
use time::OffsetDateTime;

pub use crate::validate::{CardNumber, CardNumberStrategy, CardNumberValidationError};

/// Validation failure for a card pane.
#[derive(Debug, thiserror::Error)]
pub enum CardError {
    /// A pane failed its range or format check.
    #[error("invalid value: {message}")]
    InvalidValue {
        /// Which check failed.
        message: &'static str,
    },
}

/// Card security code (CVV/CV2), three or four digits.
pub struct CardSecurityCode(StrongSecret<u16>);

impl CardSecurityCode {
    pub fn new(secret: StrongSecret<u16>) -> error_stack::Result<Self, CardError> {
        let csc = secret.peek();

        if *csc > 99 && *csc < 10000 {
            Ok(Self(secret))
        } else {
            Err(report!(CardError::InvalidValue {
                message: "invalid card security code"
            }))
        }
    }

    /// Digits as sent on the wire, preserving a leading zero.
    pub fn to_digits(&self) -> String {
        format!("{:03}", self.0.peek())
    }
}

/// Card expiration month, 1 through 12.
pub struct CardExpirationMonth(StrongSecret<u8>);

impl CardExpirationMonth {
    pub fn new(secret: StrongSecret<u8>) -> error_stack::Result<Self, CardError> {
        let month = secret.peek();

        if *month >= 1 && *month <= 12 {
            Ok(Self(secret))
        } else {
            Err(report!(CardError::InvalidValue {
                message: "invalid card expiration month"
            }))
        }
    }

    /// Month rendered as two digits, e.g. `03`.
    pub fn two_digits(&self) -> String {
        format!("{:02}", self.0.peek())
    }
}

/// Card expiration year, four digits.
pub struct CardExpirationYear(StrongSecret<u16>);

impl CardExpirationYear {
    pub fn new(secret: StrongSecret<u16>) -> error_stack::Result<Self, CardError> {
        let year = secret.peek();

        if *year >= 1997 && *year <= 9999 {
            Ok(Self(secret))
        } else {
            Err(report!(CardError::InvalidValue {
                message: "invalid card expiration year"
            }))
        }
    }

    pub fn four_digits(&self) -> String {
        self.0.peek().to_string()
    }

    pub fn two_digits(&self) -> String {
        format!("{:02}", self.0.peek() % 100)
    }
}

/// A month/year pair: an expiry date, or a start date for brands that
/// carry one.
pub struct CardExpiration {
    pub month: CardExpirationMonth,
    pub year: CardExpirationYear,
}

impl CardExpiration {
    pub fn new(
        secret_month: StrongSecret<u8>,
        secret_year: StrongSecret<u16>,
    ) -> error_stack::Result<Self, CardError> {
        let month = CardExpirationMonth::new(secret_month)?;
        let year = CardExpirationYear::new(secret_year)?;
        Ok(Self { month, year })
    }

    /// `MMYY` rendering used by field-protocol gateways.
    pub fn mmyy(&self) -> String {
        format!("{}{}", self.month.two_digits(), self.year.two_digits())
    }

    /// `YYYY-MM` rendering used by REST gateways.
    pub fn yyyy_mm(&self) -> String {
        format!("{}-{}", self.year.four_digits(), self.month.two_digits())
    }

    /// Whether the expiry lies strictly before the current UTC month.
    pub fn is_expired(&self) -> bool {
        let now = OffsetDateTime::now_utc();
        let year = i32::from(*self.year.0.peek());
        let month = u8::from(now.month());
        year < now.year() || (year == now.year() && *self.month.0.peek() < month)
    }
}

/// Start date and issue number carried by Switch/Solo-class debit brands.
pub struct CardIssueData {
    pub start: Option<CardExpiration>,
    pub issue_number: Option<Secret<String>>,
}
