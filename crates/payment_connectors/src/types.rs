//! Shared transaction-status model and money type.

use cards::{CardExpiration, CardIssueData, CardNumber, CardSecurityCode};
use masking::Secret;
use time::OffsetDateTime;

/// The lifecycle operation a gateway interaction was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RequestType {
    Pay,
    Hold,
    Release,
    Void,
    Refund,
    Verify,
    ThreeDSecureAuth,
}

/// Outcome of one gateway-side check (address, postal code, card
/// verification value, 3-D Secure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum CheckStatus {
    /// The gateway did not return the check at all.
    #[default]
    Missing,
    /// The gateway returned the check but did not run it.
    NotChecked,
    Passed,
    Failed,
}

/// Endpoint selection. Defaults to the safest non-production mode a
/// driver supports; there is no process-wide default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Live,
    Test,
    Sandbox,
    Simulator,
}

/// ISO currency codes accepted by the configured drivers. All are
/// two-decimal currencies.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum Currency {
    AUD,
    CAD,
    EUR,
    GBP,
    NZD,
    USD,
}

/// An amount in minor currency units (cents, pence).
///
/// Parsing from a decimal string rounds half-to-even at two places using
/// integer arithmetic only; rendering is a fixed-point string. No binary
/// float is involved at any point, so the same order formats identically
/// across drivers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct MinorUnit(i64);

/// Failure to parse a decimal amount string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("not a valid decimal amount")]
pub struct AmountParseError;

impl MinorUnit {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn get_amount_as_i64(&self) -> i64 {
        self.0
    }

    /// Parse a decimal string such as `"19.995"` into minor units,
    /// rounding half-to-even at the second decimal place.
    pub fn from_decimal_str(value: &str) -> Result<Self, AmountParseError> {
        let trimmed = value.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (unsigned, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(AmountParseError);
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AmountParseError);
        }

        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| AmountParseError)?
        };

        let mut frac = frac_part.chars();
        let tens = i64::from(frac.next().and_then(|c| c.to_digit(10)).unwrap_or(0));
        let units = i64::from(frac.next().and_then(|c| c.to_digit(10)).unwrap_or(0));
        let remainder: &str = frac.as_str().trim_end_matches('0');

        let mut minor = whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(tens * 10 + units))
            .ok_or(AmountParseError)?;

        // Round the digits beyond two places: up above a half, down below,
        // to the even cent on an exact half.
        let mut remainder_chars = remainder.chars();
        match remainder_chars.next().and_then(|c| c.to_digit(10)) {
            None => {}
            Some(first) if first > 5 => minor += 1,
            Some(5) => {
                if remainder_chars.as_str().chars().any(|c| c != '0') || minor % 2 == 1 {
                    minor += 1;
                }
            }
            Some(_) => {}
        }

        Ok(Self(if negative { -minor } else { minor }))
    }

    /// Fixed-point major-unit rendering without thousands separators,
    /// e.g. `1999` ⇒ `"19.99"`.
    pub fn to_major_unit_string(&self) -> String {
        let abs = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::fmt::Display for MinorUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Card brands the request builders know about. Switch/Solo-class debit
/// brands carry extra required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum CardBrand {
    Visa,
    Mastercard,
    AmericanExpress,
    Discover,
    Maestro,
    Switch,
    Solo,
}

impl CardBrand {
    /// Brands whose requests must carry a start date.
    pub fn requires_start_date(&self) -> bool {
        matches!(self, Self::Switch | Self::Solo | Self::AmericanExpress)
    }

    /// Brands whose requests must carry an issue number.
    pub fn requires_issue_number(&self) -> bool {
        matches!(self, Self::Switch | Self::Solo)
    }
}

/// Ephemeral card credentials for a single gateway call.
///
/// Deliberately implements neither `Debug` nor `serde::Serialize`: the
/// panes can only leave through a driver's wire request types. Never
/// persisted, never logged.
pub struct CardCredentials {
    pub number: CardNumber,
    pub expiration: CardExpiration,
    pub security_code: Option<CardSecurityCode>,
    pub holder_name: Secret<String>,
    pub brand: CardBrand,
    pub issue_data: Option<CardIssueData>,
}

/// Pending 3-D Secure challenge state carried across the bank redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreeDsChallenge {
    /// Opaque correlation token the gateway expects back verbatim.
    pub merchant_data: Secret<String>,
    /// Issuer authentication URL the customer must be redirected to.
    pub acs_url: String,
    /// Payload to post to the issuer along with the redirect.
    pub payload: Secret<String>,
}

/// Result of resolving a 3-D Secure challenge: the superseded pending
/// transaction (rewritten to `ThreeDSecureAuth` so it can no longer be
/// mistaken for an actionable hold) and the final transaction of the
/// originally requested type.
#[derive(Debug)]
pub struct ThreeDsCompletion {
    pub superseded: Transaction,
    pub transaction: Transaction,
}

/// The record of one gateway interaction. Created only by drivers, owned
/// by the calling checkout workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub request_type: RequestType,
    pub order_id: String,
    /// Caller-unique code correlating this attempt at the gateway. A retry
    /// is a new attempt and must mint a new code.
    pub merchant_transaction_code: String,
    pub amount: MinorUnit,
    pub currency: Currency,
    /// Assigned only from a successful gateway reply, never locally.
    pub gateway_transaction_id: Option<String>,
    /// Correlation secret some gateways require to touch this transaction
    /// again (release/void/refund).
    pub security_key: Option<Secret<String>>,
    pub authorization_code: Option<Secret<String>>,
    /// Masked pane (`XXXX` + last four) kept for refund composition.
    pub masked_card_number: Option<String>,
    pub address_status: CheckStatus,
    pub postal_code_status: CheckStatus,
    pub card_verification_value_status: CheckStatus,
    pub three_d_secure_status: CheckStatus,
    /// Present only while a 3-D Secure challenge is pending.
    pub continuation: Option<ThreeDsChallenge>,
    /// Construction time, always UTC.
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// A fresh, locally-incomplete transaction for one gateway attempt.
    pub fn new(
        request_type: RequestType,
        order_id: impl Into<String>,
        merchant_transaction_code: String,
        amount: MinorUnit,
        currency: Currency,
    ) -> Self {
        Self {
            request_type,
            order_id: order_id.into(),
            merchant_transaction_code,
            amount,
            currency,
            gateway_transaction_id: None,
            security_key: None,
            authorization_code: None,
            masked_card_number: None,
            address_status: CheckStatus::Missing,
            postal_code_status: CheckStatus::Missing,
            card_verification_value_status: CheckStatus::Missing,
            three_d_secure_status: CheckStatus::Missing,
            continuation: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Whether this transaction represents a completed gateway call.
    pub fn is_complete(&self) -> bool {
        self.gateway_transaction_id.is_some()
    }

    /// Whether a 3-D Secure challenge is outstanding.
    pub fn is_pending_authentication(&self) -> bool {
        self.continuation.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_parsing_rounds_half_to_even() {
        assert_eq!(MinorUnit::from_decimal_str("19.99"), Ok(MinorUnit::new(1999)));
        assert_eq!(MinorUnit::from_decimal_str("19.985"), Ok(MinorUnit::new(1998)));
        assert_eq!(MinorUnit::from_decimal_str("19.995"), Ok(MinorUnit::new(2000)));
        assert_eq!(MinorUnit::from_decimal_str("19.9951"), Ok(MinorUnit::new(2000)));
        assert_eq!(MinorUnit::from_decimal_str("19.9949"), Ok(MinorUnit::new(1999)));
        assert_eq!(MinorUnit::from_decimal_str("0.005"), Ok(MinorUnit::new(0)));
        assert_eq!(MinorUnit::from_decimal_str("0.015"), Ok(MinorUnit::new(2)));
        assert_eq!(MinorUnit::from_decimal_str("-1.005"), Ok(MinorUnit::new(-100)));
        assert_eq!(MinorUnit::from_decimal_str("7"), Ok(MinorUnit::new(700)));
        assert_eq!(MinorUnit::from_decimal_str(".50"), Ok(MinorUnit::new(50)));
    }

    #[test]
    fn bad_amounts_are_rejected() {
        assert!(MinorUnit::from_decimal_str("").is_err());
        assert!(MinorUnit::from_decimal_str(".").is_err());
        assert!(MinorUnit::from_decimal_str("12,50").is_err());
        assert!(MinorUnit::from_decimal_str("1e3").is_err());
    }

    #[test]
    fn fixed_point_rendering() {
        assert_eq!(MinorUnit::new(1999).to_major_unit_string(), "19.99");
        assert_eq!(MinorUnit::new(200000).to_major_unit_string(), "2000.00");
        assert_eq!(MinorUnit::new(5).to_major_unit_string(), "0.05");
        assert_eq!(MinorUnit::new(-1999).to_major_unit_string(), "-19.99");
    }

    #[test]
    fn new_transaction_is_incomplete() {
        let transaction = Transaction::new(
            RequestType::Pay,
            "order-1",
            "order-1-abc123".to_string(),
            MinorUnit::new(1999),
            Currency::GBP,
        );
        assert!(!transaction.is_complete());
        assert!(!transaction.is_pending_authentication());
        assert_eq!(transaction.address_status, CheckStatus::Missing);
        assert_eq!(transaction.created_at.offset(), time::UtcOffset::UTC);
    }

    #[test]
    fn brand_conditional_requirements() {
        assert!(CardBrand::Switch.requires_issue_number());
        assert!(CardBrand::Solo.requires_start_date());
        assert!(CardBrand::AmericanExpress.requires_start_date());
        assert!(!CardBrand::Visa.requires_start_date());
        assert!(!CardBrand::AmericanExpress.requires_issue_number());
    }
}
