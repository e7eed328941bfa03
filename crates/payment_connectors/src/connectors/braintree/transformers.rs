//! Wire types and status normalization for the Braintree REST API.

use base64::Engine;
use cards::CardNumber;
use masking::{Maskable, Mask, PeekInterface, Secret};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{DeclineCategory, DeclinedError, ResponseClass},
    order::Order,
    types::{CardCredentials, CheckStatus, Mode},
};

pub struct BraintreeConfig {
    pub merchant_id: Secret<String>,
    pub public_key: Secret<String>,
    pub private_key: Secret<String>,
    pub mode: Mode,
}

impl BraintreeConfig {
    pub fn base_url(&self) -> String {
        let host = match self.mode {
            Mode::Live => "api.braintreegateway.com",
            _ => "api.sandbox.braintreegateway.com",
        };
        format!("https://{host}/merchants/{}", self.merchant_id.peek())
    }

    /// Basic auth over the public/private key pair, masked in any request
    /// dump.
    pub fn authorization_header(&self) -> Maskable<String> {
        let credentials = format!("{}:{}", self.public_key.peek(), self.private_key.peek());
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
        .into_masked()
    }
}

#[derive(Serialize)]
pub struct CreditCard {
    number: CardNumber,
    expiration_month: String,
    expiration_year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cvv: Option<Secret<String>>,
    cardholder_name: Secret<String>,
}

impl From<&CardCredentials> for CreditCard {
    fn from(card: &CardCredentials) -> Self {
        Self {
            number: card.number.clone(),
            expiration_month: card.expiration.month.two_digits(),
            expiration_year: card.expiration.year.four_digits(),
            cvv: card
                .security_code
                .as_ref()
                .map(|code| Secret::new(code.to_digits())),
            cardholder_name: card.holder_name.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct BillingAddress {
    street_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    extended_address: Option<String>,
    locality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    postal_code: Option<String>,
    country_name: String,
}

impl From<&Order> for BillingAddress {
    fn from(order: &Order) -> Self {
        let billing = &order.billing_address;
        Self {
            street_address: billing.line1.clone(),
            extended_address: billing.line2.clone(),
            locality: billing.city.clone(),
            region: billing.provstate.clone(),
            postal_code: billing.postal_code.clone(),
            country_name: billing.country.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct TransactionOptions {
    submit_for_settlement: bool,
}

#[derive(Serialize)]
pub struct SaleBody {
    #[serde(rename = "type")]
    kind: &'static str,
    amount: String,
    order_id: String,
    merchant_account_id: Option<String>,
    credit_card: CreditCard,
    billing: BillingAddress,
    options: TransactionOptions,
}

/// `POST /transactions` envelope.
#[derive(Serialize)]
pub struct SaleRequest {
    transaction: SaleBody,
}

impl SaleRequest {
    pub fn new(
        order: &Order,
        card: &CardCredentials,
        order_id: &str,
        submit_for_settlement: bool,
    ) -> Self {
        Self {
            transaction: SaleBody {
                kind: "sale",
                amount: order.total.to_major_unit_string(),
                order_id: order_id.to_string(),
                merchant_account_id: None,
                credit_card: CreditCard::from(card),
                billing: BillingAddress::from(order),
                options: TransactionOptions {
                    submit_for_settlement,
                },
            },
        }
    }
}

#[derive(Serialize)]
pub struct AmountBody {
    amount: String,
}

/// Envelope for refund and submit-for-settlement calls.
#[derive(Serialize)]
pub struct AmountRequest {
    transaction: AmountBody,
}

impl AmountRequest {
    pub fn new(amount: String) -> Self {
        Self {
            transaction: AmountBody { amount },
        }
    }
}

#[derive(Serialize)]
pub struct VerificationBody {
    credit_card: CreditCard,
    #[serde(skip_serializing_if = "Option::is_none")]
    billing: Option<BillingAddress>,
}

/// `POST /verifications` envelope.
#[derive(Serialize)]
pub struct VerificationRequest {
    verification: VerificationBody,
}

impl VerificationRequest {
    pub fn new(order: &Order, card: &CardCredentials) -> Self {
        Self {
            verification: VerificationBody {
                credit_card: CreditCard::from(card),
                billing: Some(BillingAddress::from(order)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Authorizing,
    Authorized,
    SubmittedForSettlement,
    Settling,
    SettlementPending,
    Settled,
    Voided,
    ProcessorDeclined,
    GatewayRejected,
    AuthorizationExpired,
    Failed,
}

impl TransactionStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Authorizing
                | Self::Authorized
                | Self::SubmittedForSettlement
                | Self::Settling
                | Self::SettlementPending
                | Self::Settled
                | Self::Voided
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyCard {
    #[serde(rename = "last_4")]
    pub last_four: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionReply {
    pub id: String,
    pub status: TransactionStatus,
    pub processor_response_code: Option<String>,
    pub processor_response_text: Option<String>,
    pub processor_authorization_code: Option<String>,
    pub gateway_rejection_reason: Option<String>,
    pub avs_street_address_response_code: Option<String>,
    pub avs_postal_code_response_code: Option<String>,
    pub cvv_response_code: Option<String>,
    pub credit_card: Option<ReplyCard>,
}

/// Reply envelope: a transaction on success or decline, a bare message on
/// a validation failure.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResponse {
    pub transaction: Option<TransactionReply>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    ProcessorDeclined,
    GatewayRejected,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationReply {
    pub id: String,
    pub status: VerificationStatus,
    pub processor_response_code: Option<String>,
    pub processor_response_text: Option<String>,
    pub gateway_rejection_reason: Option<String>,
    pub avs_street_address_response_code: Option<String>,
    pub avs_postal_code_response_code: Option<String>,
    pub cvv_response_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationResponse {
    pub verification: Option<VerificationReply>,
    pub message: Option<String>,
}

/// Processor decline codes to the user-actionable categories.
pub fn category_for_processor_code(code: &str) -> DeclineCategory {
    match code {
        "2004" => DeclineCategory::CardExpired,
        "2005" | "2007" => DeclineCategory::CardNotValid,
        "2010" => DeclineCategory::CardVerificationValue,
        "2015" => DeclineCategory::CardType,
        "2060" => DeclineCategory::AddressMismatch,
        _ => DeclineCategory::CardError,
    }
}

fn category_for_rejection(reason: Option<&str>) -> DeclineCategory {
    match reason {
        Some("avs") | Some("avs_and_cvv") => DeclineCategory::AddressMismatch,
        Some("cvv") => DeclineCategory::CardVerificationValue,
        _ => DeclineCategory::PaymentError,
    }
}

/// Normalize a non-success transaction into the shared decline. Total
/// over every status the reply enum admits.
pub fn classify_decline(reply: &TransactionReply) -> DeclinedError {
    let code = reply.processor_response_code.clone();
    let detail = reply.processor_response_text.clone();
    match reply.status {
        TransactionStatus::ProcessorDeclined => DeclinedError {
            category: code
                .as_deref()
                .map_or(DeclineCategory::CardError, category_for_processor_code),
            class: ResponseClass::NotAuthorized,
            code,
            detail,
        },
        TransactionStatus::GatewayRejected => DeclinedError {
            category: category_for_rejection(reply.gateway_rejection_reason.as_deref()),
            class: ResponseClass::Rejected,
            code,
            detail: detail.or_else(|| reply.gateway_rejection_reason.clone()),
        },
        TransactionStatus::AuthorizationExpired => DeclinedError {
            category: DeclineCategory::GatewayTokenExpired,
            class: ResponseClass::Invalid,
            code,
            detail,
        },
        _ => DeclinedError {
            category: DeclineCategory::PaymentError,
            class: ResponseClass::Error,
            code,
            detail,
        },
    }
}

/// Decline for a reply that carried no transaction at all, only a
/// validation message.
pub fn validation_decline(message: Option<String>) -> DeclinedError {
    DeclinedError {
        category: DeclineCategory::PaymentError,
        class: ResponseClass::Invalid,
        code: None,
        detail: message,
    }
}

/// AVS/CVV response letter to the shared check model. Total.
pub fn check_from_letter(letter: Option<&str>) -> CheckStatus {
    match letter {
        None => CheckStatus::Missing,
        Some("M") => CheckStatus::Passed,
        Some("N") => CheckStatus::Failed,
        Some("I") => CheckStatus::Missing,
        Some(_) => CheckStatus::NotChecked,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use cards::{CardExpiration, CardSecurityCode};
    use masking::StrongSecret;

    use super::*;
    use crate::{
        order::Address,
        types::{CardBrand, Currency, MinorUnit},
    };

    fn config() -> BraintreeConfig {
        BraintreeConfig {
            merchant_id: Secret::from("merchant-42"),
            public_key: Secret::from("pub"),
            private_key: Secret::from("priv"),
            mode: Mode::Sandbox,
        }
    }

    fn order() -> Order {
        Order::new(
            "order-11",
            MinorUnit::new(7500),
            Currency::USD,
            Address {
                line1: "1 Main St".to_string(),
                line2: None,
                city: "Springfield".to_string(),
                provstate: Some("IL".to_string()),
                postal_code: Some("62704".to_string()),
                country: "United States of America".to_string(),
            },
        )
    }

    fn card() -> CardCredentials {
        CardCredentials {
            number: CardNumber::from_str("4242424242424242").expect("valid number"),
            expiration: CardExpiration::new(StrongSecret::new(12), StrongSecret::new(2029))
                .expect("valid expiry"),
            security_code: Some(
                CardSecurityCode::new(StrongSecret::new(321)).expect("valid code"),
            ),
            holder_name: Secret::from("Ada Lovelace"),
            brand: CardBrand::Visa,
            issue_data: None,
        }
    }

    #[test]
    fn base_url_follows_mode() {
        assert_eq!(
            config().base_url(),
            "https://api.sandbox.braintreegateway.com/merchants/merchant-42"
        );
        let live = BraintreeConfig {
            mode: Mode::Live,
            ..config()
        };
        assert!(live.base_url().starts_with("https://api.braintreegateway.com/"));
    }

    #[test]
    fn sale_request_serializes_the_documented_shape() {
        let request = SaleRequest::new(&order(), &card(), "order-11-abc", true);
        let body = serde_json::to_value(&request).expect("serializable");
        let tx = &body["transaction"];
        assert_eq!(tx["type"], "sale");
        assert_eq!(tx["amount"], "75.00");
        assert_eq!(tx["options"]["submit_for_settlement"], true);
        assert_eq!(tx["credit_card"]["expiration_month"], "12");
        assert_eq!(tx["credit_card"]["expiration_year"], "2029");
        assert_eq!(tx["billing"]["postal_code"], "62704");
    }

    #[test]
    fn processor_codes_map_to_categories() {
        assert_eq!(
            category_for_processor_code("2004"),
            DeclineCategory::CardExpired
        );
        assert_eq!(
            category_for_processor_code("2005"),
            DeclineCategory::CardNotValid
        );
        assert_eq!(
            category_for_processor_code("2010"),
            DeclineCategory::CardVerificationValue
        );
        assert_eq!(
            category_for_processor_code("2060"),
            DeclineCategory::AddressMismatch
        );
        assert_eq!(
            category_for_processor_code("2099"),
            DeclineCategory::CardError
        );
    }

    #[test]
    fn expired_authorization_is_its_own_category() {
        let reply: TransactionResponse = serde_json::from_str(
            r#"{"transaction": {"id": "tx9", "status": "authorization_expired"}}"#,
        )
        .expect("deserializable");
        let transaction = reply.transaction.expect("transaction present");
        assert!(!transaction.status.is_success());
        let declined = classify_decline(&transaction);
        assert_eq!(declined.category, DeclineCategory::GatewayTokenExpired);
        assert_eq!(declined.class, ResponseClass::Invalid);
    }

    #[test]
    fn gateway_rejection_reason_drives_the_category() {
        let reply: TransactionResponse = serde_json::from_str(
            r#"{"transaction": {"id": "tx9", "status": "gateway_rejected", "gateway_rejection_reason": "cvv"}}"#,
        )
        .expect("deserializable");
        let declined = classify_decline(&reply.transaction.expect("transaction present"));
        assert_eq!(declined.category, DeclineCategory::CardVerificationValue);
        assert_eq!(declined.class, ResponseClass::Rejected);
    }

    #[test]
    fn check_letters_map_totally() {
        assert_eq!(check_from_letter(Some("M")), CheckStatus::Passed);
        assert_eq!(check_from_letter(Some("N")), CheckStatus::Failed);
        assert_eq!(check_from_letter(Some("I")), CheckStatus::Missing);
        assert_eq!(check_from_letter(Some("U")), CheckStatus::NotChecked);
        assert_eq!(check_from_letter(None), CheckStatus::Missing);
    }
}
