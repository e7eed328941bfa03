//! Wire types and status normalization for the Authorize.net JSON API.

use cards::CardNumber;
use masking::{PeekInterface, Secret};
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    errors::{DeclineCategory, DeclinedError, ResponseClass},
    order::Order,
    types::{CardCredentials, CheckStatus, MinorUnit, Mode},
};

const NAME_MAX_LENGTH: usize = 50;
const ADDRESS_MAX_LENGTH: usize = 60;

/// Expiry pane sent on refunds, where only the masked number is known.
pub const UNKNOWN_EXPIRY: &str = "XXXX";

pub struct AuthorizedotnetConfig {
    pub login_id: Secret<String>,
    pub transaction_key: Secret<String>,
    pub mode: Mode,
}

pub fn endpoint(mode: Mode) -> &'static str {
    match mode {
        Mode::Live => "https://api.authorize.net/xml/v1/request.api",
        _ => "https://apitest.authorize.net/xml/v1/request.api",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionType {
    #[serde(rename = "authCaptureTransaction")]
    Payment,
    #[serde(rename = "authOnlyTransaction")]
    Authorization,
    #[serde(rename = "priorAuthCaptureTransaction")]
    Capture,
    #[serde(rename = "voidTransaction")]
    Void,
    #[serde(rename = "refundTransaction")]
    Refund,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantAuthentication {
    name: Secret<String>,
    transaction_key: Secret<String>,
}

impl From<&AuthorizedotnetConfig> for MerchantAuthentication {
    fn from(config: &AuthorizedotnetConfig) -> Self {
        Self {
            name: config.login_id.clone(),
            transaction_key: config.transaction_key.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCardDetails {
    card_number: CardNumber,
    expiration_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    card_code: Option<Secret<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedCardDetails {
    card_number: String,
    expiration_date: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum PaymentDetails {
    CreditCard(CardPayment),
    MaskedCreditCard(MaskedCardPayment),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayment {
    credit_card: CreditCardDetails,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedCardPayment {
    credit_card: MaskedCardDetails,
}

impl PaymentDetails {
    pub fn from_card(card: &CardCredentials) -> Self {
        Self::CreditCard(CardPayment {
            credit_card: CreditCardDetails {
                card_number: card.number.clone(),
                expiration_date: card.expiration.yyyy_mm(),
                card_code: card
                    .security_code
                    .as_ref()
                    .map(|code| Secret::new(code.to_digits())),
            },
        })
    }

    /// Refund payment pane: the masked number on record plus a literal
    /// `XXXX` expiry, per the gateway's credit rules.
    pub fn from_masked_number(masked_number: &str) -> Self {
        Self::MaskedCreditCard(MaskedCardPayment {
            credit_card: MaskedCardDetails {
                card_number: masked_number.to_string(),
                expiration_date: UNKNOWN_EXPIRY.to_string(),
            },
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillTo {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<Secret<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<Secret<String>>,
    address: String,
    city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zip: Option<String>,
    country: String,
}

impl BillTo {
    pub fn from_order(order: &Order, card: &CardCredentials) -> Self {
        // The gateway takes a structured name; split the display name at
        // the first space.
        let holder = card.holder_name.peek();
        let (first, last) = match holder.trim().split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (holder.trim().to_string(), String::new()),
        };
        let billing = &order.billing_address;
        Self {
            first_name: (!first.is_empty())
                .then(|| Secret::new(codec::truncate(&first, NAME_MAX_LENGTH))),
            last_name: (!last.is_empty())
                .then(|| Secret::new(codec::truncate(&last, NAME_MAX_LENGTH))),
            address: codec::truncate(&billing.line1, ADDRESS_MAX_LENGTH),
            city: billing.city.clone(),
            state: billing.provstate.clone(),
            zip: billing.postal_code.clone(),
            country: billing.country.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    transaction_type: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment: Option<PaymentDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_trans_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bill_to: Option<BillTo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    merchant_authentication: MerchantAuthentication,
    ref_id: String,
    transaction_request: TransactionRequest,
}

/// Top-level request envelope the gateway expects.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsRequest {
    create_transaction_request: CreateTransactionRequest,
}

impl PaymentsRequest {
    pub fn charge(
        config: &AuthorizedotnetConfig,
        order: &Order,
        card: &CardCredentials,
        transaction_type: TransactionType,
        amount: MinorUnit,
        ref_id: &str,
    ) -> Self {
        Self {
            create_transaction_request: CreateTransactionRequest {
                merchant_authentication: MerchantAuthentication::from(config),
                ref_id: ref_id.to_string(),
                transaction_request: TransactionRequest {
                    transaction_type,
                    amount: Some(amount.to_major_unit_string()),
                    payment: Some(PaymentDetails::from_card(card)),
                    ref_trans_id: None,
                    bill_to: Some(BillTo::from_order(order, card)),
                },
            },
        }
    }

    /// Capture, void or refund against a prior gateway transaction.
    pub fn reference(
        config: &AuthorizedotnetConfig,
        transaction_type: TransactionType,
        gateway_transaction_id: &str,
        amount: Option<MinorUnit>,
        payment: Option<PaymentDetails>,
        ref_id: &str,
    ) -> Self {
        Self {
            create_transaction_request: CreateTransactionRequest {
                merchant_authentication: MerchantAuthentication::from(config),
                ref_id: ref_id.to_string(),
                transaction_request: TransactionRequest {
                    transaction_type,
                    amount: amount.map(|a| a.to_major_unit_string()),
                    payment,
                    ref_trans_id: Some(gateway_transaction_id.to_string()),
                    bill_to: None,
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum ResultCode {
    Ok,
    Error,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    pub code: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessages {
    pub result_code: ResultCode,
    #[serde(default)]
    pub message: Vec<ResponseMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponseError {
    pub error_code: String,
    pub error_text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub response_code: Option<String>,
    pub auth_code: Option<String>,
    pub avs_result_code: Option<String>,
    pub cvv_result_code: Option<String>,
    pub trans_id: Option<String>,
    pub account_number: Option<String>,
    #[serde(default)]
    pub errors: Vec<TransactionResponseError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsResponse {
    pub transaction_response: Option<TransactionResponse>,
    pub messages: ResponseMessages,
}

impl PaymentsResponse {
    /// Whether the gateway approved (or held for manual review, which is
    /// still a usable transaction).
    pub fn is_approved(&self) -> bool {
        self.messages.result_code == ResultCode::Ok
            && self
                .transaction_response
                .as_ref()
                .and_then(|t| t.response_code.as_deref())
                .is_some_and(|code| code == "1" || code == "4")
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_response
            .as_ref()
            .and_then(|t| t.trans_id.as_deref())
            .filter(|id| !id.is_empty() && *id != "0")
    }

    /// Normalize a non-approval into the shared decline. Total: an
    /// unrecognized error code falls back to the generic card category.
    pub fn decline(&self) -> DeclinedError {
        let (code, detail) = self
            .transaction_response
            .as_ref()
            .and_then(|t| t.errors.first())
            .map(|e| (e.error_code.clone(), e.error_text.clone()))
            .or_else(|| {
                self.messages
                    .message
                    .first()
                    .map(|m| (m.code.clone(), m.text.clone()))
            })
            .map_or((None, None), |(code, text)| (Some(code), Some(text)));

        let response_code = self
            .transaction_response
            .as_ref()
            .and_then(|t| t.response_code.as_deref());
        let class = match response_code {
            Some("2") => ResponseClass::NotAuthorized,
            Some("3") | None => ResponseClass::Error,
            Some(_) => ResponseClass::Rejected,
        };

        DeclinedError {
            category: code.as_deref().map_or(DeclineCategory::PaymentError, category_for_code),
            class,
            code,
            detail,
        }
    }
}

/// Gateway error codes to the user-actionable categories.
pub fn category_for_code(code: &str) -> DeclineCategory {
    match code {
        "6" | "37" => DeclineCategory::CardNotValid,
        "7" | "8" => DeclineCategory::CardExpired,
        "17" | "28" => DeclineCategory::CardType,
        "27" => DeclineCategory::AddressMismatch,
        "44" | "65" => DeclineCategory::CardVerificationValue,
        "11" => DeclineCategory::PaymentError,
        _ => DeclineCategory::CardError,
    }
}

/// AVS result letter to (address, postal code) statuses. Total.
pub fn avs_statuses(letter: Option<&str>) -> (CheckStatus, CheckStatus) {
    match letter {
        None => (CheckStatus::Missing, CheckStatus::Missing),
        Some("Y") | Some("X") => (CheckStatus::Passed, CheckStatus::Passed),
        Some("A") => (CheckStatus::Passed, CheckStatus::Failed),
        Some("Z") | Some("W") => (CheckStatus::Failed, CheckStatus::Passed),
        Some("N") => (CheckStatus::Failed, CheckStatus::Failed),
        Some(_) => (CheckStatus::NotChecked, CheckStatus::NotChecked),
    }
}

/// CVV result letter to the shared check model. Total.
pub fn cvv_status(letter: Option<&str>) -> CheckStatus {
    match letter {
        None => CheckStatus::Missing,
        Some("M") => CheckStatus::Passed,
        Some("N") => CheckStatus::Failed,
        Some(_) => CheckStatus::NotChecked,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use cards::{CardExpiration, CardSecurityCode};
    use masking::StrongSecret;

    use super::*;
    use crate::{order::Address, types::CardBrand, types::Currency};

    fn config() -> AuthorizedotnetConfig {
        AuthorizedotnetConfig {
            login_id: Secret::from("merchant-login"),
            transaction_key: Secret::from("merchant-key"),
            mode: Mode::Sandbox,
        }
    }

    fn order() -> Order {
        Order::new(
            "order-5",
            MinorUnit::new(1999),
            Currency::USD,
            Address {
                line1: "1 Main St".to_string(),
                line2: None,
                city: "Springfield".to_string(),
                provstate: Some("IL".to_string()),
                postal_code: Some("62704".to_string()),
                country: "US".to_string(),
            },
        )
    }

    fn card() -> CardCredentials {
        CardCredentials {
            number: CardNumber::from_str("4242424242424242").expect("valid number"),
            expiration: CardExpiration::new(StrongSecret::new(11), StrongSecret::new(2027))
                .expect("valid expiry"),
            security_code: Some(
                CardSecurityCode::new(StrongSecret::new(901)).expect("valid code"),
            ),
            holder_name: Secret::from("Ada Lovelace"),
            brand: CardBrand::Visa,
            issue_data: None,
        }
    }

    #[test]
    fn charge_request_serializes_to_the_documented_envelope() {
        let request = PaymentsRequest::charge(
            &config(),
            &order(),
            &card(),
            TransactionType::Payment,
            MinorUnit::new(1999),
            "order-5-abc",
        );
        let body = serde_json::to_value(&request).expect("serializable");
        let envelope = &body["createTransactionRequest"];
        assert_eq!(envelope["merchantAuthentication"]["name"], "merchant-login");
        let tx = &envelope["transactionRequest"];
        assert_eq!(tx["transactionType"], "authCaptureTransaction");
        assert_eq!(tx["amount"], "19.99");
        assert_eq!(tx["payment"]["creditCard"]["expirationDate"], "2027-11");
        assert_eq!(tx["payment"]["creditCard"]["cardCode"], "901");
        assert_eq!(tx["billTo"]["firstName"], "Ada");
        assert_eq!(tx["billTo"]["lastName"], "Lovelace");
        assert_eq!(tx["billTo"]["zip"], "62704");
    }

    #[test]
    fn refund_request_uses_the_masked_pane() {
        let request = PaymentsRequest::reference(
            &config(),
            TransactionType::Refund,
            "60123",
            Some(MinorUnit::new(500)),
            Some(PaymentDetails::from_masked_number("XXXX4242")),
            "order-5-rf",
        );
        let body = serde_json::to_value(&request).expect("serializable");
        let tx = &body["createTransactionRequest"]["transactionRequest"];
        assert_eq!(tx["transactionType"], "refundTransaction");
        assert_eq!(tx["refTransId"], "60123");
        assert_eq!(tx["payment"]["creditCard"]["cardNumber"], "XXXX4242");
        assert_eq!(tx["payment"]["creditCard"]["expirationDate"], "XXXX");
        assert!(tx.get("billTo").is_none());
    }

    #[test]
    fn approval_detection() {
        let reply: PaymentsResponse = serde_json::from_str(
            r#"{
                "transactionResponse": {
                    "responseCode": "1",
                    "authCode": "ABC123",
                    "avsResultCode": "Y",
                    "cvvResultCode": "M",
                    "transId": "60123",
                    "accountNumber": "XXXX4242"
                },
                "messages": {"resultCode": "Ok", "message": [{"code": "I00001", "text": "Successful."}]}
            }"#,
        )
        .expect("deserializable");
        assert!(reply.is_approved());
        assert_eq!(reply.transaction_id(), Some("60123"));
    }

    #[test]
    fn held_for_review_is_still_approved() {
        let reply: PaymentsResponse = serde_json::from_str(
            r#"{
                "transactionResponse": {"responseCode": "4", "transId": "60124"},
                "messages": {"resultCode": "Ok", "message": []}
            }"#,
        )
        .expect("deserializable");
        assert!(reply.is_approved());
    }

    #[test]
    fn decline_maps_documented_error_codes() {
        assert_eq!(category_for_code("37"), DeclineCategory::CardNotValid);
        assert_eq!(category_for_code("8"), DeclineCategory::CardExpired);
        assert_eq!(category_for_code("27"), DeclineCategory::AddressMismatch);
        assert_eq!(category_for_code("44"), DeclineCategory::CardVerificationValue);
        assert_eq!(category_for_code("65"), DeclineCategory::CardVerificationValue);
        assert_eq!(category_for_code("11"), DeclineCategory::PaymentError);
        assert_eq!(category_for_code("99999"), DeclineCategory::CardError);
    }

    #[test]
    fn decline_carries_class_and_code() {
        let reply: PaymentsResponse = serde_json::from_str(
            r#"{
                "transactionResponse": {
                    "responseCode": "2",
                    "transId": "0",
                    "errors": [{"errorCode": "44", "errorText": "Card code mismatch"}]
                },
                "messages": {"resultCode": "Error", "message": [{"code": "E00027", "text": "Declined"}]}
            }"#,
        )
        .expect("deserializable");
        assert!(!reply.is_approved());
        let declined = reply.decline();
        assert_eq!(declined.category, DeclineCategory::CardVerificationValue);
        assert_eq!(declined.class, ResponseClass::NotAuthorized);
        assert_eq!(declined.code.as_deref(), Some("44"));
    }

    #[test]
    fn avs_letters_map_totally() {
        assert_eq!(
            avs_statuses(Some("Y")),
            (CheckStatus::Passed, CheckStatus::Passed)
        );
        assert_eq!(
            avs_statuses(Some("A")),
            (CheckStatus::Passed, CheckStatus::Failed)
        );
        assert_eq!(
            avs_statuses(Some("Z")),
            (CheckStatus::Failed, CheckStatus::Passed)
        );
        assert_eq!(
            avs_statuses(Some("N")),
            (CheckStatus::Failed, CheckStatus::Failed)
        );
        assert_eq!(
            avs_statuses(Some("G")),
            (CheckStatus::NotChecked, CheckStatus::NotChecked)
        );
        assert_eq!(
            avs_statuses(None),
            (CheckStatus::Missing, CheckStatus::Missing)
        );
        assert_eq!(cvv_status(Some("M")), CheckStatus::Passed);
        assert_eq!(cvv_status(Some("P")), CheckStatus::NotChecked);
        assert_eq!(cvv_status(None), CheckStatus::Missing);
    }
}
