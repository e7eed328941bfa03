//! Braintree driver: REST JSON over basic auth, sale/settlement
//! lifecycle and standalone card verification.

pub mod transformers;

use error_stack::ResultExt;
use masking::Secret;
use serde::Serialize;

use self::transformers as braintree;
use crate::{
    connector::{mint_transaction_code, Connector, ConnectorParams},
    errors::{ConnectorError, CustomResult},
    order::Order,
    transport::{
        ensure_protocol_response, HttpTransport, Method, RequestBuilder, RequestContent, Transport,
    },
    types::{CardCredentials, MinorUnit, Mode, RequestType, Transaction},
};

pub struct Braintree {
    config: braintree::BraintreeConfig,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Braintree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Braintree")
            .field("merchant_id", &self.config.merchant_id)
            .field("mode", &self.config.mode)
            .finish_non_exhaustive()
    }
}

impl Braintree {
    pub fn from_params(params: &ConnectorParams) -> CustomResult<Self, ConnectorError> {
        let config = braintree::BraintreeConfig {
            merchant_id: params.require("merchant_id")?,
            public_key: params.require("public_key")?,
            private_key: params.require("private_key")?,
            mode: params.mode(Mode::Sandbox, &[Mode::Live, Mode::Sandbox])?,
        };
        Ok(Self {
            config,
            transport: Box::new(HttpTransport::new()?),
        })
    }

    /// Same driver over a caller-supplied transport. Used by tests to
    /// script the gateway.
    pub fn with_transport(
        params: &ConnectorParams,
        transport: Box<dyn Transport>,
    ) -> CustomResult<Self, ConnectorError> {
        let mut driver = Self::from_params(params)?;
        driver.transport = transport;
        Ok(driver)
    }

    fn exchange<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> CustomResult<R, ConnectorError> {
        let mut builder = RequestBuilder::new()
            .method(method)
            .url(&format!("{}{path}", self.config.base_url()))
            .header("Authorization", self.config.authorization_header())
            .header("Accept", "application/json".into());
        if let Some(body) = body {
            let encoded = serde_json::to_string(body)
                .change_context(ConnectorError::RequestEncodingFailed)?;
            builder = builder.set_body(RequestContent::Json(encoded));
        }

        let reply = self.transport.send(builder.build())?;
        ensure_protocol_response(&reply)?;
        serde_json::from_str(&reply.body)
            .change_context(ConnectorError::ResponseDeserializationFailed)
    }

    fn transaction_from_reply(
        &self,
        reply: braintree::TransactionResponse,
        request_type: RequestType,
        order_id: &str,
        merchant_transaction_code: String,
        amount: MinorUnit,
        currency: crate::types::Currency,
    ) -> CustomResult<Transaction, ConnectorError> {
        let gateway = match reply.transaction {
            Some(transaction) => transaction,
            None => {
                return Err(ConnectorError::Declined(braintree::validation_decline(
                    reply.message,
                ))
                .into())
            }
        };
        if !gateway.status.is_success() {
            return Err(ConnectorError::Declined(braintree::classify_decline(&gateway)).into());
        }

        let mut transaction = Transaction::new(
            request_type,
            order_id,
            merchant_transaction_code,
            amount,
            currency,
        );
        transaction.gateway_transaction_id = Some(gateway.id.clone());
        transaction.authorization_code = gateway
            .processor_authorization_code
            .clone()
            .map(Secret::new);
        transaction.address_status =
            braintree::check_from_letter(gateway.avs_street_address_response_code.as_deref());
        transaction.postal_code_status =
            braintree::check_from_letter(gateway.avs_postal_code_response_code.as_deref());
        transaction.card_verification_value_status =
            braintree::check_from_letter(gateway.cvv_response_code.as_deref());
        transaction.masked_card_number = gateway
            .credit_card
            .as_ref()
            .and_then(|card| card.last_four.as_deref())
            .map(|last_four| format!("XXXX{last_four}"));
        Ok(transaction)
    }

    fn sale(
        &self,
        order: &Order,
        card: &CardCredentials,
        submit_for_settlement: bool,
        request_type: RequestType,
    ) -> CustomResult<Transaction, ConnectorError> {
        let code = mint_transaction_code(&order.id);
        let request = braintree::SaleRequest::new(order, card, &code, submit_for_settlement);
        let reply: braintree::TransactionResponse =
            self.exchange(Method::Post, "/transactions", Some(&request))?;
        let mut transaction = self.transaction_from_reply(
            reply,
            request_type,
            &order.id,
            code,
            order.total,
            order.currency,
        )?;
        if transaction.masked_card_number.is_none() {
            transaction.masked_card_number = Some(format!("XXXX{}", card.number.get_last4()));
        }
        Ok(transaction)
    }
}

impl Connector for Braintree {
    fn id(&self) -> &'static str {
        "braintree"
    }

    fn pay(
        &self,
        order: &Order,
        card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        self.sale(order, card, true, RequestType::Pay)
    }

    fn hold(
        &self,
        order: &Order,
        card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        self.sale(order, card, false, RequestType::Hold)
    }

    fn release(&self, transaction: &Transaction) -> CustomResult<Transaction, ConnectorError> {
        if transaction.request_type != RequestType::Hold {
            return Err(ConnectorError::InvalidTransactionState { flow: "release" }.into());
        }
        let id = transaction
            .gateway_transaction_id
            .as_deref()
            .ok_or(ConnectorError::InvalidTransactionState { flow: "release" })?;

        let request = braintree::AmountRequest::new(transaction.amount.to_major_unit_string());
        let reply: braintree::TransactionResponse = self.exchange(
            Method::Put,
            &format!("/transactions/{id}/submit_for_settlement"),
            Some(&request),
        )?;
        self.transaction_from_reply(
            reply,
            RequestType::Release,
            &transaction.order_id,
            transaction.merchant_transaction_code.clone(),
            transaction.amount,
            transaction.currency,
        )
    }

    fn void(&self, transaction: &Transaction) -> CustomResult<Transaction, ConnectorError> {
        if !matches!(
            transaction.request_type,
            RequestType::Hold | RequestType::Pay | RequestType::Release
        ) {
            return Err(ConnectorError::InvalidTransactionState { flow: "void" }.into());
        }
        let id = transaction
            .gateway_transaction_id
            .as_deref()
            .ok_or(ConnectorError::InvalidTransactionState { flow: "void" })?;

        let reply: braintree::TransactionResponse =
            self.exchange::<(), _>(Method::Put, &format!("/transactions/{id}/void"), None)?;
        self.transaction_from_reply(
            reply,
            RequestType::Void,
            &transaction.order_id,
            transaction.merchant_transaction_code.clone(),
            transaction.amount,
            transaction.currency,
        )
    }

    fn refund(
        &self,
        transaction: &Transaction,
        amount: MinorUnit,
    ) -> CustomResult<Transaction, ConnectorError> {
        if !matches!(
            transaction.request_type,
            RequestType::Pay | RequestType::Release
        ) || !transaction.is_complete()
        {
            return Err(ConnectorError::InvalidTransactionState { flow: "refund" }.into());
        }
        if amount <= MinorUnit::zero() {
            return Err(ConnectorError::InvalidRefundAmount.into());
        }
        if amount > transaction.amount {
            return Err(ConnectorError::RefundAmountExceedsAvailable {
                requested: amount.to_major_unit_string(),
                available: transaction.amount.to_major_unit_string(),
            }
            .into());
        }
        let id = transaction
            .gateway_transaction_id
            .as_deref()
            .ok_or(ConnectorError::InvalidTransactionState { flow: "refund" })?;

        let request = braintree::AmountRequest::new(amount.to_major_unit_string());
        let reply: braintree::TransactionResponse = self.exchange(
            Method::Post,
            &format!("/transactions/{id}/refund"),
            Some(&request),
        )?;
        self.transaction_from_reply(
            reply,
            RequestType::Refund,
            &transaction.order_id,
            mint_transaction_code(&transaction.order_id),
            amount,
            transaction.currency,
        )
    }

    /// Standalone card verification: gateway checks without a money
    /// movement.
    fn verify(
        &self,
        order: &Order,
        card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        let request = braintree::VerificationRequest::new(order, card);
        let reply: braintree::VerificationResponse =
            self.exchange(Method::Post, "/verifications", Some(&request))?;

        let verification = match reply.verification {
            Some(verification) => verification,
            None => {
                return Err(ConnectorError::Declined(braintree::validation_decline(
                    reply.message,
                ))
                .into())
            }
        };
        if verification.status != braintree::VerificationStatus::Verified {
            let declined = match verification.status {
                braintree::VerificationStatus::ProcessorDeclined => {
                    crate::errors::DeclinedError {
                        category: verification.processor_response_code.as_deref().map_or(
                            crate::errors::DeclineCategory::CardError,
                            braintree::category_for_processor_code,
                        ),
                        class: crate::errors::ResponseClass::NotAuthorized,
                        code: verification.processor_response_code.clone(),
                        detail: verification.processor_response_text.clone(),
                    }
                }
                _ => braintree::validation_decline(
                    verification
                        .processor_response_text
                        .clone()
                        .or_else(|| verification.gateway_rejection_reason.clone()),
                ),
            };
            return Err(ConnectorError::Declined(declined).into());
        }

        let mut transaction = Transaction::new(
            RequestType::Verify,
            &order.id,
            mint_transaction_code(&order.id),
            MinorUnit::zero(),
            order.currency,
        );
        transaction.gateway_transaction_id = Some(verification.id.clone());
        transaction.address_status = braintree::check_from_letter(
            verification.avs_street_address_response_code.as_deref(),
        );
        transaction.postal_code_status =
            braintree::check_from_letter(verification.avs_postal_code_response_code.as_deref());
        transaction.card_verification_value_status =
            braintree::check_from_letter(verification.cvv_response_code.as_deref());
        transaction.masked_card_number = Some(format!("XXXX{}", card.number.get_last4()));
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use cards::{CardExpiration, CardNumber, CardSecurityCode};
    use masking::StrongSecret;

    use super::*;
    use crate::{
        errors::{DeclineCategory, ResponseClass},
        order::Address,
        transport::{Request, Response},
        types::{CardBrand, CheckStatus, Currency},
    };

    struct ScriptedTransport {
        replies: std::sync::Mutex<std::collections::VecDeque<Response>>,
    }

    impl ScriptedTransport {
        fn new(bodies: &[&str]) -> Box<Self> {
            Box::new(Self {
                replies: std::sync::Mutex::new(
                    bodies
                        .iter()
                        .map(|body| Response {
                            status_code: 200,
                            content_type: Some("application/json".to_string()),
                            body: (*body).to_string(),
                        })
                        .collect(),
                ),
            })
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, _request: Request) -> CustomResult<Response, ConnectorError> {
            self.replies
                .lock()
                .expect("reply queue poisoned")
                .pop_front()
                .ok_or_else(|| ConnectorError::TransportFailure.into())
        }
    }

    fn driver(bodies: &[&str]) -> Braintree {
        let params = ConnectorParams::new()
            .insert("merchant_id", "merchant-42")
            .insert("public_key", "pub")
            .insert("private_key", "priv");
        Braintree::with_transport(&params, ScriptedTransport::new(bodies)).expect("valid params")
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
            holder_name: masking::Secret::from("Ada Lovelace"),
            brand: CardBrand::Visa,
            issue_data: None,
        }
    }

    #[test]
    fn missing_key_is_named() {
        let params = ConnectorParams::new()
            .insert("merchant_id", "merchant-42")
            .insert("public_key", "pub");
        let err = Braintree::from_params(&params).unwrap_err();
        assert_eq!(
            err.current_context(),
            &ConnectorError::InvalidConnectorConfig {
                config: "private_key"
            }
        );
    }

    #[test]
    fn pay_submits_for_settlement() {
        let driver = driver(&[r#"{
            "transaction": {
                "id": "tx-31",
                "status": "submitted_for_settlement",
                "processor_response_code": "1000",
                "processor_authorization_code": "08154",
                "avs_street_address_response_code": "M",
                "avs_postal_code_response_code": "M",
                "cvv_response_code": "M",
                "credit_card": {"last_4": "4242"}
            }
        }"#]);
        let transaction = driver.pay(&order(), &card()).expect("sale succeeds");
        assert_eq!(transaction.request_type, RequestType::Pay);
        assert_eq!(transaction.gateway_transaction_id.as_deref(), Some("tx-31"));
        assert_eq!(transaction.address_status, CheckStatus::Passed);
        assert_eq!(transaction.masked_card_number.as_deref(), Some("XXXX4242"));
    }

    #[test]
    fn processor_decline_maps_the_code() {
        let driver = driver(&[r#"{
            "transaction": {
                "id": "tx-32",
                "status": "processor_declined",
                "processor_response_code": "2060",
                "processor_response_text": "Address Verification Failed"
            }
        }"#]);
        let err = driver.pay(&order(), &card()).unwrap_err();
        match err.current_context() {
            ConnectorError::Declined(declined) => {
                assert_eq!(declined.category, DeclineCategory::AddressMismatch);
                assert_eq!(declined.class, ResponseClass::NotAuthorized);
                assert_eq!(declined.code.as_deref(), Some("2060"));
            }
            other => panic!("expected a decline, got {other:?}"),
        }
    }

    #[test]
    fn hold_then_release_lifecycle() {
        let driver = driver(&[
            r#"{"transaction": {"id": "tx-33", "status": "authorized"}}"#,
            r#"{"transaction": {"id": "tx-33", "status": "submitted_for_settlement"}}"#,
        ]);
        let hold = driver.hold(&order(), &card()).expect("hold succeeds");
        assert_eq!(hold.request_type, RequestType::Hold);

        let released = driver.release(&hold).expect("release succeeds");
        assert_eq!(released.request_type, RequestType::Release);
        assert_eq!(released.gateway_transaction_id.as_deref(), Some("tx-33"));
    }

    #[test]
    fn release_of_a_payment_is_refused_locally() {
        let driver = driver(&[]);
        let mut paid = Transaction::new(
            RequestType::Pay,
            "order-11",
            "order-11-x".to_string(),
            MinorUnit::new(7500),
            Currency::USD,
        );
        paid.gateway_transaction_id = Some("tx-34".to_string());
        let err = driver.release(&paid).unwrap_err();
        assert_eq!(
            err.current_context(),
            &ConnectorError::InvalidTransactionState { flow: "release" }
        );
    }

    #[test]
    fn expired_authorization_surfaces_gateway_token_expired() {
        let driver = driver(&[
            r#"{"transaction": {"id": "tx-35", "status": "authorization_expired"}}"#,
        ]);
        let mut hold = Transaction::new(
            RequestType::Hold,
            "order-11",
            "order-11-y".to_string(),
            MinorUnit::new(7500),
            Currency::USD,
        );
        hold.gateway_transaction_id = Some("tx-35".to_string());

        let err = driver.release(&hold).unwrap_err();
        match err.current_context() {
            ConnectorError::Declined(declined) => {
                assert_eq!(declined.category, DeclineCategory::GatewayTokenExpired);
            }
            other => panic!("expected a decline, got {other:?}"),
        }
    }

    #[test]
    fn verification_passes_without_moving_money() {
        let driver = driver(&[r#"{
            "verification": {
                "id": "ver-1",
                "status": "verified",
                "avs_street_address_response_code": "M",
                "avs_postal_code_response_code": "N",
                "cvv_response_code": "M"
            }
        }"#]);
        let verified = driver.verify(&order(), &card()).expect("verify succeeds");
        assert_eq!(verified.request_type, RequestType::Verify);
        assert_eq!(verified.amount, MinorUnit::zero());
        assert_eq!(verified.postal_code_status, CheckStatus::Failed);
    }

    #[test]
    fn validation_failure_without_transaction_is_a_decline() {
        let driver = driver(&[r#"{"message": "Amount is required."}"#]);
        let err = driver.pay(&order(), &card()).unwrap_err();
        match err.current_context() {
            ConnectorError::Declined(declined) => {
                assert_eq!(declined.class, ResponseClass::Invalid);
                assert_eq!(declined.detail.as_deref(), Some("Amount is required."));
            }
            other => panic!("expected a decline, got {other:?}"),
        }
    }
}
