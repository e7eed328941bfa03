//! Authorize.net driver: JSON envelopes against the `createTransactionRequest`
//! API, auth/capture lifecycle and masked-pane refunds.

pub mod transformers;

use error_stack::ResultExt;
use masking::Secret;

use self::transformers as authorizedotnet;
use crate::{
    connector::{mint_transaction_code, Connector, ConnectorParams},
    errors::{ConnectorError, CustomResult},
    order::Order,
    transport::{ensure_protocol_response, HttpTransport, RequestBuilder, RequestContent, Transport},
    types::{CardCredentials, MinorUnit, Mode, RequestType, Transaction},
};

pub struct Authorizedotnet {
    config: authorizedotnet::AuthorizedotnetConfig,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Authorizedotnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizedotnet")
            .field("login_id", &self.config.login_id)
            .field("mode", &self.config.mode)
            .finish_non_exhaustive()
    }
}

impl Authorizedotnet {
    pub fn from_params(params: &ConnectorParams) -> CustomResult<Self, ConnectorError> {
        let config = authorizedotnet::AuthorizedotnetConfig {
            login_id: params.require("login_id")?,
            transaction_key: params.require("transaction_key")?,
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

    fn exchange(
        &self,
        request: &authorizedotnet::PaymentsRequest,
    ) -> CustomResult<authorizedotnet::PaymentsResponse, ConnectorError> {
        let body =
            serde_json::to_string(request).change_context(ConnectorError::RequestEncodingFailed)?;
        let http_request = RequestBuilder::new()
            .url(authorizedotnet::endpoint(self.config.mode))
            .set_body(RequestContent::Json(body))
            .build();

        let reply = self.transport.send(http_request)?;
        ensure_protocol_response(&reply)?;
        // Replies open with a UTF-8 byte order mark.
        serde_json::from_str(reply.body.trim_start_matches('\u{feff}'))
            .change_context(ConnectorError::ResponseDeserializationFailed)
    }

    fn charge(
        &self,
        order: &Order,
        card: &CardCredentials,
        transaction_type: authorizedotnet::TransactionType,
        amount: MinorUnit,
        request_type: RequestType,
    ) -> CustomResult<Transaction, ConnectorError> {
        let ref_id = mint_transaction_code(&order.id);
        let request = authorizedotnet::PaymentsRequest::charge(
            &self.config,
            order,
            card,
            transaction_type,
            amount,
            &ref_id,
        );

        let reply = self.exchange(&request)?;
        if !reply.is_approved() {
            return Err(ConnectorError::Declined(reply.decline()).into());
        }

        let mut transaction = Transaction::new(
            request_type,
            &order.id,
            ref_id,
            amount,
            order.currency,
        );
        transaction.gateway_transaction_id = Some(
            reply
                .transaction_id()
                .ok_or(ConnectorError::UnexpectedResponseSchema {
                    detail: "approved reply without a transaction id".to_string(),
                })?
                .to_string(),
        );
        if let Some(details) = reply.transaction_response.as_ref() {
            transaction.authorization_code = details.auth_code.clone().map(Secret::new);
            let (address, postal_code) =
                authorizedotnet::avs_statuses(details.avs_result_code.as_deref());
            transaction.address_status = address;
            transaction.postal_code_status = postal_code;
            transaction.card_verification_value_status =
                authorizedotnet::cvv_status(details.cvv_result_code.as_deref());
            transaction.masked_card_number = details
                .account_number
                .clone()
                .or_else(|| Some(format!("XXXX{}", card.number.get_last4())));
        }
        Ok(transaction)
    }

    fn reference_call(
        &self,
        transaction: &Transaction,
        transaction_type: authorizedotnet::TransactionType,
        amount: Option<MinorUnit>,
        payment: Option<authorizedotnet::PaymentDetails>,
        result_type: RequestType,
        flow: &'static str,
    ) -> CustomResult<Transaction, ConnectorError> {
        let gateway_transaction_id = transaction
            .gateway_transaction_id
            .as_deref()
            .ok_or(ConnectorError::InvalidTransactionState { flow })?;

        let ref_id = mint_transaction_code(&transaction.order_id);
        let request = authorizedotnet::PaymentsRequest::reference(
            &self.config,
            transaction_type,
            gateway_transaction_id,
            amount,
            payment,
            &ref_id,
        );

        let reply = self.exchange(&request)?;
        if !reply.is_approved() {
            return Err(ConnectorError::Declined(reply.decline()).into());
        }

        let mut result = Transaction::new(
            result_type,
            transaction.order_id.clone(),
            ref_id,
            amount.unwrap_or(transaction.amount),
            transaction.currency,
        );
        result.gateway_transaction_id = reply
            .transaction_id()
            .map(ToString::to_string)
            .or_else(|| Some(gateway_transaction_id.to_string()));
        result.masked_card_number = transaction.masked_card_number.clone();
        Ok(result)
    }
}

impl Connector for Authorizedotnet {
    fn id(&self) -> &'static str {
        "authorizedotnet"
    }

    fn pay(
        &self,
        order: &Order,
        card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        self.charge(
            order,
            card,
            authorizedotnet::TransactionType::Payment,
            order.total,
            RequestType::Pay,
        )
    }

    fn hold(
        &self,
        order: &Order,
        card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        self.charge(
            order,
            card,
            authorizedotnet::TransactionType::Authorization,
            order.total,
            RequestType::Hold,
        )
    }

    /// A zero-amount authorization runs the gateway checks without
    /// reserving funds.
    fn verify(
        &self,
        order: &Order,
        card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        self.charge(
            order,
            card,
            authorizedotnet::TransactionType::Authorization,
            MinorUnit::zero(),
            RequestType::Verify,
        )
    }

    fn release(&self, transaction: &Transaction) -> CustomResult<Transaction, ConnectorError> {
        if transaction.request_type != RequestType::Hold {
            return Err(ConnectorError::InvalidTransactionState { flow: "release" }.into());
        }
        self.reference_call(
            transaction,
            authorizedotnet::TransactionType::Capture,
            Some(transaction.amount),
            None,
            RequestType::Release,
            "release",
        )
    }

    fn void(&self, transaction: &Transaction) -> CustomResult<Transaction, ConnectorError> {
        if !matches!(
            transaction.request_type,
            RequestType::Hold | RequestType::Pay | RequestType::Release
        ) {
            return Err(ConnectorError::InvalidTransactionState { flow: "void" }.into());
        }
        self.reference_call(
            transaction,
            authorizedotnet::TransactionType::Void,
            None,
            None,
            RequestType::Void,
            "void",
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
        let masked_number = transaction
            .masked_card_number
            .as_deref()
            .ok_or(ConnectorError::MissingRequiredField {
                field_name: "masked_card_number",
            })?;

        self.reference_call(
            transaction,
            authorizedotnet::TransactionType::Refund,
            Some(amount),
            Some(authorizedotnet::PaymentDetails::from_masked_number(
                masked_number,
            )),
            RequestType::Refund,
            "refund",
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use cards::{CardExpiration, CardNumber, CardSecurityCode};
    use masking::StrongSecret;

    use super::*;
    use crate::{
        errors::DeclineCategory,
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

    fn driver(bodies: &[&str]) -> Authorizedotnet {
        let params = ConnectorParams::new()
            .insert("login_id", "merchant-login")
            .insert("transaction_key", "merchant-key");
        Authorizedotnet::with_transport(&params, ScriptedTransport::new(bodies))
            .expect("valid params")
    }

    fn order() -> Order {
        Order::new(
            "order-8",
            MinorUnit::new(4200),
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
            expiration: CardExpiration::new(StrongSecret::new(9), StrongSecret::new(2028))
                .expect("valid expiry"),
            security_code: Some(
                CardSecurityCode::new(StrongSecret::new(900)).expect("valid code"),
            ),
            holder_name: masking::Secret::from("Ada Lovelace"),
            brand: CardBrand::Visa,
            issue_data: None,
        }
    }

    const APPROVED: &str = r#"{
        "transactionResponse": {
            "responseCode": "1",
            "authCode": "A1B2C3",
            "avsResultCode": "Y",
            "cvvResultCode": "M",
            "transId": "60123",
            "accountNumber": "XXXX4242"
        },
        "messages": {"resultCode": "Ok", "message": [{"code": "I00001", "text": "Successful."}]}
    }"#;

    #[test]
    fn missing_credentials_are_named() {
        let params = ConnectorParams::new().insert("login_id", "merchant-login");
        let err = Authorizedotnet::from_params(&params).unwrap_err();
        assert_eq!(
            err.current_context(),
            &ConnectorError::InvalidConnectorConfig {
                config: "transaction_key"
            }
        );
    }

    #[test]
    fn pay_success_normalizes_checks() {
        let driver = driver(&[APPROVED]);
        let transaction = driver.pay(&order(), &card()).expect("payment succeeds");
        assert_eq!(transaction.request_type, RequestType::Pay);
        assert_eq!(transaction.gateway_transaction_id.as_deref(), Some("60123"));
        assert_eq!(transaction.address_status, CheckStatus::Passed);
        assert_eq!(transaction.postal_code_status, CheckStatus::Passed);
        assert_eq!(
            transaction.card_verification_value_status,
            CheckStatus::Passed
        );
        assert_eq!(transaction.masked_card_number.as_deref(), Some("XXXX4242"));
    }

    #[test]
    fn bom_prefixed_reply_still_parses() {
        let body = format!("\u{feff}{APPROVED}");
        let driver = driver(&[&body]);
        assert!(driver.pay(&order(), &card()).is_ok());
    }

    #[test]
    fn decline_surfaces_the_documented_category() {
        let driver = driver(&[r#"{
            "transactionResponse": {
                "responseCode": "2",
                "transId": "0",
                "errors": [{"errorCode": "37", "errorText": "The credit card number is invalid."}]
            },
            "messages": {"resultCode": "Error", "message": [{"code": "E00027", "text": "The transaction was unsuccessful."}]}
        }"#]);
        let err = driver.pay(&order(), &card()).unwrap_err();
        match err.current_context() {
            ConnectorError::Declined(declined) => {
                assert_eq!(declined.category, DeclineCategory::CardNotValid);
                assert_eq!(declined.code.as_deref(), Some("37"));
            }
            other => panic!("expected a decline, got {other:?}"),
        }
    }

    #[test]
    fn release_captures_a_prior_hold() {
        let driver = driver(&[APPROVED, APPROVED]);
        let hold = driver.hold(&order(), &card()).expect("hold succeeds");
        assert_eq!(hold.request_type, RequestType::Hold);

        let released = driver.release(&hold).expect("capture succeeds");
        assert_eq!(released.request_type, RequestType::Release);
        assert_eq!(released.amount, hold.amount);
    }

    #[test]
    fn refund_needs_the_masked_pane() {
        let driver = driver(&[]);
        let mut paid = Transaction::new(
            RequestType::Pay,
            "order-8",
            "order-8-x".to_string(),
            MinorUnit::new(4200),
            Currency::USD,
        );
        paid.gateway_transaction_id = Some("60123".to_string());

        let err = driver.refund(&paid, MinorUnit::new(1000)).unwrap_err();
        assert_eq!(
            err.current_context(),
            &ConnectorError::MissingRequiredField {
                field_name: "masked_card_number"
            }
        );
    }

    #[test]
    fn refund_over_captured_amount_fails_locally() {
        let driver = driver(&[]);
        let mut paid = Transaction::new(
            RequestType::Pay,
            "order-8",
            "order-8-x".to_string(),
            MinorUnit::new(4200),
            Currency::USD,
        );
        paid.gateway_transaction_id = Some("60123".to_string());
        paid.masked_card_number = Some("XXXX4242".to_string());

        let err = driver.refund(&paid, MinorUnit::new(9000)).unwrap_err();
        assert_eq!(
            err.current_context(),
            &ConnectorError::RefundAmountExceedsAvailable {
                requested: "90.00".to_string(),
                available: "42.00".to_string(),
            }
        );
    }

    #[test]
    fn three_ds_is_not_supported() {
        let driver = driver(&[]);
        let pending = Transaction::new(
            RequestType::Pay,
            "order-8",
            "order-8-x".to_string(),
            MinorUnit::new(4200),
            Currency::USD,
        );
        let err = driver
            .three_d_secure_auth(pending, masking::Secret::from("pares"))
            .unwrap_err();
        assert_eq!(
            err.current_context(),
            &ConnectorError::FlowNotSupported {
                flow: "three_d_secure_auth",
                connector: "authorizedotnet"
            }
        );
    }
}
