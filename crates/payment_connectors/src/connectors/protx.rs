//! Protx VSP-Direct driver: field-protocol requests over HTTPS, with the
//! deferred/release lifecycle and the two-phase 3-D Secure handshake.

pub mod transformers;

use masking::{PeekInterface, Secret};

use self::transformers as protx;
use crate::{
    connector::{mint_transaction_code, Connector, ConnectorParams},
    errors::{ConnectorError, CustomResult},
    order::Order,
    response::FieldResponse,
    transport::{ensure_protocol_response, HttpTransport, RequestBuilder, RequestContent, Transport},
    types::{
        CardCredentials, MinorUnit, Mode, RequestType, ThreeDsChallenge, ThreeDsCompletion,
        Transaction,
    },
};

pub struct Protx {
    config: protx::ProtxConfig,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Protx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protx")
            .field("vendor", &self.config.vendor)
            .field("mode", &self.config.mode)
            .field("enforce_avs", &self.config.enforce_avs)
            .finish_non_exhaustive()
    }
}

impl Protx {
    pub fn from_params(params: &ConnectorParams) -> CustomResult<Self, ConnectorError> {
        let config = protx::ProtxConfig {
            vendor: params.require("vendor")?,
            description: params.get("description").map(|d| d.peek().clone()),
            mode: params.mode(Mode::Simulator, &[Mode::Live, Mode::Test, Mode::Simulator])?,
            enforce_avs: false,
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
        tx_type: protx::TxType,
        fields: &protx::FieldMap,
    ) -> CustomResult<FieldResponse, ConnectorError> {
        let body = fields.encode()?;
        let request = RequestBuilder::new()
            .url(&protx::endpoint(self.config.mode, tx_type))
            .set_body(RequestContent::FormUrlEncoded(body))
            .build();

        let reply = self.transport.send(request)?;
        ensure_protocol_response(&reply)?;
        Ok(FieldResponse::parse(&reply.body))
    }

    fn reply_status(reply: &FieldResponse) -> CustomResult<protx::ProtxStatus, ConnectorError> {
        let word = reply.require_field("Status")?;
        protx::ProtxStatus::parse(word).ok_or_else(|| {
            ConnectorError::UnexpectedResponseSchema {
                detail: format!("unknown status word {word}"),
            }
            .into()
        })
    }

    /// Register-style call shared by pay, hold and verify.
    fn register(
        &self,
        order: &Order,
        card: &CardCredentials,
        tx_type: protx::TxType,
        request_type: RequestType,
    ) -> CustomResult<Transaction, ConnectorError> {
        let vendor_tx_code = mint_transaction_code(&order.id);
        let fields =
            protx::build_payment_request(&self.config, order, card, tx_type, &vendor_tx_code);
        let required = protx::payment_required_fields(card.brand, self.config.enforce_avs);
        fields.ensure_required(&required)?;

        let mut transaction = Transaction::new(
            request_type,
            &order.id,
            vendor_tx_code,
            order.total,
            order.currency,
        );
        transaction.masked_card_number = Some(format!("XXXX{}", card.number.get_last4()));

        let reply = self.exchange(tx_type, &fields)?;
        let status = Self::reply_status(&reply)?;

        if status == protx::ProtxStatus::ThreeDsAuth {
            transaction.continuation = Some(ThreeDsChallenge {
                merchant_data: Secret::from(reply.require_field("MD")?),
                acs_url: reply.require_field("ACSURL")?.to_string(),
                payload: Secret::from(reply.require_field("PAReq")?),
            });
            return Ok(transaction);
        }
        if status.is_success() {
            return protx::transaction_from_response(transaction, &reply);
        }
        Err(ConnectorError::Declined(protx::classify_failure(
            status,
            reply.get_field("StatusDetail"),
        ))
        .into())
    }

    /// Release/abort/void call referencing a prior hold or payment.
    fn reference_call(
        &self,
        transaction: &Transaction,
        tx_type: protx::TxType,
        result_type: RequestType,
        flow: &'static str,
    ) -> CustomResult<Transaction, ConnectorError> {
        if !transaction.is_complete() {
            return Err(ConnectorError::InvalidTransactionState { flow }.into());
        }

        let fields = protx::build_reference_request(&self.config, transaction, tx_type);
        fields.ensure_required(protx::RELEASE_REQUIRED_FIELDS)?;

        let reply = self.exchange(tx_type, &fields)?;
        let status = Self::reply_status(&reply)?;
        if status.is_success() {
            let mut result = transaction.clone();
            result.request_type = result_type;
            return Ok(result);
        }
        Err(ConnectorError::Declined(protx::classify_failure(
            status,
            reply.get_field("StatusDetail"),
        ))
        .into())
    }
}

impl Connector for Protx {
    fn id(&self) -> &'static str {
        "protx"
    }

    fn pay(
        &self,
        order: &Order,
        card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        self.register(order, card, protx::TxType::Payment, RequestType::Pay)
    }

    fn hold(
        &self,
        order: &Order,
        card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        self.register(order, card, protx::TxType::Deferred, RequestType::Hold)
    }

    fn verify(
        &self,
        order: &Order,
        card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        self.register(order, card, protx::TxType::Authenticate, RequestType::Verify)
    }

    fn release(&self, transaction: &Transaction) -> CustomResult<Transaction, ConnectorError> {
        if transaction.request_type != RequestType::Hold {
            return Err(ConnectorError::InvalidTransactionState { flow: "release" }.into());
        }
        self.reference_call(
            transaction,
            protx::TxType::Release,
            RequestType::Release,
            "release",
        )
    }

    fn void(&self, transaction: &Transaction) -> CustomResult<Transaction, ConnectorError> {
        // An unreleased hold is aborted; a captured payment is voided
        // before settlement.
        let tx_type = match transaction.request_type {
            RequestType::Hold => protx::TxType::Abort,
            RequestType::Pay | RequestType::Release => protx::TxType::Void,
            _ => return Err(ConnectorError::InvalidTransactionState { flow: "void" }.into()),
        };
        self.reference_call(transaction, tx_type, RequestType::Void, "void")
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
        let available = transaction.amount.min(protx::REFUND_CEILING);
        if amount > available {
            return Err(ConnectorError::RefundAmountExceedsAvailable {
                requested: amount.to_major_unit_string(),
                available: available.to_major_unit_string(),
            }
            .into());
        }

        let vendor_tx_code = mint_transaction_code(&transaction.order_id);
        let fields =
            protx::build_refund_request(&self.config, transaction, amount, &vendor_tx_code);
        fields.ensure_required(protx::REFUND_REQUIRED_FIELDS)?;

        let reply = self.exchange(protx::TxType::Refund, &fields)?;
        let status = Self::reply_status(&reply)?;
        if status.is_success() {
            let mut refund = Transaction::new(
                RequestType::Refund,
                transaction.order_id.clone(),
                vendor_tx_code,
                amount,
                transaction.currency,
            );
            refund.gateway_transaction_id =
                Some(reply.require_field("VPSTxId")?.to_string());
            refund.authorization_code = reply.get_field("TxAuthNo").map(Secret::from);
            refund.masked_card_number = transaction.masked_card_number.clone();
            return Ok(refund);
        }
        Err(ConnectorError::Declined(protx::classify_failure(
            status,
            reply.get_field("StatusDetail"),
        ))
        .into())
    }

    fn three_d_secure_auth(
        &self,
        pending: Transaction,
        acs_response: Secret<String>,
    ) -> CustomResult<ThreeDsCompletion, ConnectorError> {
        let challenge = pending.continuation.clone().ok_or_else(|| {
            error_stack::Report::new(ConnectorError::InvalidTransactionState {
                flow: "three_d_secure_auth",
            })
        })?;

        let fields = protx::build_three_ds_request(&challenge.merchant_data, &acs_response);
        fields.ensure_required(protx::THREE_DS_REQUIRED_FIELDS)?;

        let reply = self.exchange(protx::TxType::ThreeDsCallback, &fields)?;
        let status = Self::reply_status(&reply)?;

        let mut superseded = pending.clone();
        superseded.request_type = RequestType::ThreeDSecureAuth;
        superseded.continuation = None;

        if status.is_success() {
            let transaction = protx::transaction_from_response(pending, &reply)?;
            return Ok(ThreeDsCompletion {
                superseded,
                transaction,
            });
        }
        Err(ConnectorError::Declined(protx::classify_failure(
            status,
            reply.get_field("StatusDetail"),
        ))
        .into())
    }

    fn set_avs_mode(&mut self, enforce: bool) -> CustomResult<(), ConnectorError> {
        self.config.enforce_avs = enforce;
        Ok(())
    }
}
