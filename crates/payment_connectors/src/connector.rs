//! The shared provider contract and the static driver registry.

use std::collections::HashMap;

use masking::Secret;
use rand::distributions::{Alphanumeric, DistString};

use crate::{
    connectors::{authorizedotnet::Authorizedotnet, braintree::Braintree, protx::Protx},
    errors::{ConnectorError, CustomResult},
    order::Order,
    types::{CardCredentials, MinorUnit, Mode, ThreeDsCompletion, Transaction},
};

const TRANSACTION_CODE_SUFFIX_LENGTH: usize = 10;

/// Mint a fresh merchant transaction code for one gateway attempt. A
/// retry must mint a new code; resending the old one reads as a duplicate
/// at the gateway.
pub fn mint_transaction_code(order_id: &str) -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::thread_rng(), TRANSACTION_CODE_SUFFIX_LENGTH);
    format!("{order_id}-{suffix}")
}

/// The provider contract every gateway driver implements.
///
/// Default method bodies fail with the uniform unsupported-flow error
/// naming the driver and the operation; a driver only overrides what its
/// gateway actually supports. Configuration is immutable after
/// construction except for the explicit [`Connector::set_avs_mode`]
/// toggle.
///
/// `Debug` is a supertrait so `Box<dyn Connector>` can appear in test
/// assertions; driver impls show only their redacted config, never the
/// transport.
pub trait Connector: std::fmt::Debug {
    /// Stable driver identifier, as used by the factory.
    fn id(&self) -> &'static str;

    /// Authorize and capture in one step.
    fn pay(
        &self,
        _order: &Order,
        _card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        Err(self.flow_not_supported("pay"))
    }

    /// Authorize only; funds are reserved until released or voided.
    fn hold(
        &self,
        _order: &Order,
        _card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        Err(self.flow_not_supported("hold"))
    }

    /// Capture a prior hold.
    fn release(&self, _transaction: &Transaction) -> CustomResult<Transaction, ConnectorError> {
        Err(self.flow_not_supported("release"))
    }

    /// Cancel before settlement. Illegal after settlement.
    fn void(&self, _transaction: &Transaction) -> CustomResult<Transaction, ConnectorError> {
        Err(self.flow_not_supported("void"))
    }

    /// Credit after settlement. The amount is explicit and validated
    /// locally against the captured amount and the driver's ceiling
    /// before any network call.
    fn refund(
        &self,
        _transaction: &Transaction,
        _amount: MinorUnit,
    ) -> CustomResult<Transaction, ConnectorError> {
        Err(self.flow_not_supported("refund"))
    }

    /// Run fraud checks without moving money.
    fn verify(
        &self,
        _order: &Order,
        _card: &CardCredentials,
    ) -> CustomResult<Transaction, ConnectorError> {
        Err(self.flow_not_supported("verify"))
    }

    /// Resolve a pending 3-D Secure challenge with the issuer's response
    /// blob. Consumes the pending transaction and returns it rewritten
    /// alongside the final transaction of the originally requested type.
    fn three_d_secure_auth(
        &self,
        _pending: Transaction,
        _acs_response: Secret<String>,
    ) -> CustomResult<ThreeDsCompletion, ConnectorError> {
        Err(self.flow_not_supported("three_d_secure_auth"))
    }

    /// Toggle whether address/postal-code/CVV checks are mandatory,
    /// which widens or narrows the required request fields.
    fn set_avs_mode(&mut self, _enforce: bool) -> CustomResult<(), ConnectorError> {
        Err(self.flow_not_supported("set_avs_mode"))
    }

    #[doc(hidden)]
    fn flow_not_supported(&self, flow: &'static str) -> error_stack::Report<ConnectorError> {
        ConnectorError::FlowNotSupported {
            flow,
            connector: self.id(),
        }
        .into()
    }
}

/// Closed driver registry. Adding a gateway means adding a variant and a
/// constructor arm; there is no runtime lookup by type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectorKind {
    Protx,
    Authorizedotnet,
    Braintree,
}

/// Validated construction parameters for one driver.
///
/// Values are held as secrets; reading a key the driver requires raises a
/// configuration error naming it.
#[derive(Default)]
pub struct ConnectorParams {
    values: HashMap<String, Secret<String>>,
}

impl ConnectorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, key: &str, value: impl Into<Secret<String>>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// A key the driver cannot run without.
    pub fn require(&self, key: &'static str) -> CustomResult<Secret<String>, ConnectorError> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ConnectorError::InvalidConnectorConfig { config: key }.into())
    }

    pub fn get(&self, key: &str) -> Option<Secret<String>> {
        self.values.get(key).cloned()
    }

    /// The endpoint mode, restricted to what the driver supports and
    /// defaulting to its safest non-production mode.
    pub fn mode(
        &self,
        default: Mode,
        supported: &[Mode],
    ) -> CustomResult<Mode, ConnectorError> {
        use masking::PeekInterface;

        let mode = match self.values.get("mode") {
            None => default,
            Some(raw) => raw
                .peek()
                .parse::<Mode>()
                .map_err(|_| ConnectorError::InvalidConnectorConfig { config: "mode" })?,
        };
        if supported.contains(&mode) {
            Ok(mode)
        } else {
            Err(ConnectorError::InvalidConnectorConfig { config: "mode" }.into())
        }
    }
}

impl FromIterator<(String, String)> for ConnectorParams {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key, Secret::new(value)))
                .collect(),
        }
    }
}

/// Resolve a driver identifier to a configured instance. Construction
/// validates parameters and performs no network I/O.
pub fn connect(
    kind: ConnectorKind,
    params: ConnectorParams,
) -> CustomResult<Box<dyn Connector>, ConnectorError> {
    Ok(match kind {
        ConnectorKind::Protx => Box::new(Protx::from_params(&params)?),
        ConnectorKind::Authorizedotnet => Box::new(Authorizedotnet::from_params(&params)?),
        ConnectorKind::Braintree => Box::new(Braintree::from_params(&params)?),
    })
}
