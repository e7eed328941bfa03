//! Shared error taxonomy.
//!
//! Five families, matching what a caller can act on: configuration
//! (fatal at construction), unsupported flow (fatal for the call),
//! protocol (builder/parser bug), transport (retryable with a fresh
//! merchant transaction code) and a normalized gateway decline. Raw card
//! data never reaches an error message; gateway detail strings are kept
//! for operator logs only.

/// Type alias for `Result` with an [`error_stack::Report`] error.
pub type CustomResult<T, E> = error_stack::Result<T, E>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("missing or invalid connector configuration: {config}")]
    InvalidConnectorConfig { config: &'static str },
    #[error("{flow} flow not supported by {connector} connector")]
    FlowNotSupported {
        flow: &'static str,
        connector: &'static str,
    },
    #[error("missing required field: {field_name}")]
    MissingRequiredField { field_name: &'static str },
    #[error("failed to encode connector request")]
    RequestEncodingFailed,
    #[error("failed to deserialize connector response")]
    ResponseDeserializationFailed,
    #[error("the connector returned an unexpected response schema: {detail}")]
    UnexpectedResponseSchema { detail: String },
    #[error("transport failure while calling the gateway")]
    TransportFailure,
    #[error("the gateway replied with a non-protocol document")]
    UnexpectedContentType,
    #[error("transaction is not in a state that permits the {flow} flow")]
    InvalidTransactionState { flow: &'static str },
    #[error("refund amount must be positive")]
    InvalidRefundAmount,
    #[error("refund amount {requested} exceeds the refundable amount {available}")]
    RefundAmountExceedsAvailable {
        requested: String,
        available: String,
    },
    #[error(transparent)]
    Declined(#[from] DeclinedError),
}

/// A normalized gateway decline.
///
/// `category` is the only part meant for the end customer; `class`, `code`
/// and `detail` are operator-facing diagnostics preserved from the reply.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("gateway declined the request: {category}")]
pub struct DeclinedError {
    pub category: DeclineCategory,
    pub class: ResponseClass,
    pub code: Option<String>,
    pub detail: Option<String>,
}

/// User-actionable decline categories. Every driver maps its own code set
/// onto these; unknown codes fall back to `CardError` or `PaymentError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeclineCategory {
    CardNotValid,
    CardExpired,
    CardType,
    AddressMismatch,
    PostalCodeMismatch,
    CardVerificationValue,
    CardError,
    PaymentError,
    GatewayTokenExpired,
}

/// Top-level classification of a gateway reply that did not authorize.
///
/// `Malformed` and `Invalid` point at the request we built, `Error` at the
/// gateway, `NotAuthorized` at the issuing bank and `Rejected` at a
/// merchant rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ResponseClass {
    Malformed,
    Invalid,
    Error,
    NotAuthorized,
    Rejected,
}
