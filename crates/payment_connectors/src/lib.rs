//! Provider-agnostic payment transaction layer.
//!
//! The [`Connector`] trait is the shared lifecycle contract
//! (`pay`/`hold`/`release`/`void`/`refund`/`verify` plus the 3-D Secure
//! continuation); [`connect`] resolves a [`ConnectorKind`] and a validated
//! parameter set into a configured driver. Each driver composes the field
//! codec, its request builder, a blocking transport call, the response
//! parser and its status-normalization tables to turn an [`Order`] plus
//! card credentials into a [`Transaction`].
//!
//! Drivers never persist anything: the returned `Transaction` is owned by
//! the calling checkout workflow.

pub mod codec;
pub mod connector;
pub mod connectors;
pub mod errors;
pub mod order;
pub mod response;
pub mod transport;
pub mod types;

pub use connector::{connect, Connector, ConnectorKind, ConnectorParams};
pub use errors::{ConnectorError, CustomResult, DeclineCategory, DeclinedError, ResponseClass};
pub use order::{Address, Order, OrderItem, OrderPaymentMethod};
pub use types::{
    CardBrand, CardCredentials, CheckStatus, Currency, MinorUnit, Mode, RequestType,
    ThreeDsChallenge, ThreeDsCompletion, Transaction,
};
