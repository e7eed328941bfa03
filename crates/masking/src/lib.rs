#![forbid(unsafe_code)]
#![warn(missing_docs)]

//!
//! Wrapper types and traits for secret management which ensure secret values
//! cannot be logged or `Debug`-formatted in the clear. Redaction is
//! structural: the wrapper's formatting is redacted, so no call site can
//! forget to mask.
//!

pub use zeroize::Zeroize as ZeroizableSecret;

mod strategy;
pub use strategy::{Strategy, WithType, WithoutType};

mod abs;
pub use abs::{ExposeInterface, ExposeOptionInterface, PeekInterface};

mod secret;
mod strong_secret;
pub use secret::Secret;
pub use strong_secret::StrongSecret;

mod maskable;
pub use maskable::{Mask, Maskable};

mod serde;
pub use crate::serde::SerializableSecret;

/// This module should be included with asterisk.
///
/// `use masking::prelude::*;`
///
pub mod prelude {
    pub use super::{ExposeInterface, ExposeOptionInterface, PeekInterface};
}
