pub mod authorizedotnet;
pub mod braintree;
pub mod protx;

pub use self::{authorizedotnet::Authorizedotnet, braintree::Braintree, protx::Protx};
