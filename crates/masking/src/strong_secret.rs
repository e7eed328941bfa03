//!
//! Strong secret of a given type, which is zeroized on drop.
//!

use std::{fmt, marker::PhantomData};

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{strategy::Strategy, PeekInterface};

/// Secret that is wiped from memory when dropped. Equality checks run in
/// constant time.
pub struct StrongSecret<S: Zeroize, I = crate::WithType>
where
    I: Strategy<S>,
{
    pub(crate) inner_secret: S,
    pub(crate) marker: PhantomData<I>,
}

impl<S: Zeroize, I> StrongSecret<S, I>
where
    I: Strategy<S>,
{
    /// Take ownership of a secret value
    pub fn new(secret: S) -> Self {
        Self {
            inner_secret: secret,
            marker: PhantomData,
        }
    }
}

impl<S: Zeroize, I> PeekInterface<S> for StrongSecret<S, I>
where
    I: Strategy<S>,
{
    fn peek(&self) -> &S {
        &self.inner_secret
    }
}

impl<S: Zeroize, I> crate::ExposeInterface<S> for StrongSecret<S, I>
where
    S: Clone,
    I: Strategy<S>,
{
    fn expose(self) -> S {
        self.inner_secret.clone()
    }
}

impl<S: Zeroize, I> From<S> for StrongSecret<S, I>
where
    I: Strategy<S>,
{
    fn from(secret: S) -> Self {
        Self::new(secret)
    }
}

impl<I> From<&str> for StrongSecret<String, I>
where
    I: Strategy<String>,
{
    fn from(secret: &str) -> Self {
        Self::new(secret.to_owned())
    }
}

impl<I> std::str::FromStr for StrongSecret<String, I>
where
    I: Strategy<String>,
{
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.to_string()))
    }
}

impl<S: Clone + Zeroize, I> Clone for StrongSecret<S, I>
where
    I: Strategy<S>,
{
    fn clone(&self) -> Self {
        Self::new(self.inner_secret.clone())
    }
}

impl<S: Zeroize, I> PartialEq for StrongSecret<S, I>
where
    S: StrongEq,
    I: Strategy<S>,
{
    fn eq(&self, other: &Self) -> bool {
        StrongEq::strong_eq(self.peek(), other.peek())
    }
}

impl<S: Zeroize, I> Eq for StrongSecret<S, I>
where
    S: StrongEq,
    I: Strategy<S>,
{
}

impl<S: Zeroize, I> fmt::Debug for StrongSecret<S, I>
where
    I: Strategy<S>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        I::fmt(&self.inner_secret, f)
    }
}

impl<S: Zeroize, I> Default for StrongSecret<S, I>
where
    S: Zeroize + Default,
    I: Strategy<S>,
{
    fn default() -> Self {
        S::default().into()
    }
}

impl<S: Zeroize, I> Drop for StrongSecret<S, I>
where
    I: Strategy<S>,
{
    fn drop(&mut self) {
        self.inner_secret.zeroize();
    }
}

impl<S: Zeroize, I> ZeroizeOnDrop for StrongSecret<S, I> where I: Strategy<S> {}

/// Constant-time comparison for the inner secret type.
pub trait StrongEq {
    /// Compare without early exit.
    fn strong_eq(&self, other: &Self) -> bool;
}

impl StrongEq for String {
    fn strong_eq(&self, other: &Self) -> bool {
        bool::from(self.as_bytes().ct_eq(other.as_bytes()))
    }
}

impl StrongEq for u8 {
    fn strong_eq(&self, other: &Self) -> bool {
        bool::from(self.ct_eq(other))
    }
}

impl StrongEq for u16 {
    fn strong_eq(&self, other: &Self) -> bool {
        bool::from(self.ct_eq(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let secret: StrongSecret<String> = StrongSecret::new("4242424242424242".to_string());
        assert!(!format!("{secret:?}").contains("4242"));
    }

    #[test]
    fn equality_sees_through_the_wrapper() {
        let lhs: StrongSecret<String> = "abc".into();
        let rhs: StrongSecret<String> = "abc".into();
        assert_eq!(lhs, rhs);
    }
}
