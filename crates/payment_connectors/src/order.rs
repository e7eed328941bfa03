//! Read-only order collaborator types.
//!
//! The checkout workflow owns these; this layer only reads them, with one
//! documented exception: a checkout-token flow that learns billing details
//! from the gateway may attach a new [`OrderPaymentMethod`].

use crate::types::{CardBrand, Currency, MinorUnit};

/// Postal address as supplied by the checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub provstate: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
}

/// One order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub sku: String,
    pub title: String,
    pub description: Option<String>,
    /// Unit price in minor units.
    pub price: MinorUnit,
    pub quantity: u32,
}

/// A payment method declared on the order: brand plus masked panes only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPaymentMethod {
    pub brand: CardBrand,
    /// `XXXX` + last four; never a full number.
    pub masked_number: String,
    pub expiry_month: Option<u8>,
    pub expiry_year: Option<u16>,
}

/// The order being paid for. Totals are minor units in `currency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: String,
    pub total: MinorUnit,
    pub tax: MinorUnit,
    pub shipping: MinorUnit,
    pub handling: MinorUnit,
    pub currency: Currency,
    pub items: Vec<OrderItem>,
    pub billing_address: Address,
    pub shipping_address: Option<Address>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub locale: Option<String>,
    payment_methods: Vec<OrderPaymentMethod>,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        total: MinorUnit,
        currency: Currency,
        billing_address: Address,
    ) -> Self {
        Self {
            id: id.into(),
            total,
            tax: MinorUnit::zero(),
            shipping: MinorUnit::zero(),
            handling: MinorUnit::zero(),
            currency,
            items: Vec::new(),
            billing_address,
            shipping_address: None,
            email: None,
            phone: None,
            locale: None,
            payment_methods: Vec::new(),
        }
    }

    /// Payment methods declared on the order, newest last.
    pub fn payment_methods(&self) -> &[OrderPaymentMethod] {
        &self.payment_methods
    }

    /// Attach a payment method learned from a checkout-token flow. The
    /// only mutation this layer ever performs on an order.
    pub fn attach_payment_method(&mut self, method: OrderPaymentMethod) {
        self.payment_methods.push(method);
    }
}
