//! Wire composition and status normalization for the Protx VSP-Direct
//! field protocol.

use std::collections::BTreeMap;

use error_stack::ResultExt;
use masking::{PeekInterface, Secret};

use crate::{
    codec,
    errors::{ConnectorError, CustomResult, DeclineCategory, DeclinedError, ResponseClass},
    order::Order,
    response::FieldResponse,
    types::{CardBrand, CardCredentials, CheckStatus, MinorUnit, Mode, Transaction},
};

pub const VPS_PROTOCOL: &str = "2.23";

/// Protx refuses refunds above this many minor units regardless of the
/// captured amount.
pub const REFUND_CEILING: MinorUnit = MinorUnit::new(100_000);

const DESCRIPTION_MAX_LENGTH: usize = 100;
const CARD_HOLDER_MAX_LENGTH: usize = 50;
const ADDRESS_MAX_LENGTH: usize = 200;
const POST_CODE_MAX_LENGTH: usize = 10;

/// Gateway-side transaction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxType {
    Payment,
    Deferred,
    Release,
    Abort,
    Void,
    Refund,
    Authenticate,
    ThreeDsCallback,
}

impl TxType {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Payment => "PAYMENT",
            Self::Deferred => "DEFERRED",
            Self::Release => "RELEASE",
            Self::Abort => "ABORT",
            Self::Void => "VOID",
            Self::Refund => "REFUND",
            Self::Authenticate => "AUTHENTICATE",
            Self::ThreeDsCallback => "3DAUTH",
        }
    }
}

/// Immutable driver configuration, except for the documented AVS toggle.
pub struct ProtxConfig {
    pub vendor: Secret<String>,
    pub description: Option<String>,
    pub mode: Mode,
    pub enforce_avs: bool,
}

/// Endpoint per mode and transaction type.
pub fn endpoint(mode: Mode, tx_type: TxType) -> String {
    match mode {
        Mode::Simulator => {
            let path = match tx_type {
                TxType::Payment | TxType::Deferred | TxType::Authenticate => {
                    "VSPDirectGateway.asp".to_string()
                }
                TxType::ThreeDsCallback => "VSPDirectCallback.asp".to_string(),
                TxType::Release => "VSPServerGateway.asp?Service=VendorReleaseTx".to_string(),
                TxType::Abort => "VSPServerGateway.asp?Service=VendorAbortTx".to_string(),
                TxType::Void => "VSPServerGateway.asp?Service=VendorVoidTx".to_string(),
                TxType::Refund => "VSPServerGateway.asp?Service=VendorRefundTx".to_string(),
            };
            format!("https://ukvpstest.protx.com/VSPSimulator/{path}")
        }
        mode => {
            let base = match mode {
                Mode::Live => "https://ukvps.protx.com/vspgateway/service",
                _ => "https://ukvpstest.protx.com/vspgateway/service",
            };
            let path = match tx_type {
                TxType::Payment | TxType::Deferred | TxType::Authenticate => {
                    "vspdirect-register.vsp"
                }
                TxType::ThreeDsCallback => "direct3dcallback.vsp",
                TxType::Release => "release.vsp",
                TxType::Abort => "abort.vsp",
                TxType::Void => "void.vsp",
                TxType::Refund => "refund.vsp",
            };
            format!("{base}/{path}")
        }
    }
}

/// Flat key/value payload. This is the only place in the crate a generic
/// property bag exists; everything above it is typed.
#[derive(Clone, Default)]
pub struct FieldMap(BTreeMap<&'static str, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &'static str, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    pub fn insert_optional(&mut self, key: &'static str, value: Option<String>) {
        if let Some(value) = value {
            if !value.is_empty() {
                self.0.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Check every required field is present and non-empty, before any
    /// network call. Raises the first missing field by name, in table
    /// order.
    pub fn ensure_required(&self, required: &[&'static str]) -> CustomResult<(), ConnectorError> {
        for field_name in required {
            if self.get(field_name).map_or(true, str::is_empty) {
                return Err(ConnectorError::MissingRequiredField { field_name }.into());
            }
        }
        Ok(())
    }

    /// Deterministic form encoding: the map is ordered, so identical
    /// inputs produce byte-identical bodies.
    pub fn encode(&self) -> CustomResult<String, ConnectorError> {
        serde_urlencoded::to_string(&self.0).change_context(ConnectorError::RequestEncodingFailed)
    }
}

// Values can hold card panes; only field names are ever formatted.
impl std::fmt::Debug for FieldMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Base required-field sets per request type. Brand and AVS rules extend
/// these at build time.
pub const PAYMENT_REQUIRED_FIELDS: &[&str] = &[
    "VPSProtocol",
    "TxType",
    "Vendor",
    "VendorTxCode",
    "Amount",
    "Currency",
    "Description",
    "CardHolder",
    "CardNumber",
    "ExpiryDate",
    "CardType",
];
pub const AVS_REQUIRED_FIELDS: &[&str] = &["BillingAddress", "BillingPostCode", "CV2"];
pub const RELEASE_REQUIRED_FIELDS: &[&str] = &[
    "VPSProtocol",
    "TxType",
    "Vendor",
    "VendorTxCode",
    "VPSTxId",
    "SecurityKey",
    "TxAuthNo",
];
pub const REFUND_REQUIRED_FIELDS: &[&str] = &[
    "VPSProtocol",
    "TxType",
    "Vendor",
    "VendorTxCode",
    "Amount",
    "Currency",
    "Description",
    "RelatedVPSTxId",
    "RelatedVendorTxCode",
    "RelatedSecurityKey",
    "RelatedTxAuthNo",
];
pub const THREE_DS_REQUIRED_FIELDS: &[&str] =
    &["VPSProtocol", "TxType", "MD", "PARes"];

/// Required fields for a register-style request, extended by card brand
/// and the AVS mode.
pub fn payment_required_fields(brand: CardBrand, enforce_avs: bool) -> Vec<&'static str> {
    let mut required = PAYMENT_REQUIRED_FIELDS.to_vec();
    if brand.requires_start_date() {
        required.push("StartDate");
    }
    if brand.requires_issue_number() {
        required.push("IssueNumber");
    }
    if enforce_avs {
        required.extend_from_slice(AVS_REQUIRED_FIELDS);
    }
    required
}

fn card_type_code(brand: CardBrand) -> &'static str {
    match brand {
        CardBrand::Visa => "VISA",
        CardBrand::Mastercard => "MC",
        CardBrand::AmericanExpress => "AMEX",
        CardBrand::Discover => "DC",
        CardBrand::Maestro => "MAESTRO",
        CardBrand::Switch => "SWITCH",
        CardBrand::Solo => "SOLO",
    }
}

/// Compose a register-style request (PAYMENT, DEFERRED or AUTHENTICATE).
pub fn build_payment_request(
    config: &ProtxConfig,
    order: &Order,
    card: &CardCredentials,
    tx_type: TxType,
    vendor_tx_code: &str,
) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("VPSProtocol", VPS_PROTOCOL);
    fields.insert("TxType", tx_type.wire_name());
    fields.insert("Vendor", config.vendor.peek().clone());
    fields.insert("VendorTxCode", vendor_tx_code);
    fields.insert("Amount", order.total.to_major_unit_string());
    fields.insert("Currency", order.currency.to_string());
    fields.insert("Description", description_for(config, order));
    fields.insert(
        "CardHolder",
        codec::truncate(card.holder_name.peek(), CARD_HOLDER_MAX_LENGTH),
    );
    fields.insert("CardNumber", card.number.peek().clone());
    fields.insert("ExpiryDate", card.expiration.mmyy());
    fields.insert("CardType", card_type_code(card.brand));

    if let Some(issue_data) = card.issue_data.as_ref() {
        fields.insert_optional("StartDate", issue_data.start.as_ref().map(|d| d.mmyy()));
        fields.insert_optional(
            "IssueNumber",
            issue_data.issue_number.as_ref().map(|n| n.peek().clone()),
        );
    }
    fields.insert_optional(
        "CV2",
        card.security_code.as_ref().map(|code| code.to_digits()),
    );

    let billing = &order.billing_address;
    fields.insert(
        "BillingAddress",
        codec::format_address(billing, ADDRESS_MAX_LENGTH),
    );
    fields.insert_optional(
        "BillingPostCode",
        billing
            .postal_code
            .as_deref()
            .map(|code| codec::truncate(code, POST_CODE_MAX_LENGTH)),
    );
    if let Some(shipping) = order.shipping_address.as_ref() {
        fields.insert(
            "DeliveryAddress",
            codec::format_address(shipping, ADDRESS_MAX_LENGTH),
        );
        fields.insert_optional(
            "DeliveryPostCode",
            shipping
                .postal_code
                .as_deref()
                .map(|code| codec::truncate(code, POST_CODE_MAX_LENGTH)),
        );
    }
    fields.insert_optional("CustomerEMail", order.email.clone());
    fields.insert_optional("ContactNumber", order.phone.clone());

    // 0 leaves the vendor-account default, 1 forces the checks.
    fields.insert("ApplyAVSCV2", if config.enforce_avs { "1" } else { "0" });

    fields
}

fn description_for(config: &ProtxConfig, order: &Order) -> String {
    let description = match config.description.as_deref() {
        Some(text) => text.to_string(),
        None => {
            let titles: Vec<&str> = order.items.iter().map(|item| item.title.as_str()).collect();
            if titles.is_empty() {
                format!("Order {}", order.id)
            } else {
                titles.join(", ")
            }
        }
    };
    codec::truncate(&description, DESCRIPTION_MAX_LENGTH)
}

/// Compose a release/abort/void request correlated to a prior hold.
pub fn build_reference_request(
    config: &ProtxConfig,
    transaction: &Transaction,
    tx_type: TxType,
) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("VPSProtocol", VPS_PROTOCOL);
    fields.insert("TxType", tx_type.wire_name());
    fields.insert("Vendor", config.vendor.peek().clone());
    fields.insert("VendorTxCode", transaction.merchant_transaction_code.clone());
    fields.insert_optional(
        "VPSTxId",
        transaction.gateway_transaction_id.clone(),
    );
    fields.insert_optional(
        "SecurityKey",
        transaction.security_key.as_ref().map(|key| key.peek().clone()),
    );
    fields.insert_optional(
        "TxAuthNo",
        transaction
            .authorization_code
            .as_ref()
            .map(|code| code.peek().clone()),
    );
    if tx_type == TxType::Release {
        fields.insert("ReleaseAmount", transaction.amount.to_major_unit_string());
    }
    fields
}

/// Compose a refund request referencing the captured transaction.
pub fn build_refund_request(
    config: &ProtxConfig,
    transaction: &Transaction,
    amount: MinorUnit,
    vendor_tx_code: &str,
) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("VPSProtocol", VPS_PROTOCOL);
    fields.insert("TxType", TxType::Refund.wire_name());
    fields.insert("Vendor", config.vendor.peek().clone());
    fields.insert("VendorTxCode", vendor_tx_code);
    fields.insert("Amount", amount.to_major_unit_string());
    fields.insert("Currency", transaction.currency.to_string());
    fields.insert(
        "Description",
        codec::truncate(
            &format!("Refund of {}", transaction.merchant_transaction_code),
            DESCRIPTION_MAX_LENGTH,
        ),
    );
    fields.insert_optional("RelatedVPSTxId", transaction.gateway_transaction_id.clone());
    fields.insert(
        "RelatedVendorTxCode",
        transaction.merchant_transaction_code.clone(),
    );
    fields.insert_optional(
        "RelatedSecurityKey",
        transaction.security_key.as_ref().map(|key| key.peek().clone()),
    );
    fields.insert_optional(
        "RelatedTxAuthNo",
        transaction
            .authorization_code
            .as_ref()
            .map(|code| code.peek().clone()),
    );
    fields
}

/// Compose the phase-2 3-D Secure callback.
pub fn build_three_ds_request(merchant_data: &Secret<String>, pares: &Secret<String>) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("VPSProtocol", VPS_PROTOCOL);
    fields.insert("TxType", TxType::ThreeDsCallback.wire_name());
    fields.insert("MD", merchant_data.peek().clone());
    fields.insert("PARes", pares.peek().clone());
    fields
}

/// Overall reply status words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtxStatus {
    Ok,
    Registered,
    Authenticated,
    ThreeDsAuth,
    Malformed,
    Invalid,
    Error,
    NotAuthed,
    Rejected,
}

impl ProtxStatus {
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "REGISTERED" => Some(Self::Registered),
            "AUTHENTICATED" => Some(Self::Authenticated),
            "3DAUTH" => Some(Self::ThreeDsAuth),
            "MALFORMED" => Some(Self::Malformed),
            "INVALID" => Some(Self::Invalid),
            "ERROR" => Some(Self::Error),
            "NOTAUTHED" => Some(Self::NotAuthed),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Whether the reply carries a usable transaction.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::Registered | Self::Authenticated)
    }
}

/// AVS/CV2 result words to the shared check model. Total: unknown words
/// read as run-but-unreported.
pub fn check_status_from_word(word: Option<&str>) -> CheckStatus {
    match word.map(|w| w.trim().to_ascii_uppercase()) {
        None => CheckStatus::Missing,
        Some(word) => match word.as_str() {
            "MATCHED" => CheckStatus::Passed,
            "NOTMATCHED" => CheckStatus::Failed,
            "NOTCHECKED" => CheckStatus::NotChecked,
            "NOTPROVIDED" => CheckStatus::Missing,
            _ => CheckStatus::NotChecked,
        },
    }
}

/// 3-D Secure status words to the shared check model. Total.
pub fn three_ds_status_from_word(word: Option<&str>) -> CheckStatus {
    match word.map(|w| w.trim().to_ascii_uppercase()) {
        None => CheckStatus::Missing,
        Some(word) => match word.as_str() {
            "OK" => CheckStatus::Passed,
            "NOAUTH" | "INVALID" | "MALFORMED" => CheckStatus::Failed,
            "NOTAVAILABLE" => CheckStatus::Missing,
            _ => CheckStatus::NotChecked,
        },
    }
}

/// Normalize a failure reply into the shared decline. Total over every
/// reachable status/detail pair; unknown details fall back to the
/// generic categories.
pub fn classify_failure(status: ProtxStatus, detail: Option<&str>) -> DeclinedError {
    let class = match status {
        ProtxStatus::Malformed => ResponseClass::Malformed,
        ProtxStatus::Invalid => ResponseClass::Invalid,
        ProtxStatus::NotAuthed => ResponseClass::NotAuthorized,
        ProtxStatus::Rejected => ResponseClass::Rejected,
        _ => ResponseClass::Error,
    };
    DeclinedError {
        category: decline_category(class, detail),
        class,
        code: None,
        detail: detail.map(ToString::to_string),
    }
}

fn decline_category(class: ResponseClass, detail: Option<&str>) -> DeclineCategory {
    let detail = detail.unwrap_or_default().to_ascii_lowercase();

    if detail.contains("cv2") || detail.contains("security code") {
        DeclineCategory::CardVerificationValue
    } else if detail.contains("expir") {
        DeclineCategory::CardExpired
    } else if detail.contains("card number") || detail.contains("luhn") {
        DeclineCategory::CardNotValid
    } else if detail.contains("card type") || detail.contains("card range") {
        DeclineCategory::CardType
    } else if detail.contains("post code") || detail.contains("postcode") {
        // Covers the address/postcode-overlap rejection as well.
        DeclineCategory::PostalCodeMismatch
    } else if detail.contains("address") {
        DeclineCategory::AddressMismatch
    } else {
        match class {
            ResponseClass::NotAuthorized | ResponseClass::Rejected => DeclineCategory::CardError,
            _ => DeclineCategory::PaymentError,
        }
    }
}

/// Build the completed transaction for a success reply.
pub fn transaction_from_response(
    mut transaction: Transaction,
    reply: &FieldResponse,
) -> CustomResult<Transaction, ConnectorError> {
    transaction.gateway_transaction_id = Some(reply.require_field("VPSTxId")?.to_string());
    transaction.security_key = reply.get_field("SecurityKey").map(Secret::from);
    transaction.authorization_code = reply.get_field("TxAuthNo").map(Secret::from);
    transaction.address_status = check_status_from_word(reply.get_field("AddressResult"));
    transaction.postal_code_status = check_status_from_word(reply.get_field("PostCodeResult"));
    transaction.card_verification_value_status =
        check_status_from_word(reply.get_field("CV2Result"));
    transaction.three_d_secure_status =
        three_ds_status_from_word(reply.get_field("3DSecureStatus"));
    transaction.continuation = None;
    Ok(transaction)
}
