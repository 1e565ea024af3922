use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fees::SplitShares;

text_enum!(
    /// State of one gateway transaction attempt.
    PaymentRecordStatus, "payment record status", {
        Pending => "pending",
        Successful => "successful",
        Failed => "failed",
    }
);

text_enum!(
    /// Channel the student pays through.
    PaymentMethod, "payment method", {
        Card => "card",
        MobileMoney => "mobile_money",
        BankTransfer => "bank_transfer",
    }
);

/// One attempted gateway transaction tied to a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub email: String,
    pub status: PaymentRecordStatus,
    pub landlord_percent: Decimal,
    pub platform_percent: Decimal,
    pub checkout_url: Option<String>,
    pub access_code: Option<String>,
    pub channel: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn apply_confirmation(&mut self, confirmation: &PaymentConfirmation) {
        self.status = PaymentRecordStatus::Successful;
        self.amount = confirmation.amount;
        self.currency = confirmation.currency.clone();
        self.email = confirmation.email.clone();
        self.channel = confirmation.channel.clone();
        self.paid_at = Some(confirmation.paid_at);
        self.updated_at = Utc::now();
    }
}

/// A payment row about to be written in `pending` state.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub email: String,
    pub split: SplitShares,
}

impl NewPayment {
    pub fn into_payment(self, id: Uuid) -> Payment {
        let now = Utc::now();
        Payment {
            id,
            booking_id: self.booking_id,
            user_id: self.user_id,
            reference: self.reference,
            amount: self.amount,
            currency: self.currency,
            payment_method: self.payment_method,
            email: self.email,
            status: PaymentRecordStatus::Pending,
            landlord_percent: self.split.landlord_percent,
            platform_percent: self.split.platform_percent,
            checkout_url: None,
            access_code: None,
            channel: None,
            failure_reason: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What the gateway reported for a successful transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    pub amount: Decimal,
    pub currency: String,
    pub email: String,
    pub channel: Option<String>,
    pub paid_at: DateTime<Utc>,
}

// ============================================================================
// Gateway contract
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChargeBearer {
    /// The platform's main account bears the gateway charges.
    Account,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitInstruction {
    pub subaccount_code: String,
    pub shares: SplitShares,
    pub bearer: ChargeBearer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub reference: String,
    pub email: String,
    pub amount: Decimal,
    pub currency: String,
    pub channels: Vec<PaymentMethod>,
    pub split: SplitInstruction,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkout {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubaccountRequest {
    pub business_name: String,
    pub bank_code: String,
    pub account_number: String,
    /// Default platform share on the sub-account; per-transaction splits
    /// override it.
    pub percentage_charge: Decimal,
    pub contact_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayTransactionStatus {
    Success,
    Failed,
    Abandoned,
    Ongoing,
    Pending,
    Reversed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionVerification {
    pub reference: String,
    pub status: GatewayTransactionStatus,
    pub amount: Decimal,
    pub currency: String,
    pub customer_email: String,
    pub channel: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_response: Option<String>,
}

impl TransactionVerification {
    pub fn is_success(&self) -> bool {
        self.status == GatewayTransactionStatus::Success
    }

    pub fn confirmation(&self) -> PaymentConfirmation {
        PaymentConfirmation {
            amount: self.amount,
            currency: self.currency.clone(),
            email: self.customer_email.clone(),
            channel: self.channel.clone(),
            paid_at: self.paid_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    RequestFailed(String),
    #[error("gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("gateway response could not be parsed: {0}")]
    ResponseParseFailed(String),
    #[error("transaction {0} is unknown to the gateway")]
    UnknownTransaction(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Card / mobile-money processor with split settlement to landlord
/// sub-accounts.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a landlord payout sub-account; returns its code.
    async fn create_subaccount(&self, request: &SubaccountRequest) -> GatewayResult<String>;

    /// Start a hosted checkout for the given reference.
    async fn initialize_transaction(&self, request: &CheckoutRequest) -> GatewayResult<Checkout>;

    /// Look up the final state of a transaction.
    async fn verify_transaction(&self, reference: &str) -> GatewayResult<TransactionVerification>;
}
