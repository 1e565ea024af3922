use std::sync::Arc;

use chrono::{Duration, Utc};
use hostel_core::booking::Booking;
use hostel_core::payment::{
    ChargeBearer, Checkout, CheckoutRequest, GatewayError, NewPayment, Payment, PaymentGateway, PaymentMethod,
    PaymentRecordStatus, SplitInstruction, SubaccountRequest,
};
use hostel_core::repository::{
    BookingRepository, DocumentRepository, PaymentRepository, PaymentSlot, PayoutRepository, Settlement,
    SettlementOutcome, UserDirectory,
};
use hostel_core::user::{Actor, PayoutAccount};
use hostel_core::{CoreError, CoreResult};
use hostel_shared::Masked;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{effects, reference};

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    /// Pending attempts older than this no longer block a new one.
    pub pending_ttl: Duration,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "GHS".to_string(),
            pending_ttl: Duration::minutes(30),
        }
    }
}

/// Body of `POST /api/payments/initialize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub email: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone)]
pub struct PaymentInitialization {
    pub payment: Payment,
    pub checkout: Checkout,
}

#[derive(Debug, Clone)]
pub enum Verification {
    /// The reference was settled by an earlier call; nothing was credited.
    AlreadyVerified(Payment),
    Settled(Settlement),
}

impl Verification {
    pub fn payment(&self) -> &Payment {
        match self {
            Verification::AlreadyVerified(payment) => payment,
            Verification::Settled(settlement) => &settlement.payment,
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self {
            Verification::AlreadyVerified(_) => "already_verified",
            Verification::Settled(s) => match s.outcome {
                SettlementOutcome::AlreadySettled => "already_verified",
                SettlementOutcome::PartiallyPaid { .. } => "partially_paid",
                SettlementOutcome::Confirmed => "confirmed",
                SettlementOutcome::RoomUnavailable { .. } => "room_unavailable",
                SettlementOutcome::NotPayable => "not_payable",
            },
        }
    }
}

/// Gateway callback envelope. Only the event name and reference are read;
/// the transaction is re-verified with the gateway before anything is
/// written.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub event: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub reference: Option<String>,
}

pub const CHARGE_SUCCESS: &str = "charge.success";

pub struct PaymentOrchestrator {
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    documents: Arc<dyn DocumentRepository>,
    payouts: Arc<dyn PayoutRepository>,
    users: Arc<dyn UserDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    settings: PaymentSettings,
}

impl PaymentOrchestrator {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        documents: Arc<dyn DocumentRepository>,
        payouts: Arc<dyn PayoutRepository>,
        users: Arc<dyn UserDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            bookings,
            payments,
            documents,
            payouts,
            users,
            gateway,
            settings,
        }
    }

    /// Open a pending payment and a gateway checkout for part or all of a
    /// booking's outstanding balance.
    pub async fn initialize(&self, actor: &Actor, request: PaymentRequest) -> CoreResult<PaymentInitialization> {
        let booking_id = request
            .booking_id
            .ok_or_else(|| CoreError::ValidationError("booking_id is required".to_string()))?;
        let amount = request
            .amount
            .ok_or_else(|| CoreError::ValidationError("amount is required".to_string()))?;
        let email = request
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| actor.email.clone());
        if !email.contains('@') {
            return Err(CoreError::ValidationError("A valid email is required".to_string()));
        }
        let method = request.payment_method.unwrap_or(PaymentMethod::Card);

        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Booking not found".to_string()))?;
        if booking.user_id != actor.id {
            return Err(CoreError::Forbidden("You can only pay for your own bookings".to_string()));
        }
        validate_amount(&booking, amount)?;

        let parties = self
            .bookings
            .parties(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Booking not found".to_string()))?;

        let shares = booking.fees().split();
        let subaccount_code = self.landlord_subaccount(parties.landlord_id, shares.platform_percent).await?;

        let reference = reference::generate();
        let new_payment = NewPayment {
            booking_id,
            user_id: actor.id,
            reference: reference.clone(),
            amount,
            currency: self.settings.currency.clone(),
            payment_method: method,
            email: email.clone(),
            split: shares,
        };

        let abandoned_before = Utc::now() - self.settings.pending_ttl;
        let payment = match self.payments.open(new_payment, abandoned_before).await? {
            PaymentSlot::Opened(payment) => payment,
            PaymentSlot::Existing(existing) => {
                info!(booking_id = %booking_id, reference = %existing.reference, "Pending payment already in flight");
                return Err(CoreError::PendingPaymentExists(Box::new(existing)));
            }
        };

        let checkout_request = CheckoutRequest {
            reference: reference.clone(),
            email,
            amount,
            currency: payment.currency.clone(),
            channels: vec![method],
            split: SplitInstruction {
                subaccount_code,
                shares,
                bearer: ChargeBearer::Account,
            },
            metadata: json!({
                "booking_id": booking.id,
                "hostel_id": booking.hostel_id,
                "room_id": booking.room_id,
                "user_id": booking.user_id,
                "hostel_name": parties.hostel_name,
            }),
        };

        let checkout = match self.gateway.initialize_transaction(&checkout_request).await {
            Ok(checkout) => checkout,
            Err(e) => {
                error!(reference = %reference, error = %e, "Gateway checkout failed, failing pending payment");
                if let Err(mark_err) = self.payments.mark_failed(payment.id, &e.to_string()).await {
                    error!(reference = %reference, error = %mark_err, "Could not fail orphaned pending payment");
                }
                return Err(e.into());
            }
        };

        self.payments.attach_checkout(payment.id, &checkout).await?;
        info!(
            booking_id = %booking_id,
            reference = %reference,
            amount = %amount,
            email = %Masked(payment.email.as_str()),
            "Payment initialized"
        );

        let mut payment = payment;
        payment.checkout_url = Some(checkout.authorization_url.clone());
        payment.access_code = Some(checkout.access_code.clone());
        Ok(PaymentInitialization { payment, checkout })
    }

    /// Confirm a reference with the gateway and apply it at most once.
    pub async fn verify(&self, reference: &str) -> CoreResult<Verification> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(CoreError::ValidationError("reference is required".to_string()));
        }

        let payment = self
            .payments
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| CoreError::VerificationFailed("unknown payment reference".to_string()))?;
        if payment.status == PaymentRecordStatus::Successful {
            return Ok(Verification::AlreadyVerified(payment));
        }

        let verification = match self.gateway.verify_transaction(reference).await {
            Ok(v) => v,
            Err(GatewayError::UnknownTransaction(r)) => {
                return Err(CoreError::VerificationFailed(format!("transaction {} not found", r)));
            }
            Err(e) => return Err(e.into()),
        };

        if !verification.is_success() {
            warn!(reference = %reference, status = ?verification.status, "Gateway did not report success");
            return Err(CoreError::VerificationFailed(
                verification
                    .gateway_response
                    .unwrap_or_else(|| "transaction was not successful".to_string()),
            ));
        }
        if !verification.currency.eq_ignore_ascii_case(&payment.currency) {
            warn!(reference = %reference, currency = %verification.currency, "Gateway currency mismatch");
            return Err(CoreError::VerificationFailed("currency mismatch".to_string()));
        }

        let confirmation = verification.confirmation();
        let settlement = self.payments.settle(reference, &confirmation, effects::settlement).await?;

        match settlement.outcome {
            SettlementOutcome::AlreadySettled => return Ok(Verification::AlreadyVerified(settlement.payment)),
            SettlementOutcome::PartiallyPaid { remaining } => {
                info!(booking_id = %settlement.booking.id, reference = %reference, remaining = %remaining, "Partial payment credited");
            }
            SettlementOutcome::Confirmed => {
                info!(booking_id = %settlement.booking.id, reference = %reference, "Booking fully paid and confirmed");
            }
            SettlementOutcome::RoomUnavailable { conflicting_booking_id } => {
                warn!(
                    booking_id = %settlement.booking.id,
                    reference = %reference,
                    conflicting = %conflicting_booking_id,
                    "Fully paid but room taken, refund required"
                );
            }
            SettlementOutcome::NotPayable => {
                warn!(
                    booking_id = %settlement.booking.id,
                    reference = %reference,
                    status = %settlement.booking.status,
                    "Payment received for a booking not accepting payments, refund required"
                );
            }
        }

        Ok(Verification::Settled(settlement))
    }

    /// Gateway webhook entry point. Events other than a successful charge
    /// are acknowledged and ignored.
    pub async fn handle_event(&self, event: GatewayEvent) -> CoreResult<Option<Verification>> {
        if event.event != CHARGE_SUCCESS {
            info!(event = %event.event, "Ignoring gateway event");
            return Ok(None);
        }
        let reference = event
            .data
            .reference
            .ok_or_else(|| CoreError::ValidationError("event has no reference".to_string()))?;
        self.verify(&reference).await.map(Some)
    }

    pub async fn history(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        Ok(self.payments.list_for_booking(booking_id).await?)
    }

    /// Stored payout sub-account, or a new one registered from the bank
    /// details of the landlord's approved documents.
    async fn landlord_subaccount(&self, landlord_id: Uuid, platform_percent: Decimal) -> CoreResult<String> {
        if let Some(account) = self.payouts.payout_account(landlord_id).await? {
            return Ok(account.subaccount_code);
        }

        let document = self
            .documents
            .latest_approved_for_landlord(landlord_id)
            .await?
            .ok_or_else(|| CoreError::ValidationError("The landlord has not set up payout details yet".to_string()))?;
        let landlord = self
            .users
            .contact(landlord_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Landlord not found".to_string()))?;

        let request = SubaccountRequest {
            business_name: document.bank.account_name.clone(),
            bank_code: document.bank.bank_code.clone(),
            account_number: document.bank.account_number.clone(),
            percentage_charge: platform_percent,
            contact_email: landlord.email,
        };
        let code = self.gateway.create_subaccount(&request).await?;
        info!(landlord_id = %landlord_id, "Registered landlord payout sub-account");

        let saved = self
            .payouts
            .save_payout_account(PayoutAccount {
                landlord_id,
                subaccount_code: code,
                bank_code: document.bank.bank_code,
                account_number: document.bank.account_number,
                created_at: Utc::now(),
            })
            .await?;
        Ok(saved.subaccount_code)
    }
}

fn validate_amount(booking: &Booking, amount: Decimal) -> CoreResult<()> {
    if !booking.is_payable() {
        return Err(CoreError::Conflict(format!(
            "Booking is not accepting payments (status {})",
            booking.status
        )));
    }
    if amount <= Decimal::ZERO {
        return Err(CoreError::ValidationError("amount must be greater than zero".to_string()));
    }
    if amount.normalize().scale() > 2 {
        return Err(CoreError::ValidationError(
            "amount cannot have more than two decimal places".to_string(),
        ));
    }
    let outstanding = booking.outstanding();
    if amount > outstanding {
        return Err(CoreError::ValidationError(format!(
            "amount exceeds the outstanding balance of {}",
            outstanding
        )));
    }
    Ok(())
}
