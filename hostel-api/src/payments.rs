use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use hostel_booking::{GatewayEvent, PaymentRequest, Verification};
use hostel_core::payment::Payment;
use hostel_core::repository::SettlementOutcome;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{error::AppError, extract::{AppJson, AppPath, AppQuery}, middleware::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    reference: Option<String>,
}

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments/verify", get(verify_payment))
        .route("/api/payments/webhook", post(gateway_webhook))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments/initialize", post(initialize_payment))
        .route("/api/payments/booking/{id}", get(payment_history))
}

async fn initialize_payment(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppJson(req): AppJson<PaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let init = state.payments.initialize(&actor, req).await?;
    state.metrics.payments_initialized.inc();

    Ok(Json(json!({
        "message": "Payment initialized",
        "checkout_url": init.checkout.authorization_url,
        "access_code": init.checkout.access_code,
        "reference": init.checkout.reference,
        "payment": init.payment,
    })))
}

fn verification_body(verification: &Verification) -> Value {
    match verification {
        Verification::AlreadyVerified(payment) => json!({
            "message": "Payment already verified",
            "already_verified": true,
            "outcome": verification.outcome_label(),
            "payment": payment,
        }),
        Verification::Settled(settlement) => {
            let message = match settlement.outcome {
                SettlementOutcome::Confirmed => "Payment verified, booking confirmed".to_string(),
                SettlementOutcome::PartiallyPaid { remaining } => {
                    format!("Payment verified, remaining balance {}", remaining)
                }
                SettlementOutcome::RoomUnavailable { .. } => {
                    "Payment received but the room is no longer available, a refund will be arranged".to_string()
                }
                SettlementOutcome::NotPayable => {
                    "Payment received for a booking that is no longer payable, a refund will be arranged".to_string()
                }
                SettlementOutcome::AlreadySettled => "Payment already verified".to_string(),
            };
            json!({
                "message": message,
                "already_verified": false,
                "outcome": verification.outcome_label(),
                "payment": settlement.payment,
                "booking": settlement.booking,
            })
        }
    }
}

async fn verify_payment(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<VerifyQuery>,
) -> Result<Json<Value>, AppError> {
    let reference = query
        .reference
        .ok_or_else(|| AppError::ValidationError("reference is required".to_string()))?;
    let verification = state.payments.verify(&reference).await?;
    state
        .metrics
        .payments_verified
        .with_label_values(&[verification.outcome_label()])
        .inc();
    Ok(Json(verification_body(&verification)))
}

/// Gateway callback. The event is only a hint: the reference is verified
/// with the gateway before anything is written.
async fn gateway_webhook(
    State(state): State<AppState>,
    AppJson(event): AppJson<GatewayEvent>,
) -> Result<StatusCode, AppError> {
    if let Some(verification) = state.payments.handle_event(event).await? {
        state
            .metrics
            .payments_verified
            .with_label_values(&[verification.outcome_label()])
            .inc();
    }
    Ok(StatusCode::OK)
}

async fn payment_history(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(booking_id): AppPath<Uuid>,
) -> Result<Json<Vec<Payment>>, AppError> {
    // Same visibility as the booking itself.
    state.bookings.get(&actor, booking_id).await?;
    Ok(Json(state.payments.history(booking_id).await?))
}
