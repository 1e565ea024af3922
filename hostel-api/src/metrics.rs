use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::{error::AppError, state::AppState};

/// Booking and payment counters scraped at `GET /metrics`.
pub struct Metrics {
    registry: Registry,
    pub bookings_created: IntCounter,
    pub booking_conflicts: IntCounter,
    pub payments_initialized: IntCounter,
    /// Labelled by settlement outcome.
    pub payments_verified: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings_created = IntCounter::new("hostel_bookings_created_total", "Bookings created")?;
        let booking_conflicts = IntCounter::new(
            "hostel_booking_conflicts_total",
            "Booking requests refused because the room was taken",
        )?;
        let payments_initialized = IntCounter::new("hostel_payments_initialized_total", "Gateway checkouts opened")?;
        let payments_verified = IntCounterVec::new(
            Opts::new("hostel_payments_verified_total", "Payment verifications by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(bookings_created.clone()))?;
        registry.register(Box::new(booking_conflicts.clone()))?;
        registry.register(Box::new(payments_initialized.clone()))?;
        registry.register(Box::new(payments_verified.clone()))?;

        Ok(Self {
            registry,
            bookings_created,
            booking_conflicts,
            payments_initialized,
            payments_verified,
        })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(format!("metrics encoding failed: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
