use std::sync::Arc;

use hostel_booking::{BookingService, DocumentVerifier, PaymentOrchestrator};
use hostel_catalog::CatalogService;
use hostel_core::repository::NotificationRepository;
use hostel_store::app_config::RateLimitConfig;
use hostel_store::RedisClient;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Per-IP request budget. Disabled when no Redis is configured.
#[derive(Clone)]
pub struct RateLimiter {
    pub redis: Arc<RedisClient>,
    pub config: RateLimitConfig,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub bookings: Arc<BookingService>,
    pub payments: Arc<PaymentOrchestrator>,
    pub documents: Arc<DocumentVerifier>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub rate_limiter: Option<RateLimiter>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
}
