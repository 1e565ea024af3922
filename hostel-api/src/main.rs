use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use hostel_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig, RateLimiter},
};
use hostel_booking::{
    BookingService, DispatchSettings, DocumentVerifier, OutboxDispatcher, PaymentOrchestrator, PaymentSettings,
};
use hostel_catalog::CatalogService;
use hostel_store::{
    app_config::Config, DbClient, PaystackClient, RedisClient, SmtpMailer, StoreAccountRepository,
    StoreBookingRepository, StoreHostelRepository, StoreNotificationRepository, StoreOutboxRepository,
    StorePaymentRepository, StoreReviewRepository, StoreRoomRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "hostel_api=debug,hostel_booking=debug,hostel_store=info,tower_http=debug,axum::rejection=trace".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting hostel API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let pool = db.pool.clone();

    // Optional: without Redis the rate limiter is simply off.
    let rate_limiter = match &config.redis {
        Some(redis) => match connect_redis(&redis.url).await {
            Ok(client) => Some(RateLimiter {
                redis: Arc::new(client),
                config: config.rate_limit.clone(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled");
                None
            }
        },
        None => None,
    };

    let hostels = Arc::new(StoreHostelRepository::new(pool.clone()));
    let rooms = Arc::new(StoreRoomRepository::new(pool.clone()));
    let reviews = Arc::new(StoreReviewRepository::new(pool.clone()));
    let bookings = Arc::new(StoreBookingRepository::new(pool.clone()));
    let payments = Arc::new(StorePaymentRepository::new(pool.clone()));
    let accounts = Arc::new(StoreAccountRepository::new(pool.clone()));
    let notifications = Arc::new(StoreNotificationRepository::new(pool.clone()));
    let outbox = Arc::new(StoreOutboxRepository::new(pool));

    let gateway = Arc::new(PaystackClient::new(&config.paystack));
    let mailer = Arc::new(SmtpMailer::new(&config.smtp).context("Failed to build SMTP transport")?);

    let rules = &config.business_rules;
    let booking_service = BookingService::new(bookings.clone(), hostels.clone(), rooms.clone(), rules.fee_schedule());
    let orchestrator = PaymentOrchestrator::new(
        bookings,
        payments,
        accounts.clone(),
        accounts.clone(),
        accounts.clone(),
        gateway,
        PaymentSettings {
            currency: rules.currency.clone(),
            pending_ttl: chrono::Duration::minutes(rules.pending_payment_ttl_minutes),
        },
    );
    let verifier = DocumentVerifier::new(accounts, hostels.clone());
    let catalog = CatalogService::new(hostels, rooms, reviews);

    let dispatcher = OutboxDispatcher::new(
        outbox,
        mailer,
        DispatchSettings {
            poll_interval: std::time::Duration::from_secs(config.outbox.poll_interval_seconds),
            batch_size: config.outbox.batch_size,
            max_attempts: config.outbox.max_attempts,
        },
    );
    tokio::spawn(dispatcher.run());

    let app_state = AppState {
        catalog: Arc::new(catalog),
        bookings: Arc::new(booking_service),
        payments: Arc::new(orchestrator),
        documents: Arc::new(verifier),
        notifications,
        rate_limiter,
        metrics: Arc::new(Metrics::new().context("Failed to register metrics")?),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

async fn connect_redis(url: &str) -> anyhow::Result<RedisClient> {
    let client = RedisClient::new(url).await?;
    client.ping().await.context("Redis did not answer PING")?;
    Ok(client)
}
