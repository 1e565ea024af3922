pub mod account_repo;
pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod error;
pub mod listing_repo;
pub mod mailer;
pub mod notification_repo;
pub mod payment_repo;
pub mod paystack;
pub mod redis_repo;

#[cfg(feature = "memory")]
pub mod memory;

pub use account_repo::StoreAccountRepository;
pub use booking_repo::StoreBookingRepository;
pub use database::DbClient;
pub use listing_repo::{StoreHostelRepository, StoreReviewRepository, StoreRoomRepository};
pub use mailer::SmtpMailer;
pub use notification_repo::{StoreNotificationRepository, StoreOutboxRepository};
pub use payment_repo::StorePaymentRepository;
pub use paystack::PaystackClient;
pub use redis_repo::RedisClient;
