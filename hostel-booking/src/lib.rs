pub mod dispatcher;
pub mod effects;
pub mod manager;
pub mod orchestrator;
pub mod reference;
pub mod verification;

pub use dispatcher::{DispatchReport, DispatchSettings, OutboxDispatcher};
pub use manager::{BookingRequest, BookingService, DateChange};
pub use orchestrator::{GatewayEvent, PaymentInitialization, PaymentOrchestrator, PaymentRequest, PaymentSettings, Verification};
pub use verification::{DocumentInput, DocumentVerifier, ReviewRequest};
