use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use hostel_api::{
    app,
    metrics::Metrics,
    middleware::Claims,
    state::{AppState, AuthConfig},
};
use hostel_booking::{BookingService, DocumentVerifier, PaymentOrchestrator, PaymentSettings};
use hostel_catalog::CatalogService;
use hostel_core::fees::FeeSchedule;
use hostel_core::payment::GatewayTransactionStatus;
use hostel_core::user::{Role, UserContact};
use hostel_store::memory::{FakeGateway, MemoryStore};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    store: MemoryStore,
    gateway: FakeGateway,
}

impl TestApp {
    fn new() -> Self {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let shared = Arc::new(store.clone());

        let state = AppState {
            catalog: Arc::new(CatalogService::new(shared.clone(), shared.clone(), shared.clone())),
            bookings: Arc::new(BookingService::new(
                shared.clone(),
                shared.clone(),
                shared.clone(),
                FeeSchedule::default(),
            )),
            payments: Arc::new(PaymentOrchestrator::new(
                shared.clone(),
                shared.clone(),
                shared.clone(),
                shared.clone(),
                shared.clone(),
                Arc::new(gateway.clone()),
                PaymentSettings::default(),
            )),
            documents: Arc::new(DocumentVerifier::new(shared.clone(), shared.clone())),
            notifications: shared,
            rate_limiter: None,
            metrics: Arc::new(Metrics::new().unwrap()),
            auth: AuthConfig {
                secret: SECRET.to_string(),
            },
        };

        Self {
            router: app(state),
            store,
            gateway,
        }
    }

    async fn user(&self, name: &str, role: Role) -> (UserContact, String) {
        let email = format!("{}@example.com", name.to_lowercase());
        let user = self.store.insert_user(name, &email, role).await;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: role.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        (user, token)
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }

    /// Landlord with an approved hostel, a 300.00 room and payout details
    /// on file. Returns (hostel_id, room_id).
    async fn approved_listing(&self, landlord: &str, admin: &str) -> (String, String) {
        let (status, hostel) = self
            .send(
                Method::POST,
                "/api/hostels",
                Some(landlord),
                Some(json!({ "name": "Unity Hall Annex", "location": "Ayeduase", "amenities": ["wifi", "water"] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let hostel_id = hostel["id"].as_str().unwrap().to_string();

        let (status, room) = self
            .send(
                Method::POST,
                &format!("/api/hostels/{}/rooms", hostel_id),
                Some(landlord),
                Some(json!({ "room_number": "A1", "room_type": "2-in-1", "capacity": 2, "price": "300.00" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let room_id = room["id"].as_str().unwrap().to_string();

        let (status, document) = self
            .send(
                Method::POST,
                "/api/documents",
                Some(landlord),
                Some(json!({
                    "hostel_id": hostel_id,
                    "id_document_url": "https://img.example.com/id.png",
                    "property_proof_url": "https://img.example.com/deed.pdf",
                    "bank_name": "GCB Bank",
                    "bank_code": "040",
                    "account_number": "1234567890",
                    "account_name": "Kofi Mensah",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = self
            .send(
                Method::POST,
                "/api/admin/verify-document",
                Some(admin),
                Some(json!({ "document_id": document["id"], "status": "approved" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        (hostel_id, room_id)
    }

    async fn book(&self, student: &str, hostel_id: &str, room_id: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/bookings",
            Some(student),
            Some(json!({
                "room_id": room_id,
                "hostel_id": hostel_id,
                "start_date": "2026-09-01",
                "end_date": "2026-12-15",
                "hostel_fee": "300.00",
            })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());

    let (status, _) = app.send(Method::GET, "/api/bookings", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_students_cannot_create_hostels() {
    let app = TestApp::new();
    let (_, student) = app.user("Ama", Role::Student).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/hostels",
            Some(&student),
            Some(json!({ "name": "Sneaky Hall", "location": "Kotei" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_hostel_becomes_public_after_approval() {
    let app = TestApp::new();
    let (_, landlord) = app.user("Kofi", Role::Landlord).await;
    let (_, admin) = app.user("Root", Role::Admin).await;

    let (_, hostel) = app
        .send(
            Method::POST,
            "/api/hostels",
            Some(&landlord),
            Some(json!({ "name": "Unity Hall Annex", "location": "Ayeduase" })),
        )
        .await;
    let hostel_id = hostel["id"].as_str().unwrap().to_string();

    let (status, _) = app.send(Method::GET, &format!("/api/hostels/{}", hostel_id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .send(Method::GET, &format!("/api/hostels/{}", hostel_id), Some(&landlord), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/hostels/{}", hostel_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (hostel_id, _) = app.approved_listing(&landlord, &admin).await;
    let (status, page) = app.send(Method::GET, "/api/hostels?search=unity", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], hostel_id.as_str());
}

#[tokio::test]
async fn test_booking_to_confirmed_payment() {
    let app = TestApp::new();
    let (landlord_user, landlord) = app.user("Kofi", Role::Landlord).await;
    let (_, admin) = app.user("Root", Role::Admin).await;
    let (_, student) = app.user("Ama", Role::Student).await;
    let (hostel_id, room_id) = app.approved_listing(&landlord, &admin).await;

    let (status, booking) = app.book(&student, &hostel_id, &room_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["total_price"], "323.64");
    assert_eq!(booking["status"], "pending");
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (status, init) = app
        .send(
            Method::POST,
            "/api/payments/initialize",
            Some(&student),
            Some(json!({ "booking_id": booking_id, "amount": "323.64", "payment_method": "mobile_money" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(init["checkout_url"].as_str().unwrap().starts_with("https://"));
    let reference = init["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("HSTL-"));

    app.gateway
        .complete(&reference, GatewayTransactionStatus::Success, Decimal::new(32364, 2), "GHS")
        .await;

    let verify_uri = format!("/api/payments/verify?reference={}", reference);
    let (status, verified) = app.send(Method::GET, &verify_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["outcome"], "confirmed");
    assert_eq!(verified["booking"]["status"], "confirmed");
    assert_eq!(verified["booking"]["payment_status"], "paid");

    let (status, again) = app.send(Method::GET, &verify_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["already_verified"], true);

    let (status, history) = app
        .send(Method::GET, &format!("/api/payments/booking/{}", booking_id), Some(&landlord), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, notes) = app.send(Method::GET, "/api/notifications", Some(&landlord), None).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = notes
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"booking_created"));
    assert!(kinds.contains(&"booking_confirmed"));

    let (status, marked) = app
        .send(Method::POST, "/api/notifications/read-all", Some(&landlord), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(marked["updated"].as_u64().unwrap() >= 2);
    assert!(app
        .store
        .all_notifications()
        .await
        .iter()
        .filter(|n| n.recipient_id == landlord_user.id)
        .all(|n| n.is_read));

    let (status, metrics) = app.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let text = metrics.as_str().unwrap();
    assert!(text.contains("hostel_bookings_created_total 1"));
    assert!(text.contains("hostel_payments_verified_total{outcome=\"confirmed\"} 1"));
}

#[tokio::test]
async fn test_second_initialize_reports_existing_payment() {
    let app = TestApp::new();
    let (_, landlord) = app.user("Kofi", Role::Landlord).await;
    let (_, admin) = app.user("Root", Role::Admin).await;
    let (_, student) = app.user("Ama", Role::Student).await;
    let (hostel_id, room_id) = app.approved_listing(&landlord, &admin).await;
    let (_, booking) = app.book(&student, &hostel_id, &room_id).await;

    let body = json!({ "booking_id": booking["id"], "amount": "100.00" });
    let (status, first) = app
        .send(Method::POST, "/api/payments/initialize", Some(&student), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, second) = app
        .send(Method::POST, "/api/payments/initialize", Some(&student), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(second["existing_payment"]["reference"], first["reference"]);
}

#[tokio::test]
async fn test_unknown_reference_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .send(Method::GET, "/api/payments/verify?reference=HSTL-1-NOPE0000", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("verification failed"));
}

#[tokio::test]
async fn test_webhook_settles_through_verification() {
    let app = TestApp::new();
    let (_, landlord) = app.user("Kofi", Role::Landlord).await;
    let (_, admin) = app.user("Root", Role::Admin).await;
    let (_, student) = app.user("Ama", Role::Student).await;
    let (hostel_id, room_id) = app.approved_listing(&landlord, &admin).await;
    let (_, booking) = app.book(&student, &hostel_id, &room_id).await;

    let (_, init) = app
        .send(
            Method::POST,
            "/api/payments/initialize",
            Some(&student),
            Some(json!({ "booking_id": booking["id"], "amount": "100.00" })),
        )
        .await;
    let reference = init["reference"].as_str().unwrap().to_string();
    app.gateway
        .complete(&reference, GatewayTransactionStatus::Success, Decimal::new(10000, 2), "GHS")
        .await;

    // Ignored event types are acknowledged without touching the booking.
    let (status, _) = app
        .send(
            Method::POST,
            "/api/payments/webhook",
            None,
            Some(json!({ "event": "transfer.success", "data": { "reference": reference } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/payments/webhook",
            None,
            Some(json!({ "event": "charge.success", "data": { "reference": reference, "amount": 999999 } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, stored) = app
        .send(Method::GET, &format!("/api/bookings/{}", booking["id"].as_str().unwrap()), Some(&student), None)
        .await;
    assert_eq!(stored["amount_paid"], "100.00");
    assert_eq!(stored["status"], "pending");
}

#[tokio::test]
async fn test_cancel_twice_is_refused() {
    let app = TestApp::new();
    let (_, landlord) = app.user("Kofi", Role::Landlord).await;
    let (_, admin) = app.user("Root", Role::Admin).await;
    let (_, student) = app.user("Ama", Role::Student).await;
    let (hostel_id, room_id) = app.approved_listing(&landlord, &admin).await;
    let (_, booking) = app.book(&student, &hostel_id, &room_id).await;

    let body = json!({ "booking_id": booking["id"] });
    let (status, cancelled) = app
        .send(Method::POST, "/api/bookings/cancel-booking", Some(&student), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["booking"]["status"], "cancelled");

    let (status, _) = app
        .send(Method::POST, "/api/bookings/cancel-booking", Some(&student), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reviews_once_per_student() {
    let app = TestApp::new();
    let (_, landlord) = app.user("Kofi", Role::Landlord).await;
    let (_, admin) = app.user("Root", Role::Admin).await;
    let (_, student) = app.user("Ama", Role::Student).await;
    let (hostel_id, _) = app.approved_listing(&landlord, &admin).await;
    let uri = format!("/api/review/{}/reviews", hostel_id);

    let review = json!({ "rating": 4, "comment": "Quiet and clean" });
    let (status, _) = app.send(Method::POST, &uri, Some(&student), Some(review.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.send(Method::POST, &uri, Some(&student), Some(review)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review_count"], 1);
    assert_eq!(body["average_rating"], 4.0);
}

#[tokio::test]
async fn test_malformed_input_is_a_plain_400() {
    let app = TestApp::new();
    let (_, student) = app.user("Ama", Role::Student).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/bookings",
            Some(&student),
            Some(json!({ "hostel_id": "x", "room_id": "y", "hostel_fee": "300" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(!message.contains("UUID"));

    let (status, body) = app.send(Method::GET, "/api/bookings/not-a-uuid", Some(&student), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid path parameter");

    let (status, body) = app
        .send(Method::GET, "/api/notifications?unread_only=maybe", Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid query parameters");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/bookings")
        .header(header::AUTHORIZATION, format!("Bearer {}", student))
        .body(Body::from("{}"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_with_open_checkout_cannot_be_deleted() {
    let app = TestApp::new();
    let (_, landlord) = app.user("Kofi", Role::Landlord).await;
    let (_, admin) = app.user("Root", Role::Admin).await;
    let (_, student) = app.user("Ama", Role::Student).await;
    let (hostel_id, room_id) = app.approved_listing(&landlord, &admin).await;
    let (_, booking) = app.book(&student, &hostel_id, &room_id).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/payments/initialize",
            Some(&student),
            Some(json!({ "booking_id": booking["id"], "amount": "100.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/bookings/{}", booking["id"].as_str().unwrap());
    let (status, body) = app.send(Method::DELETE, &uri, Some(&student), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("payment records"));

    let (status, body) = app.send(Method::DELETE, &format!("/api/hostels/{}", hostel_id), Some(&landlord), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("payment records"));
    assert_eq!(app.store.payments().await.len(), 1);
}
