use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostel_core::payment::{
    ChargeBearer, Checkout, CheckoutRequest, GatewayError, GatewayResult, GatewayTransactionStatus, PaymentGateway, PaymentMethod,
    SubaccountRequest, TransactionVerification,
};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app_config::PaystackConfig;

/// Paystack amounts are integers in the currency's minor unit.
fn to_minor_units(amount: Decimal) -> GatewayResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| GatewayError::RequestFailed(format!("amount {} out of range", amount)))
}

fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

#[derive(Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Serialize)]
struct SubaccountBody<'a> {
    business_name: &'a str,
    settlement_bank: &'a str,
    account_number: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    percentage_charge: Decimal,
    primary_contact_email: &'a str,
}

#[derive(Deserialize)]
struct SubaccountData {
    subaccount_code: String,
}

#[derive(Serialize)]
struct InitializeBody<'a> {
    reference: &'a str,
    email: &'a str,
    amount: i64,
    currency: &'a str,
    channels: Vec<&'static str>,
    subaccount: &'a str,
    /// Flat amount, in minor units, kept by the main account.
    transaction_charge: i64,
    bearer: ChargeBearer,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Deserialize)]
struct VerifyData {
    reference: String,
    status: GatewayTransactionStatus,
    amount: i64,
    currency: String,
    channel: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    gateway_response: Option<String>,
    customer: Customer,
}

#[derive(Deserialize)]
struct Customer {
    email: String,
}

/// Paystack REST client with split settlement to landlord sub-accounts.
#[derive(Clone)]
pub struct PaystackClient {
    http: Client,
    base_url: String,
    secret_key: String,
    callback_url: Option<String>,
}

impl PaystackClient {
    pub fn new(config: &PaystackConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            callback_url: config.callback_url.clone(),
        }
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> GatewayResult<(StatusCode, Envelope<T>)> {
        let status = response.status();
        let envelope = response
            .json::<Envelope<T>>()
            .await
            .map_err(|e| GatewayError::ResponseParseFailed(e.to_string()))?;
        Ok((status, envelope))
    }

    fn unwrap_data<T>(status: StatusCode, envelope: Envelope<T>) -> GatewayResult<T> {
        if !status.is_success() || !envelope.status {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: envelope.message,
            });
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::ResponseParseFailed("response carried no data".to_string()))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> GatewayResult<T> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
        let (status, envelope) = Self::read(response).await?;
        Self::unwrap_data(status, envelope)
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn create_subaccount(&self, request: &SubaccountRequest) -> GatewayResult<String> {
        let body = SubaccountBody {
            business_name: &request.business_name,
            settlement_bank: &request.bank_code,
            account_number: &request.account_number,
            percentage_charge: request.percentage_charge,
            primary_contact_email: &request.contact_email,
        };
        let data: SubaccountData = self.post("/subaccount", &body).await?;
        debug!(subaccount = %data.subaccount_code, "Created payout sub-account");
        Ok(data.subaccount_code)
    }

    async fn initialize_transaction(&self, request: &CheckoutRequest) -> GatewayResult<Checkout> {
        let amount = to_minor_units(request.amount)?;
        let platform_share = request.amount * request.split.shares.platform_percent / Decimal::ONE_HUNDRED;

        let body = InitializeBody {
            reference: &request.reference,
            email: &request.email,
            amount,
            currency: &request.currency,
            channels: request.channels.iter().map(PaymentMethod::as_str).collect(),
            subaccount: &request.split.subaccount_code,
            transaction_charge: to_minor_units(platform_share)?,
            bearer: request.split.bearer,
            callback_url: self.callback_url.as_deref(),
            metadata: &request.metadata,
        };
        let data: InitializeData = self.post("/transaction/initialize", &body).await?;
        Ok(Checkout {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    async fn verify_transaction(&self, reference: &str) -> GatewayResult<TransactionVerification> {
        let response = self
            .http
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        let (status, envelope) = Self::read::<VerifyData>(response).await?;
        if status == StatusCode::NOT_FOUND || (status == StatusCode::BAD_REQUEST && envelope.data.is_none()) {
            warn!(reference, message = %envelope.message, "Gateway does not know the reference");
            return Err(GatewayError::UnknownTransaction(reference.to_string()));
        }
        let data = Self::unwrap_data(status, envelope)?;

        Ok(TransactionVerification {
            reference: data.reference,
            status: data.status,
            amount: from_minor_units(data.amount),
            currency: data.currency,
            customer_email: data.customer.email,
            channel: data.channel,
            paid_at: data.paid_at,
            gateway_response: data.gateway_response,
        })
    }
}
