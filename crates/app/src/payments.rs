//! Payment Gateway
//!
//! Online payments go through a round trip: the gateway creates a payment
//! order for an amount, the payer approves it through a [`PayerApproval`],
//! and a capture call collects the funds. The capture payload is kept
//! verbatim as the order's payment details.

use std::fmt;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use mockall::automock;
use reqwest::{Client, StatusCode, header};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::{Value, json};
use storefront::orders::PaymentDetails;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Errors raised by the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway could not be reached or its body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway refused our credentials.
    #[error("payment gateway authentication failed: {0}")]
    Authentication(String),

    /// The payment was declined or not completed.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The payer did not approve the payment.
    #[error("payment not approved: {0}")]
    NotApproved(String),

    /// The amount cannot be charged.
    #[error("invalid payment amount {0}")]
    InvalidAmount(Decimal),

    /// The gateway answered with something unexpected.
    #[error("unexpected response from payment gateway: {0}")]
    UnexpectedResponse(String),
}

impl PaymentError {
    /// Whether the payer's payment itself failed, as opposed to the transport.
    pub fn is_declined(&self) -> bool {
        matches!(
            self,
            Self::Declined(_) | Self::NotApproved(_) | Self::InvalidAmount(_)
        )
    }
}

/// Identifier of a payment order on the gateway side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct GatewayOrderId(String);

impl GatewayOrderId {
    /// Wrap a gateway order id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GatewayOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A payment order waiting for the payer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPayment {
    /// Gateway order to capture once approved
    pub id: GatewayOrderId,

    /// Where the payer approves the payment, if the gateway sent one
    pub approve_url: Option<String>,
}

/// Third-party payment order creation and capture.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment order for `amount`.
    async fn create_order(
        &self,
        amount: Decimal,
        submission: Uuid,
    ) -> Result<PendingPayment, PaymentError>;

    /// Collect the funds for an approved payment order.
    async fn capture(&self, order: &GatewayOrderId) -> Result<PaymentDetails, PaymentError>;
}

/// Puts a pending payment in front of the payer and waits for their answer.
#[automock]
#[async_trait]
pub trait PayerApproval: Send + Sync {
    /// Resolve once the payer has approved `payment`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotApproved`] when the payer cancels.
    async fn approve(&self, payment: &PendingPayment) -> Result<(), PaymentError>;
}

/// `PayPal` REST credentials.
#[derive(Clone)]
pub struct PayPalConfig {
    /// API root, e.g. `"https://api-m.sandbox.paypal.com"`.
    pub base_url: String,

    /// OAuth client id.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: Zeroizing<String>,

    /// ISO currency code charged in.
    pub currency: String,
}

impl fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"**redacted**")
            .field("currency", &self.currency)
            .finish()
    }
}

/// [`PaymentGateway`] over the `PayPal` Orders v2 API.
#[derive(Debug, Clone)]
pub struct PayPalGateway {
    config: PayPalConfig,
    http: Client,
}

impl PayPalGateway {
    /// Create a gateway client from the given credentials.
    #[must_use]
    pub fn new(config: PayPalConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn access_token(&self) -> Result<Zeroizing<String>, PaymentError> {
        let credentials = Zeroizing::new(format!(
            "{}:{}",
            self.config.client_id,
            self.config.client_secret.as_str()
        ));

        let response = self
            .http
            .post(self.url("/v1/oauth2/token"))
            .header(
                header::AUTHORIZATION,
                format!("Basic {}", BASE64.encode(credentials.as_bytes())),
            )
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(PaymentError::Authentication(format!(
                "token request failed with status {status}: {text}"
            )));
        }

        let parsed: TokenResponse = response.json().await?;

        Ok(Zeroizing::new(parsed.access_token))
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    async fn create_order(
        &self,
        amount: Decimal,
        submission: Uuid,
    ) -> Result<PendingPayment, PaymentError> {
        let body = order_request(amount, &self.config.currency)?;
        let token = self.access_token().await?;

        let response = self
            .http
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token.as_str())
            .header("PayPal-Request-Id", submission.to_string())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(PaymentError::UnexpectedResponse(format!(
                "order creation failed with status {status}: {text}"
            )));
        }

        let created: CreatedPaymentOrder = response.json().await?;

        debug!(gateway_order = %created.id, status = %created.status, "payment order created");

        Ok(created.into_pending())
    }

    async fn capture(&self, order: &GatewayOrderId) -> Result<PaymentDetails, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(self.url(&format!("/v2/checkout/orders/{order}/capture")))
            .bearer_auth(token.as_str())
            .json(&json!({}))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        capture_outcome(status, body)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPaymentOrder {
    id: GatewayOrderId,
    #[serde(default)]
    status: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

impl CreatedPaymentOrder {
    fn into_pending(self) -> PendingPayment {
        let approve_url = self
            .links
            .into_iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href);

        PendingPayment {
            id: self.id,
            approve_url,
        }
    }
}

/// Amount as the gateway expects it: two decimal places, half away from zero.
pub fn format_amount(amount: Decimal) -> Result<String, PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(amount));
    }

    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(format!("{rounded:.2}"))
}

fn order_request(amount: Decimal, currency: &str) -> Result<Value, PaymentError> {
    Ok(json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "amount": {
                "currency_code": currency,
                "value": format_amount(amount)?,
            }
        }]
    }))
}

/// Interpret a capture response.
///
/// Only a `COMPLETED` capture counts as paid. Unprocessable-entity answers are
/// declines (e.g. `INSTRUMENT_DECLINED`), except `ORDER_NOT_APPROVED`, which
/// means the payer never approved. Anything else non-2xx is unexpected.
fn capture_outcome(status: StatusCode, body: Value) -> Result<PaymentDetails, PaymentError> {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        let issue = body
            .pointer("/details/0/issue")
            .or_else(|| body.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("UNPROCESSABLE_ENTITY");

        if issue == "ORDER_NOT_APPROVED" {
            return Err(PaymentError::NotApproved(issue.to_string()));
        }

        return Err(PaymentError::Declined(issue.to_string()));
    }

    if !status.is_success() {
        return Err(PaymentError::UnexpectedResponse(format!(
            "capture failed with status {status}: {body}"
        )));
    }

    let details = PaymentDetails::new(body);

    if !details.is_completed() {
        let reported = details.status().unwrap_or("missing").to_string();

        warn!(status = %reported, "capture did not complete");

        return Err(PaymentError::Declined(format!("capture status {reported}")));
    }

    Ok(details)
}
