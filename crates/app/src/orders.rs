//! Order Service
//!
//! Client for the storefront's order endpoints. Responses use a
//! `status: "success" | "error"` envelope around the payload.

use async_trait::async_trait;
use mockall::automock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use storefront::orders::{NewOrder, Order, OrderId, OrderLookup, OrderStatus};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors returned by the order service.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The request could not be sent or the body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error envelope.
    #[error("order service rejected the request: {0}")]
    Rejected(String),

    /// The response was not the expected shape.
    #[error("unexpected response from order service: {0}")]
    UnexpectedResponse(String),

    /// No matching order or customer.
    #[error("not found")]
    NotFound,
}

/// Persists orders and serves them back.
#[automock]
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Persist an order, returning its identifier.
    ///
    /// Repeating a call with the same `submission` key must not create a
    /// second order.
    async fn create_order(
        &self,
        order: &NewOrder,
        submission: Uuid,
    ) -> Result<OrderId, OrderServiceError>;

    /// List the orders visible to `lookup`.
    async fn list_orders(&self, lookup: &OrderLookup) -> Result<Vec<Order>, OrderServiceError>;

    /// Move an order to a new status. Back-office only.
    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), OrderServiceError>;
}

/// Order API connection settings.
#[derive(Debug, Clone)]
pub struct OrderApiConfig {
    /// API root, e.g. `"https://shop.example.com/api"`.
    pub base_url: String,
}

/// [`OrderService`] over the storefront REST API.
#[derive(Debug, Clone)]
pub struct HttpOrderService {
    config: OrderApiConfig,
    http: Client,
}

impl HttpOrderService {
    /// Create a client for the given API.
    #[must_use]
    pub fn new(config: OrderApiConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl OrderService for HttpOrderService {
    async fn create_order(
        &self,
        order: &NewOrder,
        submission: Uuid,
    ) -> Result<OrderId, OrderServiceError> {
        let response = self
            .http
            .post(self.url("/orders"))
            .header("Idempotency-Key", submission.to_string())
            .json(order)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let created: CreatedOrder = parse_envelope(status, &body)?;

        debug!(order_id = %created.order_id, "order created");

        Ok(created.order_id)
    }

    async fn list_orders(&self, lookup: &OrderLookup) -> Result<Vec<Order>, OrderServiceError> {
        let response = self
            .http
            .get(self.url("/orders"))
            .query(&[lookup.query()])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let listing: OrderListing = parse_envelope(status, &body)?;

        Ok(listing.into_orders())
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), OrderServiceError> {
        let response = self
            .http
            .put(self.url(&format!("/orders/{id}/status")))
            .json(&json!({ "status": status }))
            .send()
            .await?;

        let code = response.status();
        let body = response.text().await?;

        let _: Value = parse_envelope(code, &body)?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Envelope<T> {
    Success(T),
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct CreatedOrder {
    #[serde(alias = "orderId", alias = "id")]
    order_id: OrderId,
}

#[derive(Debug, Deserialize)]
struct OrderListing {
    #[serde(default, alias = "data")]
    orders: Vec<Value>,
}

impl OrderListing {
    /// Malformed records are skipped rather than failing the whole listing.
    fn into_orders(self) -> Vec<Order> {
        self.orders
            .into_iter()
            .filter_map(|raw| {
                serde_json::from_value(raw)
                    .inspect_err(|source| warn!(%source, "skipping malformed order record"))
                    .ok()
            })
            .collect()
    }
}

fn parse_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<T, OrderServiceError> {
    if status == StatusCode::NOT_FOUND {
        return Err(OrderServiceError::NotFound);
    }

    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|source| {
        OrderServiceError::UnexpectedResponse(format!("status {status}: {source}"))
    })?;

    match envelope {
        Envelope::Success(payload) if status.is_success() => Ok(payload),
        Envelope::Success(_) => Err(OrderServiceError::UnexpectedResponse(format!(
            "success envelope with status {status}"
        ))),
        Envelope::Error { message } => Err(OrderServiceError::Rejected(
            message.unwrap_or_else(|| format!("status {status}")),
        )),
    }
}

/// What the order history screen shows.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderHistoryView {
    /// No orders matched; an empty state, not an error.
    Empty,

    /// Orders, newest first.
    Orders(Vec<Order>),
}

/// Fetch the orders for `lookup`, newest first.
///
/// # Errors
///
/// Returns transport and envelope errors; a not-found answer is
/// [`OrderHistoryView::Empty`].
pub async fn order_history(
    service: &dyn OrderService,
    lookup: &OrderLookup,
) -> Result<OrderHistoryView, OrderServiceError> {
    let mut orders = match service.list_orders(lookup).await {
        Ok(orders) => orders,
        Err(OrderServiceError::NotFound) => Vec::new(),
        Err(error) => return Err(error),
    };

    if orders.is_empty() {
        return Ok(OrderHistoryView::Empty);
    }

    orders.sort_by(|left, right| right.created_at.cmp(&left.created_at));

    Ok(OrderHistoryView::Orders(orders))
}

/// Find one order among those visible to `lookup`.
///
/// # Errors
///
/// Returns transport and envelope errors; an unknown id is `Ok(None)`.
pub async fn find_order(
    service: &dyn OrderService,
    lookup: &OrderLookup,
    id: &OrderId,
) -> Result<Option<Order>, OrderServiceError> {
    Ok(match order_history(service, lookup).await? {
        OrderHistoryView::Empty => None,
        OrderHistoryView::Orders(orders) => orders.into_iter().find(|order| &order.id == id),
    })
}

/// Apply a back-office status change after checking it is a legal move.
///
/// # Errors
///
/// Returns [`OrderServiceError::Rejected`] for an illegal transition without
/// calling the service.
pub async fn change_status(
    service: &dyn OrderService,
    order: &Order,
    next: OrderStatus,
) -> Result<(), OrderServiceError> {
    if !order.status.can_transition_to(next) {
        return Err(OrderServiceError::Rejected(format!(
            "cannot move order {} from {} to {next}",
            order.id, order.status
        )));
    }

    service.update_status(&order.id, next).await
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;

    fn order(id: &str, created_at: &str, status: OrderStatus) -> Result<Order, jiff::Error> {
        Ok(Order {
            id: OrderId::from(id),
            user_id: None,
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            shipping: storefront::checkout::ShippingDetails::default(),
            payment_method: storefront::checkout::PaymentMethod::CashOnDelivery,
            payment_details: None,
            status,
            created_at: Some(created_at.parse::<Timestamp>()?),
        })
    }

    #[test]
    fn success_envelope_yields_order_id() -> TestResult {
        let created: CreatedOrder = parse_envelope(
            StatusCode::CREATED,
            r#"{ "status": "success", "order_id": 42 }"#,
        )?;

        assert_eq!(created.order_id, OrderId::from("42"));

        Ok(())
    }

    #[test]
    fn error_envelope_is_rejected_with_message() {
        let result = parse_envelope::<CreatedOrder>(
            StatusCode::BAD_REQUEST,
            r#"{ "status": "error", "message": "email is required" }"#,
        );

        assert!(
            matches!(result, Err(OrderServiceError::Rejected(ref message)) if message == "email is required"),
            "{result:?}"
        );
    }

    #[test]
    fn malformed_body_is_unexpected() {
        let result = parse_envelope::<CreatedOrder>(StatusCode::OK, "<html>");

        assert!(matches!(result, Err(OrderServiceError::UnexpectedResponse(_))));
    }

    #[test]
    fn not_found_status_short_circuits() {
        let result = parse_envelope::<OrderListing>(StatusCode::NOT_FOUND, "");

        assert!(matches!(result, Err(OrderServiceError::NotFound)));
    }

    #[test]
    fn listing_skips_malformed_records() -> TestResult {
        let listing: OrderListing = parse_envelope(
            StatusCode::OK,
            r#"{
                "status": "success",
                "data": [
                    { "id": "1", "total_amount": 10, "status": "shipped" },
                    { "id": "2" }
                ]
            }"#,
        )?;

        let orders = listing.into_orders();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders.first().map(|order| order.status), Some(OrderStatus::Shipped));

        Ok(())
    }

    #[tokio::test]
    async fn not_found_history_is_empty_state() -> TestResult {
        let mut service = MockOrderService::new();

        service
            .expect_list_orders()
            .once()
            .returning(|_| Err(OrderServiceError::NotFound));

        let lookup = OrderLookup::guest("nobody@example.com")?;

        assert_eq!(
            order_history(&service, &lookup).await?,
            OrderHistoryView::Empty
        );

        Ok(())
    }

    #[tokio::test]
    async fn history_is_newest_first_and_find_matches_id() -> TestResult {
        let older = order("1", "2026-01-01T00:00:00Z", OrderStatus::Delivered)?;
        let newer = order("2", "2026-02-01T00:00:00Z", OrderStatus::Pending)?;
        let listed = vec![older.clone(), newer.clone()];

        let mut service = MockOrderService::new();

        service
            .expect_list_orders()
            .times(2)
            .withf(|lookup| lookup.query() == ("user_id", "u-1"))
            .returning(move |_| Ok(listed.clone()));

        let lookup = OrderLookup::User("u-1".into());

        assert_eq!(
            order_history(&service, &lookup).await?,
            OrderHistoryView::Orders(vec![newer, older.clone()])
        );
        assert_eq!(
            find_order(&service, &lookup, &OrderId::from("1")).await?,
            Some(older)
        );

        Ok(())
    }

    #[tokio::test]
    async fn illegal_status_change_never_reaches_service() -> TestResult {
        let mut service = MockOrderService::new();

        service.expect_update_status().never();

        let delivered = order("1", "2026-01-01T00:00:00Z", OrderStatus::Delivered)?;
        let result = change_status(&service, &delivered, OrderStatus::Cancelled).await;

        assert!(matches!(result, Err(OrderServiceError::Rejected(_))));

        Ok(())
    }

    #[tokio::test]
    async fn legal_status_change_is_sent() -> TestResult {
        let mut service = MockOrderService::new();

        service
            .expect_update_status()
            .once()
            .withf(|id, status| id.as_str() == "1" && *status == OrderStatus::Shipped)
            .returning(|_, _| Ok(()));

        let pending = order("1", "2026-01-01T00:00:00Z", OrderStatus::Pending)?;

        change_status(&service, &pending, OrderStatus::Shipped).await?;

        Ok(())
    }
}
