//! Checkout Session
//!
//! Drives one shopper's checkout: the details form, the step machine and the
//! order submission. Submissions run as spawned tasks that only hold a weak
//! reference to the session, so a task resolving after the session is gone
//! cannot move it to a later step.
//!
//! A submission works from the cart and totals captured when it started.
//! Edits made while it runs do not change what is charged or ordered, and the
//! step machine stays on the payment step until the task resolves. A captured
//! payment is only reused for a retry when the cart still matches what was
//! paid for.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use rust_decimal::Decimal;
use storefront::{
    cart::Cart,
    checkout::{
        CheckoutDraft, CheckoutFlow, CheckoutStep, PaymentMethod, ShippingDetails, TransitionError,
    },
    customers::{CustomerProfile, UserId},
    orders::{NewOrder, OrderId, PaymentDetails},
    pricing::{RateCalculator, Totals},
};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    cart_store::CartStore,
    geolocation::{self, AddressLocator, Coordinates},
    notifications::NotificationChannel,
    orders::{OrderService, OrderServiceError},
    payments::{GatewayOrderId, PayerApproval, PaymentError, PaymentGateway},
};

/// Errors returned by checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The step machine refused the action.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A submission is already running.
    #[error("an order submission is already in progress")]
    SubmissionInFlight,

    /// Online payment was selected but no gateway is configured.
    #[error("online payment is not available")]
    PaymentUnavailable,

    /// Online payment was selected for an order that costs nothing.
    #[error("online payment needs a total above zero")]
    NothingToCharge,

    /// A payment was captured for a cart that has since changed.
    #[error("payment of {captured} was taken for a different cart (total now {total})")]
    StaleCapture {
        /// Amount the earlier capture collected
        captured: Decimal,
        /// Total of the cart being submitted
        total: Decimal,
    },

    /// The payment gateway failed or declined.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The order could not be persisted.
    #[error(transparent)]
    Order(#[from] OrderServiceError),

    /// The session ended before the payment was captured.
    #[error("checkout was abandoned")]
    Abandoned,

    /// The submission task did not run to completion.
    #[error("order submission task failed: {0}")]
    Task(#[from] JoinError),
}

/// A payment gateway paired with the way its payers approve payments.
#[derive(Clone)]
pub struct OnlinePayments {
    /// Creates and captures payment orders
    pub gateway: Arc<dyn PaymentGateway>,

    /// Waits for the payer between creation and capture
    pub approval: Arc<dyn PayerApproval>,
}

/// Collaborators a checkout session submits through.
#[derive(Clone)]
pub struct CheckoutServices {
    /// Order persistence
    pub orders: Arc<dyn OrderService>,

    /// Online payments, if configured
    pub payments: Option<OnlinePayments>,

    /// Shipping and tax policy
    pub rates: Arc<dyn RateCalculator>,
}

impl fmt::Debug for CheckoutServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutServices")
            .field("payments", &self.payments.is_some())
            .field("rates", &self.rates)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct SessionState {
    flow: CheckoutFlow,
    draft: CheckoutDraft,
    in_flight: bool,
    submission: Uuid,
    captured: Option<CapturedPayment>,
}

impl SessionState {
    /// The cart is only allowed to move the flow while nothing is submitting.
    fn sync_cart(&mut self, cart_is_empty: bool) {
        if !self.in_flight {
            self.flow.sync_cart(cart_is_empty);
        }
    }

    fn discard_capture(&mut self, reason: &'static str) {
        if let Some(stale) = self.captured.take() {
            stale.discard(reason);
        }
    }
}

/// A capture kept for retrying the order post, with what it paid for.
#[derive(Debug, Clone)]
struct CapturedPayment {
    cart: Cart,
    amount: Decimal,
    details: PaymentDetails,
}

impl CapturedPayment {
    fn covers(&self, cart: &Cart, total: Decimal) -> bool {
        self.amount == total && self.cart == *cart
    }

    /// The funds stay captured at the gateway and need a manual refund.
    fn discard(self, reason: &'static str) {
        warn!(
            transaction = self.details.transaction_id().unwrap_or("unknown"),
            amount = %self.amount,
            reason,
            "captured payment discarded"
        );
    }
}

/// One shopper's checkout.
///
/// Dropping the session abandons the checkout; submissions still running
/// finish on their own but no longer touch it.
pub struct CheckoutSession {
    id: Uuid,
    state: Arc<Mutex<SessionState>>,
    cart: CartStore,
    services: CheckoutServices,
    user: Option<UserId>,
}

impl fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl CheckoutSession {
    /// Enter checkout, pre-filling the form from `profile` when signed in.
    pub fn start(
        cart: CartStore,
        services: CheckoutServices,
        profile: Option<&CustomerProfile>,
    ) -> Self {
        let flow = CheckoutFlow::new(cart.is_cart_empty());
        let draft = profile.map(CheckoutDraft::prefilled).unwrap_or_default();
        let id = Uuid::now_v7();

        info!(session = %id, step = flow.step().name(), "checkout started");

        Self {
            id,
            state: Arc::new(Mutex::new(SessionState {
                flow,
                draft,
                in_flight: false,
                submission: Uuid::now_v7(),
                captured: None,
            })),
            cart,
            services,
            user: profile.and_then(|profile| profile.id.clone()),
        }
    }

    /// Session identifier used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The current step, after reconciling with the cart.
    pub fn step(&self) -> CheckoutStep {
        let mut state = self.lock();

        state.sync_cart(self.cart.is_cart_empty());
        state.flow.step().clone()
    }

    /// A copy of the form.
    pub fn draft(&self) -> CheckoutDraft {
        self.lock().draft.clone()
    }

    /// Edit the form.
    pub fn edit_draft(&self, edit: impl FnOnce(&mut CheckoutDraft)) {
        edit(&mut self.lock().draft);
    }

    /// Choose how to pay.
    pub fn select_payment_method(&self, method: PaymentMethod) {
        self.lock().draft.payment_method = method;
    }

    /// Whether a submission is running; the submit control should be disabled.
    pub fn is_submitting(&self) -> bool {
        self.lock().in_flight
    }

    /// Totals the shopper would be charged right now.
    pub fn totals(&self) -> Totals {
        self.cart.totals(self.services.rates.as_ref())
    }

    /// Try to fill blank address fields from the shopper's position.
    ///
    /// Never fails; a denied or failed lookup leaves the form as it was.
    pub async fn autofill_address(
        &self,
        locator: &dyn AddressLocator,
        position: Option<Coordinates>,
    ) -> bool {
        let Some(located) = geolocation::locate_address(locator, position).await else {
            return false;
        };

        self.lock().draft.apply_located_address(located);

        true
    }

    /// Validate the form and move to the payment step.
    ///
    /// # Errors
    ///
    /// Returns the field-level failures, or a transition error when not on
    /// the details step. Nothing is sent anywhere.
    pub fn submit_details(&self) -> Result<(), CheckoutError> {
        let mut state = self.lock();
        let state = &mut *state;

        state.sync_cart(self.cart.is_cart_empty());
        state.flow.submit_details(&state.draft)?;

        debug!(session = %self.id, "details accepted");

        Ok(())
    }

    /// Return from payment to the details step, keeping the form.
    ///
    /// A payment captured by an earlier attempt is dropped; the next
    /// submission charges afresh.
    ///
    /// # Errors
    ///
    /// Returns an error while a submission is running or outside the payment
    /// step.
    pub fn back(&self) -> Result<(), CheckoutError> {
        let mut state = self.lock();

        if state.in_flight {
            return Err(CheckoutError::SubmissionInFlight);
        }

        state.flow.back()?;
        state.submission = Uuid::now_v7();
        state.discard_capture("returned to details");

        Ok(())
    }

    /// Start submitting the order.
    ///
    /// Returns the running submission. While it runs, further calls are
    /// refused with [`CheckoutError::SubmissionInFlight`], so one checkout
    /// never creates two orders.
    ///
    /// # Errors
    ///
    /// Returns an error without contacting any service if a submission is
    /// already running, the flow is not on the payment step, or online
    /// payment is selected with no gateway configured or nothing to charge.
    /// Returns [`CheckoutError::StaleCapture`] when an earlier capture no
    /// longer matches the cart; that capture is dropped and the next
    /// submission charges the current total.
    pub fn place_order(&self) -> Result<JoinHandle<Result<OrderId, CheckoutError>>, CheckoutError> {
        let submission = {
            let mut state = self.lock();

            if state.in_flight {
                return Err(CheckoutError::SubmissionInFlight);
            }

            let cart = self.cart.cart();

            state.sync_cart(cart.is_empty());

            let Some(shipping) = state.flow.shipping_details().cloned() else {
                return Err(TransitionError::NotAllowed {
                    step: state.flow.step().name(),
                    action: "place order",
                }
                .into());
            };

            let method = state.draft.payment_method;
            let totals = Totals::calculate(cart.subtotal(), self.services.rates.as_ref());

            if method == PaymentMethod::Online {
                if self.services.payments.is_none() {
                    return Err(CheckoutError::PaymentUnavailable);
                }

                if !totals.is_payable() {
                    self.cart
                        .notifications()
                        .error("There is nothing to pay online. Choose cash on delivery.");

                    return Err(CheckoutError::NothingToCharge);
                }
            }

            let captured = match state.captured.take() {
                Some(captured)
                    if method == PaymentMethod::Online && captured.covers(&cart, totals.total) =>
                {
                    Some(captured.details)
                }
                Some(stale) => {
                    let error = CheckoutError::StaleCapture {
                        captured: stale.amount,
                        total: totals.total,
                    };

                    stale.discard("cart changed after capture");

                    self.cart.notifications().error(
                        "Your cart changed after payment was taken. Review your order and submit again.",
                    );

                    return Err(error);
                }
                None => None,
            };

            state.in_flight = true;

            Submission {
                key: state.submission,
                method,
                shipping,
                cart,
                totals,
                captured,
            }
        };

        let span = info_span!(
            "checkout.submit",
            session = %self.id,
            method = submission.method.as_str(),
            submission = %submission.key,
        );

        let task = SubmissionTask {
            state: Arc::downgrade(&self.state),
            cart: self.cart.clone(),
            services: self.services.clone(),
            user: self.user.clone(),
        };

        Ok(tokio::spawn(task.run(submission).instrument(span)))
    }

    /// Submit and wait for the outcome.
    ///
    /// # Errors
    ///
    /// See [`CheckoutSession::place_order`]; also returns the gateway or order
    /// service failure, after it has been reported to the shopper.
    pub async fn submit(&self) -> Result<OrderId, CheckoutError> {
        self.place_order()?.await?
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct Submission {
    key: Uuid,
    method: PaymentMethod,
    shipping: ShippingDetails,
    cart: Cart,
    totals: Totals,
    captured: Option<PaymentDetails>,
}

struct SubmissionTask {
    state: Weak<Mutex<SessionState>>,
    cart: CartStore,
    services: CheckoutServices,
    user: Option<UserId>,
}

impl SubmissionTask {
    async fn run(self, submission: Submission) -> Result<OrderId, CheckoutError> {
        let outcome = self.execute(submission).await;

        match &outcome {
            Ok(order_id) => self.confirmed(order_id.clone()),
            Err(error) => self.failed(error),
        }

        outcome
    }

    async fn execute(&self, submission: Submission) -> Result<OrderId, CheckoutError> {
        let Submission {
            key,
            method,
            shipping,
            cart,
            totals,
            captured,
        } = submission;

        let mut order =
            NewOrder::from_cart(&cart, shipping, method, &totals).with_user(self.user.clone());

        if method == PaymentMethod::Online {
            let details = match captured {
                Some(details) => {
                    debug!("reusing captured payment");

                    details
                }
                None => self.capture(&cart, totals.total, key).await?,
            };

            order = order.with_payment_details(details);
        }

        let order_id = self
            .services
            .orders
            .create_order(&order, key)
            .await?;

        info!(%order_id, total = %totals.total, "order placed");

        Ok(order_id)
    }

    async fn capture(
        &self,
        cart: &Cart,
        amount: Decimal,
        key: Uuid,
    ) -> Result<PaymentDetails, CheckoutError> {
        let online = self
            .services
            .payments
            .as_ref()
            .ok_or(CheckoutError::PaymentUnavailable)?;

        let pending = online.gateway.create_order(amount, key).await?;

        self.ensure_open(&pending.id)?;

        online.approval.approve(&pending).await?;

        self.ensure_open(&pending.id)?;

        let details = online.gateway.capture(&pending.id).await?;

        if let Some(state) = self.state.upgrade() {
            lock(&state).captured = Some(CapturedPayment {
                cart: cart.clone(),
                amount,
                details: details.clone(),
            });
        }

        Ok(details)
    }

    fn ensure_open(&self, gateway_order: &GatewayOrderId) -> Result<(), CheckoutError> {
        if self.state.strong_count() == 0 {
            info!(%gateway_order, "checkout abandoned before capture");

            return Err(CheckoutError::Abandoned);
        }

        Ok(())
    }

    /// The flow is confirmed before the cart is cleared, so no step read in
    /// between sees an empty cart on the payment step.
    fn confirmed(&self, order_id: OrderId) {
        let confirmation = self.state.upgrade().map(|state| {
            let mut state = lock(&state);

            state.in_flight = false;
            state.captured = None;
            state.flow.confirm(order_id.clone())
        });

        self.cart.clear_cart();

        match confirmation {
            None => info!(%order_id, "order placed after checkout was closed"),
            Some(Err(error)) => {
                warn!(%order_id, %error, "order placed but checkout could not be confirmed");
            }
            Some(Ok(())) => self
                .cart
                .notifications()
                .success(format!("Order #{order_id} placed")),
        }
    }

    fn failed(&self, error: &CheckoutError) {
        let Some(state) = self.state.upgrade() else {
            debug!(%error, "submission failed after checkout was closed");

            return;
        };

        lock(&state).in_flight = false;

        warn!(%error, "order submission failed");

        report(self.cart.notifications(), error);
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn report(notifications: &NotificationChannel, error: &CheckoutError) {
    let message = match error {
        CheckoutError::Payment(PaymentError::NotApproved(_)) => {
            "The payment was not approved. No order was placed.".to_string()
        }
        CheckoutError::Payment(payment) if payment.is_declined() => {
            "Your payment was declined. No order was placed.".to_string()
        }
        CheckoutError::Payment(_) => {
            "We couldn't reach the payment provider. Please try again.".to_string()
        }
        CheckoutError::Order(OrderServiceError::Rejected(reason)) => {
            format!("Your order could not be placed: {reason}")
        }
        _ => "Something went wrong placing your order. Please try again.".to_string(),
    };

    notifications.error(message);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;
    use storefront::{
        notifications::Severity,
        orders::{Order, OrderLookup, OrderStatus},
        pricing::ZeroRates,
        products::{ProductId, ProductSnapshot},
    };
    use testresult::TestResult;
    use tokio::sync::Notify;

    use crate::{
        orders::MockOrderService,
        payments::{MockPayerApproval, MockPaymentGateway, PendingPayment},
        persistence::MemoryStore,
    };

    use super::*;

    fn cart_with_items() -> Result<CartStore, Box<dyn std::error::Error>> {
        let cart = CartStore::load(Arc::new(MemoryStore::new()), NotificationChannel::new());

        cart.add_to_cart(ProductSnapshot::new("P1", "Lamp", Decimal::from(50))?, 2)?;
        cart.add_to_cart(ProductSnapshot::new("P2", "Pen", Decimal::from(30))?, 1)?;

        Ok(cart)
    }

    fn approving() -> MockPayerApproval {
        let mut approval = MockPayerApproval::new();
        approval.expect_approve().returning(|_| Ok(()));

        approval
    }

    fn online(gateway: MockPaymentGateway, approval: MockPayerApproval) -> OnlinePayments {
        OnlinePayments {
            gateway: Arc::new(gateway),
            approval: Arc::new(approval),
        }
    }

    fn services(orders: impl OrderService + 'static, payments: Option<MockPaymentGateway>) -> CheckoutServices {
        CheckoutServices {
            orders: Arc::new(orders),
            payments: payments.map(|gateway| online(gateway, approving())),
            rates: Arc::new(ZeroRates),
        }
    }

    fn pending(id: &str) -> PendingPayment {
        PendingPayment {
            id: GatewayOrderId::new(id),
            approve_url: None,
        }
    }

    fn fill(draft: &mut CheckoutDraft) {
        draft.email = "ada@example.com".to_string();
        draft.name = "Ada Lovelace".to_string();
        draft.address = "12 St James's Square".to_string();
        draft.city = "London".to_string();
        draft.postal_code = "SW1Y 4JH".to_string();
        draft.phone = "+44 20 7946 0000".to_string();
    }

    fn completed_capture() -> PaymentDetails {
        PaymentDetails::new(json!({ "id": "PAY-1", "status": "COMPLETED" }))
    }

    #[tokio::test]
    async fn empty_cart_never_reaches_details() {
        let cart = CartStore::load(Arc::new(MemoryStore::new()), NotificationChannel::new());

        let mut orders = MockOrderService::new();
        orders.expect_create_order().never();

        let session = CheckoutSession::start(cart, services(orders, None), None);

        assert_eq!(session.step(), CheckoutStep::Empty);
        assert!(matches!(
            session.submit_details(),
            Err(CheckoutError::Transition(TransitionError::EmptyCart))
        ));
        assert!(session.place_order().is_err());
        assert_eq!(session.step(), CheckoutStep::Empty);
    }

    #[tokio::test]
    async fn invalid_details_make_no_network_call() -> TestResult {
        let mut orders = MockOrderService::new();
        orders.expect_create_order().never();

        let session = CheckoutSession::start(cart_with_items()?, services(orders, None), None);

        session.edit_draft(|draft| draft.email = "ada@".to_string());

        assert!(matches!(
            session.submit_details(),
            Err(CheckoutError::Transition(TransitionError::InvalidDetails(_)))
        ));
        assert_eq!(session.step(), CheckoutStep::Details);

        Ok(())
    }

    #[tokio::test]
    async fn cash_on_delivery_posts_once_and_clears_cart() -> TestResult {
        let cart = cart_with_items()?;

        let mut orders = MockOrderService::new();
        orders
            .expect_create_order()
            .once()
            .withf(|order, _| {
                order.payment_details.is_none()
                    && order.total == Decimal::from(130)
                    && order.items.len() == 2
                    && order.shipping.city == "London"
            })
            .returning(|_, _| Ok(OrderId::from("1001")));

        let mut payments = MockPaymentGateway::new();
        payments.expect_create_order().never();
        payments.expect_capture().never();

        let session = CheckoutSession::start(cart.clone(), services(orders, Some(payments)), None);

        session.edit_draft(fill);
        session.select_payment_method(PaymentMethod::CashOnDelivery);
        session.submit_details()?;

        let order_id = session.submit().await?;

        assert_eq!(order_id, OrderId::from("1001"));
        assert_eq!(session.step(), CheckoutStep::Confirmed(order_id));
        assert!(cart.is_cart_empty());
        assert!(!session.is_submitting());

        Ok(())
    }

    #[tokio::test]
    async fn declined_capture_keeps_payment_step_and_cart() -> TestResult {
        let cart = cart_with_items()?;

        let mut orders = MockOrderService::new();
        orders.expect_create_order().never();

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_create_order()
            .once()
            .withf(|amount, _| *amount == Decimal::from(130))
            .returning(|_, _| Ok(pending("GW-1")));
        payments
            .expect_capture()
            .once()
            .returning(|_| Err(PaymentError::Declined("INSTRUMENT_DECLINED".to_string())));

        let session = CheckoutSession::start(cart.clone(), services(orders, Some(payments)), None);

        session.edit_draft(fill);
        session.select_payment_method(PaymentMethod::Online);
        session.submit_details()?;

        let result = session.submit().await;

        assert!(matches!(result, Err(CheckoutError::Payment(PaymentError::Declined(_)))));
        assert!(matches!(session.step(), CheckoutStep::Payment(_)));
        assert_eq!(cart.cart_count(), 3);
        assert!(!session.is_submitting());
        assert_eq!(
            cart.notifications().current().map(|note| note.severity),
            Some(Severity::Error)
        );

        Ok(())
    }

    #[tokio::test]
    async fn retry_after_order_failure_reuses_capture() -> TestResult {
        let cart = cart_with_items()?;
        let attempts = Arc::new(AtomicUsize::new(0));
        let counted = attempts.clone();

        let mut orders = MockOrderService::new();
        orders
            .expect_create_order()
            .times(2)
            .withf(|order, _| order.payment_details == Some(completed_capture()))
            .returning(move |_, _| {
                if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(OrderServiceError::UnexpectedResponse("bad gateway".to_string()))
                } else {
                    Ok(OrderId::from("77"))
                }
            });

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_create_order()
            .once()
            .returning(|_, _| Ok(pending("GW-1")));
        payments
            .expect_capture()
            .once()
            .returning(|_| Ok(completed_capture()));

        let session = CheckoutSession::start(cart.clone(), services(orders, Some(payments)), None);

        session.edit_draft(fill);
        session.select_payment_method(PaymentMethod::Online);
        session.submit_details()?;

        assert!(matches!(session.submit().await, Err(CheckoutError::Order(_))));
        assert!(matches!(session.step(), CheckoutStep::Payment(_)));

        assert_eq!(session.submit().await?, OrderId::from("77"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(cart.is_cart_empty());

        Ok(())
    }

    #[tokio::test]
    async fn back_keeps_entered_details() -> TestResult {
        let session =
            CheckoutSession::start(cart_with_items()?, services(MockOrderService::new(), None), None);

        session.edit_draft(fill);
        session.submit_details()?;
        session.back()?;

        assert_eq!(session.step(), CheckoutStep::Details);
        assert_eq!(session.draft().city, "London");

        Ok(())
    }

    #[tokio::test]
    async fn online_without_gateway_is_refused_up_front() -> TestResult {
        let mut orders = MockOrderService::new();
        orders.expect_create_order().never();

        let session = CheckoutSession::start(cart_with_items()?, services(orders, None), None);

        session.edit_draft(fill);
        session.select_payment_method(PaymentMethod::Online);
        session.submit_details()?;

        assert!(matches!(
            session.place_order(),
            Err(CheckoutError::PaymentUnavailable)
        ));
        assert!(!session.is_submitting());

        Ok(())
    }

    #[tokio::test]
    async fn profile_prefills_draft() -> TestResult {
        let profile = CustomerProfile {
            id: Some(UserId::from("u-1")),
            email: "ada@example.com".to_string(),
            city: Some("London".to_string()),
            ..CustomerProfile::default()
        };

        let session = CheckoutSession::start(
            cart_with_items()?,
            services(MockOrderService::new(), None),
            Some(&profile),
        );

        assert_eq!(session.draft().email, "ada@example.com");
        assert_eq!(session.draft().city, "London");
        assert_eq!(session.totals().total, Decimal::from(130));

        Ok(())
    }

    /// Holds every `create_order` call until released.
    #[derive(Default)]
    struct GatedOrders {
        calls: AtomicUsize,
        release: Notify,
        posted: Mutex<Vec<NewOrder>>,
    }

    impl GatedOrders {
        fn posted(&self) -> Vec<NewOrder> {
            self.posted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl OrderService for GatedOrders {
        async fn create_order(
            &self,
            order: &NewOrder,
            _submission: Uuid,
        ) -> Result<OrderId, OrderServiceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            self.posted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(order.clone());

            self.release.notified().await;

            Ok(OrderId::from(call as u64))
        }

        async fn list_orders(
            &self,
            _lookup: &OrderLookup,
        ) -> Result<Vec<Order>, OrderServiceError> {
            Ok(Vec::new())
        }

        async fn update_status(
            &self,
            _id: &OrderId,
            _status: OrderStatus,
        ) -> Result<(), OrderServiceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn double_submit_issues_one_order() -> TestResult {
        let orders = Arc::new(GatedOrders::default());
        let services = CheckoutServices {
            orders: orders.clone(),
            payments: None,
            rates: Arc::new(ZeroRates),
        };

        let session = CheckoutSession::start(cart_with_items()?, services, None);

        session.edit_draft(fill);
        session.submit_details()?;

        let first = session.place_order()?;

        assert!(session.is_submitting());
        assert!(matches!(
            session.place_order(),
            Err(CheckoutError::SubmissionInFlight)
        ));
        assert!(matches!(session.back(), Err(CheckoutError::SubmissionInFlight)));

        orders.release.notify_one();

        assert_eq!(first.await??, OrderId::from("1"));
        assert_eq!(orders.calls.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[tokio::test]
    async fn late_resolution_after_close_does_not_resurrect_session() -> TestResult {
        let orders = Arc::new(GatedOrders::default());
        let cart = cart_with_items()?;
        let services = CheckoutServices {
            orders: orders.clone(),
            payments: None,
            rates: Arc::new(ZeroRates),
        };

        let session = CheckoutSession::start(cart.clone(), services, None);

        session.edit_draft(fill);
        session.submit_details()?;

        let pending = session.place_order()?;
        let state = Arc::downgrade(&session.state);

        drop(session);
        orders.release.notify_one();

        assert_eq!(pending.await??, OrderId::from("1"));
        assert!(state.upgrade().is_none());
        assert!(cart.is_cart_empty());

        Ok(())
    }

    #[tokio::test]
    async fn cart_edits_during_submission_do_not_change_the_order() -> TestResult {
        let orders = Arc::new(GatedOrders::default());
        let cart = cart_with_items()?;
        let services = CheckoutServices {
            orders: orders.clone(),
            payments: None,
            rates: Arc::new(ZeroRates),
        };

        let session = CheckoutSession::start(cart.clone(), services, None);

        session.edit_draft(fill);
        session.submit_details()?;

        let running = session.place_order()?;

        assert!(cart.remove_from_cart(&ProductId::from("P1")));
        assert!(cart.remove_from_cart(&ProductId::from("P2")));
        assert!(matches!(session.step(), CheckoutStep::Payment(_)));

        orders.release.notify_one();

        assert_eq!(running.await??, OrderId::from("1"));

        let posted = orders.posted();

        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].items.len(), 2);
        assert_eq!(posted[0].total, Decimal::from(130));
        assert_eq!(session.step(), CheckoutStep::Confirmed(OrderId::from("1")));
        assert!(cart.is_cart_empty());
        assert_eq!(
            cart.notifications().current().map(|note| note.severity),
            Some(Severity::Success)
        );

        Ok(())
    }

    #[tokio::test]
    async fn retry_after_cart_change_charges_the_new_total() -> TestResult {
        let cart = cart_with_items()?;
        let attempts = Arc::new(AtomicUsize::new(0));
        let counted = attempts.clone();
        let charged = Arc::new(Mutex::new(Vec::new()));
        let recorded = charged.clone();

        let mut orders = MockOrderService::new();
        orders
            .expect_create_order()
            .once()
            .withf(|order, _| order.total == Decimal::from(130))
            .returning(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);

                Err(OrderServiceError::UnexpectedResponse("bad gateway".to_string()))
            });
        orders
            .expect_create_order()
            .once()
            .withf(|order, _| order.total == Decimal::from(1030) && order.items.len() == 3)
            .returning(|_, _| Ok(OrderId::from("78")));

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_create_order()
            .times(2)
            .returning(move |amount, _| {
                recorded
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(amount);

                Ok(pending("GW-1"))
            });
        payments
            .expect_capture()
            .times(2)
            .returning(|_| Ok(completed_capture()));

        let session = CheckoutSession::start(cart.clone(), services(orders, Some(payments)), None);

        session.edit_draft(fill);
        session.select_payment_method(PaymentMethod::Online);
        session.submit_details()?;

        assert!(matches!(session.submit().await, Err(CheckoutError::Order(_))));

        cart.add_to_cart(ProductSnapshot::new("P3", "Console", Decimal::from(900))?, 1)?;

        let refused = session.submit().await;

        assert!(
            matches!(
                refused,
                Err(CheckoutError::StaleCapture { captured, total })
                    if captured == Decimal::from(130) && total == Decimal::from(1030)
            ),
            "{refused:?}"
        );
        assert!(!session.is_submitting());
        assert_eq!(
            cart.notifications().current().map(|note| note.severity),
            Some(Severity::Error)
        );

        assert_eq!(session.submit().await?, OrderId::from("78"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            *charged.lock().unwrap_or_else(PoisonError::into_inner),
            vec![Decimal::from(130), Decimal::from(1030)]
        );

        Ok(())
    }

    #[tokio::test]
    async fn going_back_drops_the_captured_payment() -> TestResult {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counted = attempts.clone();

        let mut orders = MockOrderService::new();
        orders
            .expect_create_order()
            .times(2)
            .returning(move |_, _| {
                if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(OrderServiceError::UnexpectedResponse("bad gateway".to_string()))
                } else {
                    Ok(OrderId::from("79"))
                }
            });

        let mut payments = MockPaymentGateway::new();
        payments
            .expect_create_order()
            .times(2)
            .returning(|_, _| Ok(pending("GW-1")));
        payments
            .expect_capture()
            .times(2)
            .returning(|_| Ok(completed_capture()));

        let session = CheckoutSession::start(cart_with_items()?, services(orders, Some(payments)), None);

        session.edit_draft(fill);
        session.select_payment_method(PaymentMethod::Online);
        session.submit_details()?;

        assert!(session.submit().await.is_err());

        session.back()?;
        session.submit_details()?;

        assert_eq!(session.submit().await?, OrderId::from("79"));

        Ok(())
    }

    #[tokio::test]
    async fn unapproved_payment_is_never_captured() -> TestResult {
        let cart = cart_with_items()?;

        let mut orders = MockOrderService::new();
        orders.expect_create_order().never();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_order()
            .once()
            .returning(|_, _| Ok(pending("GW-2")));
        gateway.expect_capture().never();

        let mut approval = MockPayerApproval::new();
        approval
            .expect_approve()
            .once()
            .withf(|payment| payment.id == GatewayOrderId::new("GW-2"))
            .returning(|_| Err(PaymentError::NotApproved("cancelled by payer".to_string())));

        let services = CheckoutServices {
            orders: Arc::new(orders),
            payments: Some(online(gateway, approval)),
            rates: Arc::new(ZeroRates),
        };

        let session = CheckoutSession::start(cart.clone(), services, None);

        session.edit_draft(fill);
        session.select_payment_method(PaymentMethod::Online);
        session.submit_details()?;

        let result = session.submit().await;

        assert!(
            matches!(result, Err(CheckoutError::Payment(PaymentError::NotApproved(_)))),
            "{result:?}"
        );
        assert!(matches!(session.step(), CheckoutStep::Payment(_)));
        assert_eq!(cart.cart_count(), 3);
        assert_eq!(
            cart.notifications().current().map(|note| note.message),
            Some("The payment was not approved. No order was placed.".to_string())
        );

        Ok(())
    }

    #[tokio::test]
    async fn free_order_cannot_be_paid_online() -> TestResult {
        let cart = CartStore::load(Arc::new(MemoryStore::new()), NotificationChannel::new());
        cart.add_to_cart(ProductSnapshot::new("P9", "Sticker", Decimal::ZERO)?, 1)?;

        let mut payments = MockPaymentGateway::new();
        payments.expect_create_order().never();
        payments.expect_capture().never();

        let session =
            CheckoutSession::start(cart.clone(), services(MockOrderService::new(), Some(payments)), None);

        session.edit_draft(fill);
        session.select_payment_method(PaymentMethod::Online);
        session.submit_details()?;

        assert!(matches!(
            session.place_order(),
            Err(CheckoutError::NothingToCharge)
        ));
        assert!(!session.is_submitting());
        assert_eq!(
            cart.notifications().current().map(|note| note.severity),
            Some(Severity::Error)
        );

        Ok(())
    }
}
