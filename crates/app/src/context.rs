//! App Context

use std::{path::PathBuf, sync::Arc};

use storefront::{
    customers::CustomerProfile,
    pricing::{RateCalculator, ZeroRates},
};
use thiserror::Error;

use crate::{
    cart_store::CartStore,
    checkout::{CheckoutServices, CheckoutSession, OnlinePayments},
    geolocation::{AddressLocator, ReverseGeocoder},
    notifications::NotificationChannel,
    orders::{HttpOrderService, OrderApiConfig, OrderService},
    payments::{PayPalConfig, PayPalGateway, PayerApproval, PaymentGateway},
    persistence::{MemoryStore, PersistenceError, PersistentStore, RedbStore},
    searches::SearchHistory,
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to open state store")]
    Persistence(#[source] PersistenceError),
}

/// Everything needed to build an [`AppContext`].
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Order API settings.
    pub orders: OrderApiConfig,

    /// `PayPal` credentials; online payment is unavailable without them.
    pub paypal: Option<PayPalConfig>,

    /// Where session state is kept; in memory when `None`.
    pub state_path: Option<PathBuf>,

    /// Reverse geocoder root for address autofill.
    pub geocoder_url: Option<String>,
}

#[derive(Clone)]
pub struct AppContext {
    pub cart: CartStore,
    pub searches: SearchHistory,
    pub orders: Arc<dyn OrderService>,
    pub payments: Option<Arc<dyn PaymentGateway>>,
    pub approval: Option<Arc<dyn PayerApproval>>,
    pub locator: Option<Arc<dyn AddressLocator>>,
    pub rates: Arc<dyn RateCalculator>,
}

impl AppContext {
    /// Build application context from settings, rehydrating session state.
    ///
    /// # Errors
    ///
    /// Returns an error when the state store cannot be opened.
    pub fn from_settings(settings: AppSettings) -> Result<Self, AppInitError> {
        let persistence: Arc<dyn PersistentStore> = match &settings.state_path {
            Some(path) => Arc::new(RedbStore::open(path).map_err(AppInitError::Persistence)?),
            None => Arc::new(MemoryStore::new()),
        };

        let cart = CartStore::load(persistence.clone(), NotificationChannel::new());

        Ok(Self {
            cart,
            searches: SearchHistory::load(persistence),
            orders: Arc::new(HttpOrderService::new(settings.orders)),
            payments: settings
                .paypal
                .map(|config| Arc::new(PayPalGateway::new(config)) as Arc<dyn PaymentGateway>),
            approval: None,
            locator: settings
                .geocoder_url
                .map(|url| Arc::new(ReverseGeocoder::new(url)) as Arc<dyn AddressLocator>),
            rates: Arc::new(ZeroRates),
        })
    }

    /// Attach the way payers approve online payments.
    #[must_use]
    pub fn with_approval(mut self, approval: Arc<dyn PayerApproval>) -> Self {
        self.approval = Some(approval);
        self
    }

    /// Services a checkout session submits through.
    ///
    /// Online payment needs both a gateway and a payer approval.
    #[must_use]
    pub fn checkout_services(&self) -> CheckoutServices {
        CheckoutServices {
            orders: self.orders.clone(),
            payments: self
                .payments
                .clone()
                .zip(self.approval.clone())
                .map(|(gateway, approval)| OnlinePayments { gateway, approval }),
            rates: self.rates.clone(),
        }
    }

    /// Enter checkout with the current cart.
    pub fn checkout(&self, profile: Option<&CustomerProfile>) -> CheckoutSession {
        CheckoutSession::start(self.cart.clone(), self.checkout_services(), profile)
    }
}
