//! Cart Store
//!
//! Owns the session's cart and wishlist. Consumers hold a cloneable
//! [`CartStore`] handle and go through its operations; nothing else mutates
//! the collections. Every mutation writes both collections back to the
//! persistent store before returning.

use std::{
    convert::Infallible,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use rust_decimal::Decimal;
use storefront::{
    cart::{Cart, CartError},
    pricing::{RateCalculator, Totals},
    products::{ProductError, ProductId, ProductSnapshot},
    wishlist::{Toggle, Wishlist},
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    notifications::NotificationChannel,
    persistence::{CART_KEY, PersistentStore, WISHLIST_KEY},
};

const EVENT_CAPACITY: usize = 32;

/// Errors returned by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartStoreError {
    /// The product payload was rejected.
    #[error(transparent)]
    Product(#[from] ProductError),

    /// The cart rejected the change.
    #[error(transparent)]
    Cart(#[from] CartError),
}

impl From<Infallible> for CartStoreError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Signals for the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// An item was added; the cart panel should open.
    CartRevealRequested,

    /// The cart changed; `count` is the new unit total.
    CartChanged {
        /// Units across all lines
        count: u64,
    },

    /// The wishlist changed; `count` is the new number of entries.
    WishlistChanged {
        /// Saved products
        count: usize,
    },
}

#[derive(Debug, Default)]
struct Collections {
    cart: Cart,
    wishlist: Wishlist,
}

/// Handle to the session's cart and wishlist.
#[derive(Clone)]
pub struct CartStore {
    collections: Arc<Mutex<Collections>>,
    persistence: Arc<dyn PersistentStore>,
    notifications: NotificationChannel,
    events: broadcast::Sender<StoreEvent>,
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Rehydrate the cart and wishlist from `persistence`.
    ///
    /// Missing, unreadable or corrupt values start out empty.
    pub fn load(persistence: Arc<dyn PersistentStore>, notifications: NotificationChannel) -> Self {
        let cart = restore(persistence.as_ref(), CART_KEY, Cart::from_json);
        let wishlist = restore(persistence.as_ref(), WISHLIST_KEY, Wishlist::from_json);

        debug!(
            cart_lines = cart.len(),
            wishlist_entries = wishlist.len(),
            "rehydrated cart store"
        );

        let (events, _receiver) = broadcast::channel(EVENT_CAPACITY);

        Self {
            collections: Arc::new(Mutex::new(Collections { cart, wishlist })),
            persistence,
            notifications,
            events,
        }
    }

    /// Add units of a product, merging with an existing line.
    ///
    /// Accepts either a validated [`ProductSnapshot`] or a raw catalog payload,
    /// which is validated first. Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the cart unchanged, if the product payload is
    /// malformed or the quantity is zero.
    pub fn add_to_cart<P>(&self, product: P, quantity: u32) -> Result<u32, CartStoreError>
    where
        P: TryInto<ProductSnapshot>,
        CartStoreError: From<P::Error>,
    {
        let product = product.try_into().inspect_err(|_rejected| {
            self.notifications.error("This product can't be added to the cart.");
        })?;

        let name = product.name().to_string();

        let (quantity, count) = {
            let mut collections = self.lock();
            let quantity = collections.cart.add(product, quantity)?;

            self.persist(&collections);

            (quantity, collections.cart.count())
        };

        self.notifications.success(format!("{name} added to cart"));
        self.emit(StoreEvent::CartRevealRequested);
        self.emit(StoreEvent::CartChanged { count });

        Ok(quantity)
    }

    /// Remove a product line. Returns whether anything was removed.
    pub fn remove_from_cart(&self, id: &ProductId) -> bool {
        let (removed, count) = {
            let mut collections = self.lock();
            let removed = collections.cart.remove(id);

            if removed.is_some() {
                self.persist(&collections);
            }

            (removed, collections.cart.count())
        };

        let Some(item) = removed else {
            return false;
        };

        self.notifications
            .info(format!("{} removed from cart", item.product.name()));
        self.emit(StoreEvent::CartChanged { count });

        true
    }

    /// Replace a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the cart unchanged, if `quantity` is below one
    /// or the product is not in the cart.
    pub fn update_quantity(&self, id: &ProductId, quantity: i64) -> Result<(), CartStoreError> {
        let count = {
            let mut collections = self.lock();

            collections.cart.update_quantity(id, quantity)?;
            self.persist(&collections);

            collections.cart.count()
        };

        self.emit(StoreEvent::CartChanged { count });

        Ok(())
    }

    /// Empty the cart.
    pub fn clear_cart(&self) {
        {
            let mut collections = self.lock();

            collections.cart.clear();
            self.persist(&collections);
        }

        self.emit(StoreEvent::CartChanged { count: 0 });
    }

    /// Save the product if absent, remove it if present.
    ///
    /// Accepts the same inputs as [`CartStore::add_to_cart`].
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the wishlist unchanged, if the product
    /// payload is malformed.
    pub fn toggle_wishlist<P>(&self, product: P) -> Result<Toggle, CartStoreError>
    where
        P: TryInto<ProductSnapshot>,
        CartStoreError: From<P::Error>,
    {
        let product = product.try_into().inspect_err(|_rejected| {
            self.notifications
                .error("This product can't be saved to the wishlist.");
        })?;

        let name = product.name().to_string();

        let (toggle, count) = {
            let mut collections = self.lock();
            let toggle = collections.wishlist.toggle(product);

            self.persist(&collections);

            (toggle, collections.wishlist.len())
        };

        match toggle {
            Toggle::Added => self.notifications.success(format!("{name} added to wishlist")),
            Toggle::Removed => self
                .notifications
                .info(format!("{name} removed from wishlist")),
        }

        self.emit(StoreEvent::WishlistChanged { count });

        Ok(toggle)
    }

    /// Whether the product is in the wishlist.
    pub fn is_in_wishlist(&self, id: &ProductId) -> bool {
        self.lock().wishlist.contains(id)
    }

    /// Units across all cart lines.
    pub fn cart_count(&self) -> u64 {
        self.lock().cart.count()
    }

    /// Number of saved products.
    pub fn wishlist_count(&self) -> usize {
        self.lock().wishlist.len()
    }

    /// Sum of price × quantity over the cart.
    pub fn subtotal(&self) -> Decimal {
        self.lock().cart.subtotal()
    }

    /// Subtotal with shipping and tax applied.
    pub fn totals(&self, rates: &dyn RateCalculator) -> Totals {
        Totals::calculate(self.subtotal(), rates)
    }

    /// Whether the cart has no lines.
    pub fn is_cart_empty(&self) -> bool {
        self.lock().cart.is_empty()
    }

    /// Read-only copy of the cart.
    pub fn cart(&self) -> Cart {
        self.lock().cart.clone()
    }

    /// Read-only copy of the wishlist.
    pub fn wishlist(&self) -> Wishlist {
        self.lock().wishlist.clone()
    }

    /// The channel mutations report to.
    pub fn notifications(&self) -> &NotificationChannel {
        &self.notifications
    }

    /// Listen for store events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        _ = self.events.send(event);
    }

    fn persist(&self, collections: &Collections) {
        write_json(self.persistence.as_ref(), CART_KEY, collections.cart.to_json());
        write_json(
            self.persistence.as_ref(),
            WISHLIST_KEY,
            collections.wishlist.to_json(),
        );
    }
}

fn restore<T: Default>(
    persistence: &dyn PersistentStore,
    key: &str,
    parse: impl FnOnce(&str) -> Result<T, serde_json::Error>,
) -> T {
    match persistence.load(key) {
        Ok(Some(payload)) => parse(&payload).unwrap_or_else(|source| {
            warn!(key, %source, "discarding corrupt persisted value");

            T::default()
        }),
        Ok(None) => T::default(),
        Err(source) => {
            warn!(key, %source, "failed to read persisted value");

            T::default()
        }
    }
}

fn write_json(
    persistence: &dyn PersistentStore,
    key: &str,
    payload: Result<String, serde_json::Error>,
) {
    let result = match payload {
        Ok(payload) => persistence.save(key, &payload),
        Err(source) => {
            warn!(key, %source, "failed to serialise state");

            return;
        }
    };

    if let Err(source) = result {
        warn!(key, %source, "failed to persist state");
    }
}
