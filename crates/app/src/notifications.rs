//! Notification Channel
//!
//! A single slot holding the latest notification. Showing a new one replaces
//! the current one and restarts the expiry timer.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use storefront::notifications::{DISPLAY_DURATION, Notification};
use tokio::{runtime::Handle, sync::watch, time::sleep};
use tracing::debug;

#[derive(Debug)]
struct Slot {
    sender: watch::Sender<Option<Notification>>,
    generation: AtomicU64,
    duration: Duration,
}

/// Cloneable handle to the notification slot.
#[derive(Debug, Clone)]
pub struct NotificationChannel {
    slot: Arc<Slot>,
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self::with_duration(DISPLAY_DURATION)
    }
}

impl NotificationChannel {
    /// Channel using the standard display duration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel whose notifications expire after `duration`.
    #[must_use]
    pub fn with_duration(duration: Duration) -> Self {
        let (sender, _receiver) = watch::channel(None);

        Self {
            slot: Arc::new(Slot {
                sender,
                generation: AtomicU64::new(0),
                duration,
            }),
        }
    }

    /// Replace the current notification.
    ///
    /// Expiry needs a Tokio runtime; without one the notification stays until
    /// replaced or dismissed.
    pub fn show(&self, notification: Notification) {
        let generation = self.slot.generation.fetch_add(1, Ordering::SeqCst) + 1;

        debug!(severity = %notification.severity, message = %notification.message, "notify");

        self.slot.sender.send_replace(Some(notification));

        let Ok(handle) = Handle::try_current() else {
            return;
        };

        let slot = Arc::downgrade(&self.slot);
        let duration = self.slot.duration;

        handle.spawn(async move {
            sleep(duration).await;

            if let Some(slot) = slot.upgrade() {
                if slot.generation.load(Ordering::SeqCst) == generation {
                    slot.sender.send_replace(None);
                }
            }
        });
    }

    /// Show a success notification.
    pub fn success(&self, message: impl Into<String>) {
        self.show(Notification::success(message));
    }

    /// Show an info notification.
    pub fn info(&self, message: impl Into<String>) {
        self.show(Notification::info(message));
    }

    /// Show an error notification.
    pub fn error(&self, message: impl Into<String>) {
        self.show(Notification::error(message));
    }

    /// Clear the slot immediately.
    pub fn dismiss(&self) {
        self.slot.generation.fetch_add(1, Ordering::SeqCst);
        self.slot.sender.send_replace(None);
    }

    /// The notification currently displayed.
    #[must_use]
    pub fn current(&self) -> Option<Notification> {
        self.slot.sender.borrow().clone()
    }

    /// Watch the slot for changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.slot.sender.subscribe()
    }
}
