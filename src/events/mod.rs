use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::VariantSize;

/// Capacity of the bounded event channel created at startup.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, waiting for channel capacity.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Never blocks and never fails the caller; a full or closed channel is logged.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Dropping domain event: {}", e);
        }
    }
}

/// Domain events emitted after a successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Account events
    UserSignedUp(Uuid),
    UserLoggedIn(Uuid),
    PasswordChanged(Uuid),
    UserUpdated(Uuid),
    UserDeactivated(Uuid),

    // Catalog events
    CategoryCreated(Uuid),
    CategoryUpdated(Uuid),
    CategoryDeleted(Uuid),
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    ProductImagesUpdated(Uuid),
    ReviewCreated { product_id: Uuid, review_id: Uuid },
    ReviewUpdated { product_id: Uuid, review_id: Uuid },
    ReviewDeleted { product_id: Uuid, review_id: Uuid },

    // Cart and wishlist events
    CartItemAdded { cart_id: Uuid, item_id: Uuid },
    CartItemUpdated { cart_id: Uuid, item_id: Uuid },
    CartItemRemoved { cart_id: Uuid, item_id: Uuid },
    CartCleared(Uuid),
    WishlistItemAdded { wishlist_id: Uuid, item_id: Uuid },
    WishlistItemUpdated { wishlist_id: Uuid, item_id: Uuid },
    WishlistItemRemoved { wishlist_id: Uuid, item_id: Uuid },
    WishlistCleared(Uuid),

    // Address events
    AddressCreated(Uuid),
    AddressUpdated(Uuid),
    AddressDeleted(Uuid),

    // Order events
    OrderCreated(Uuid),
    OrderPaid {
        order_id: Uuid,
        paid_at: DateTime<Utc>,
    },
    OrderDelivered {
        order_id: Uuid,
        delivered_at: DateTime<Utc>,
    },
    OrderDeleted(Uuid),
    StockDecremented {
        product_id: Uuid,
        size: VariantSize,
        color: String,
        remaining: i32,
    },
}

/// Stock level at or below which a decrement is logged as a warning.
const LOW_STOCK_THRESHOLD: i32 = 3;

/// Drains the event channel and logs every event until all senders are gone.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockDecremented {
                product_id,
                size,
                color,
                remaining,
            } if *remaining <= LOW_STOCK_THRESHOLD => {
                warn!(
                    %product_id,
                    %size,
                    color = %color,
                    remaining,
                    "Low stock after order payment"
                );
            }
            Event::OrderPaid { order_id, paid_at } => {
                info!(%order_id, %paid_at, "Order paid");
            }
            _ => {
                info!(event = ?event, "Domain event");
            }
        }
    }

    warn!("Event processing loop has ended");
}
