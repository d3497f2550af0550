//! Customer and staff notifications derived from committed events.
//!
//! The dispatcher drains a bus subscription on its own thread. Delivery is
//! fire-and-forget: a failing notifier is logged and never reaches the
//! request that produced the event.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;

use commerce_cart::Owner;
use commerce_catalog::{Product, ProductEvent};
use commerce_events::{EventEnvelope, Subscription};
use commerce_orders::{Order, OrderEvent, OrderStatus, PaymentStatus};
use commerce_support::{Complaint, ComplaintEvent};

use crate::aggregates::StreamedAggregate;
use crate::projections::Projections;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderConfirmed,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    PaymentSuccess,
    PaymentFailed,
    ComplaintOpened,
    ComplaintResolved,
    LowStock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "owner", rename_all = "snake_case")]
pub enum Recipient {
    Customer(Owner),
    Staff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: Recipient,
    pub title: String,
    pub message: String,
    /// Order or complaint number, or the product SKU.
    pub reference: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Delivery channel (email, SMS, push). Implementations must not block for long.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = ?notification.kind,
            recipient = ?notification.recipient,
            reference = %notification.reference,
            title = %notification.title,
            "notification"
        );
        Ok(())
    }
}

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    projections: Arc<Projections>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, projections: Arc<Projections>) -> Self {
        Self { notifier, projections }
    }

    /// The notification an envelope triggers, if any.
    pub fn notification_for(&self, envelope: &EventEnvelope<JsonValue>) -> Option<Notification> {
        match envelope.aggregate_type() {
            t if t == Order::AGGREGATE_TYPE => self.order_notification(envelope),
            t if t == Complaint::AGGREGATE_TYPE => self.complaint_notification(envelope),
            t if t == Product::AGGREGATE_TYPE => self.stock_notification(envelope),
            _ => None,
        }
    }

    pub fn dispatch(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), NotifyError> {
        match self.notification_for(envelope) {
            Some(notification) => self.notifier.notify(&notification),
            None => Ok(()),
        }
    }

    fn order_notification(&self, envelope: &EventEnvelope<JsonValue>) -> Option<Notification> {
        let event: OrderEvent = decode(envelope)?;
        let (order_id, kind) = match &event {
            OrderEvent::OrderPlaced(e) => {
                return Some(Notification {
                    kind: NotificationKind::OrderConfirmed,
                    recipient: Recipient::Customer(e.placed_by.clone()),
                    title: format!("Order {} received", e.order_number),
                    message: format!("We have received your order totalling {}.", e.totals.total),
                    reference: e.order_number.clone(),
                });
            }
            OrderEvent::StatusChanged(e) => {
                let kind = match e.to {
                    OrderStatus::Shipped => NotificationKind::OrderShipped,
                    OrderStatus::Delivered => NotificationKind::OrderDelivered,
                    OrderStatus::Cancelled => NotificationKind::OrderCancelled,
                    _ => return None,
                };
                (e.order_id, kind)
            }
            OrderEvent::PaymentRecorded(e) => {
                let kind = match e.status {
                    PaymentStatus::Paid => NotificationKind::PaymentSuccess,
                    PaymentStatus::Failed => NotificationKind::PaymentFailed,
                    _ => return None,
                };
                (e.order_id, kind)
            }
        };

        let order = self.projections.orders.get(&order_id)?;
        let (title, message) = match kind {
            NotificationKind::OrderShipped => ("shipped", "Your order is on its way."),
            NotificationKind::OrderDelivered => ("delivered", "Your order has been delivered."),
            NotificationKind::OrderCancelled => ("cancelled", "Your order has been cancelled."),
            NotificationKind::PaymentSuccess => ("paid", "We have received your payment."),
            _ => ("payment failed", "Your payment could not be processed."),
        };
        Some(Notification {
            kind,
            recipient: Recipient::Customer(order.placed_by),
            title: format!("Order {} {title}", order.order_number),
            message: message.to_string(),
            reference: order.order_number,
        })
    }

    fn complaint_notification(&self, envelope: &EventEnvelope<JsonValue>) -> Option<Notification> {
        let event: ComplaintEvent = decode(envelope)?;
        match event {
            ComplaintEvent::Opened(e) => Some(Notification {
                kind: NotificationKind::ComplaintOpened,
                recipient: Recipient::Customer(Owner::User(e.customer)),
                title: format!("Complaint {} received", e.number),
                message: format!(
                    "We will respond by {}.",
                    e.service_level.response_due_at.format("%Y-%m-%d %H:%M UTC")
                ),
                reference: e.number,
            }),
            ComplaintEvent::Resolved(e) => {
                let complaint = self.projections.complaints.get(e.complaint_id)?;
                Some(Notification {
                    kind: NotificationKind::ComplaintResolved,
                    recipient: Recipient::Customer(Owner::User(complaint.customer()?)),
                    title: format!("Complaint {} resolved", complaint.number()),
                    message: e.resolution,
                    reference: complaint.number().to_string(),
                })
            }
            _ => None,
        }
    }

    /// Fires once, when an adjustment takes stock from above the product's
    /// threshold to at or below it.
    fn stock_notification(&self, envelope: &EventEnvelope<JsonValue>) -> Option<Notification> {
        let ProductEvent::StockAdjusted(e) = decode::<ProductEvent>(envelope)? else {
            return None;
        };
        let product = self.projections.products.get(&e.product_id)?;
        if !product.track_inventory {
            return None;
        }
        let threshold = i64::from(product.low_stock_threshold);
        if !(e.previous_stock > threshold && e.new_stock <= threshold) {
            return None;
        }
        Some(Notification {
            kind: NotificationKind::LowStock,
            recipient: Recipient::Staff,
            title: format!("Low stock: {}", product.name),
            message: format!("{} units left (threshold {threshold}).", e.new_stock),
            reference: product.sku,
        })
    }

    /// Drain `subscription` on a background thread until shut down or the bus
    /// goes away.
    pub fn spawn(
        self,
        subscription: Subscription<EventEnvelope<JsonValue>>,
    ) -> std::io::Result<NotificationWorker> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name("notifications".to_string())
            .spawn(move || self.run(subscription, shutdown_rx))?;
        Ok(NotificationWorker {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }

    fn run(
        &self,
        subscription: Subscription<EventEnvelope<JsonValue>>,
        shutdown_rx: mpsc::Receiver<()>,
    ) {
        let tick = Duration::from_millis(250);
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            match subscription.recv_timeout(tick) {
                Ok(envelope) => {
                    if let Err(err) = self.dispatch(&envelope) {
                        tracing::warn!(
                            event_type = envelope.event_type(),
                            error = %err,
                            "notification delivery failed"
                        );
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

/// Handle to stop and join the notification thread.
#[derive(Debug)]
pub struct NotificationWorker {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl NotificationWorker {
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn decode<E: serde::de::DeserializeOwned>(envelope: &EventEnvelope<JsonValue>) -> Option<E> {
    serde_json::from_value(envelope.payload().clone())
        .map_err(|err| {
            tracing::warn!(event_type = envelope.event_type(), error = %err, "undecodable event");
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};

    use commerce_core::{Money, UserId};

    use super::*;
    use crate::services::catalog::{NewProduct, StockAdjustment};
    use crate::services::support::NewComplaint;
    use crate::services::{CommerceServices, ServicesConfig};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Notification>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    #[test]
    fn low_stock_fires_once_when_crossing_the_threshold() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let services = CommerceServices::in_memory(ServicesConfig::default()).unwrap();
        let subscription = services.subscribe();
        let product = services
            .create_product(
                NewProduct {
                    sku: "MUG-1".into(),
                    name: "Mug".into(),
                    description: String::new(),
                    category_id: None,
                    price: Money::from_minor(1_500),
                    initial_stock: 12,
                    low_stock_threshold: 10,
                    track_inventory: true,
                    allow_backorder: false,
                },
                now,
            )
            .unwrap();
        for _ in 0..2 {
            services
                .adjust_stock(
                    product.product_id,
                    StockAdjustment {
                        variant_id: None,
                        movement: commerce_catalog::MovementType::Adjustment,
                        delta: -2,
                        reference: None,
                    },
                    now,
                )
                .unwrap();
        }

        let recorder = Arc::new(Recorder::default());
        let dispatcher = NotificationDispatcher::new(recorder.clone(), services.projections().clone());
        while let Ok(envelope) = subscription.try_recv() {
            dispatcher.dispatch(&envelope).unwrap();
        }

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::LowStock);
        assert_eq!(sent[0].recipient, Recipient::Staff);
        assert_eq!(sent[0].reference, "MUG-1");
    }

    #[test]
    fn complaint_opened_notifies_the_customer() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let services = CommerceServices::in_memory(ServicesConfig::default()).unwrap();
        let subscription = services.subscribe();
        let customer = UserId::new();
        services
            .open_complaint(
                customer,
                NewComplaint {
                    order_number: None,
                    kind: commerce_support::ComplaintKind::WebsiteBug,
                    subject: "Checkout button".into(),
                    description: "Nothing happens on click".into(),
                    priority: commerce_support::Priority::High,
                },
                now,
            )
            .unwrap();

        let dispatcher =
            NotificationDispatcher::new(Arc::new(LoggingNotifier), services.projections().clone());
        let envelope = subscription.try_recv().unwrap();
        let notification = dispatcher.notification_for(&envelope).unwrap();
        assert_eq!(notification.kind, NotificationKind::ComplaintOpened);
        assert_eq!(notification.recipient, Recipient::Customer(Owner::User(customer)));
        assert_eq!(notification.reference, "CMP202610160001");
    }

    #[test]
    fn worker_stops_on_shutdown() {
        let services = CommerceServices::in_memory(ServicesConfig::default()).unwrap();
        let dispatcher =
            NotificationDispatcher::new(Arc::new(LoggingNotifier), services.projections().clone());
        let worker = dispatcher.spawn(services.subscribe()).unwrap();
        worker.shutdown();
    }
}
