//! Transactional outbox for user notifications.
//!
//! Services insert events with [`enqueue`] on the same connection or transaction as the
//! state change they describe. The [`Dispatcher`] later hands pending rows to a
//! [`Notifier`] and records the outcome.

use std::{sync::Arc, time::Duration};

use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use sea_orm::ActiveValue::NotSet;
use serde_json::{Value, json};
use sqlx::FromRow;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    config::OutboxConfig,
    db::DbPool,
    domain::status::DeliveryType,
    entity::notification_outbox::ActiveModel as OutboxActive,
    error::AppResult,
    notify::{Notification, Notifier},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    VerificationCode,
    NewOrder,
    OrderReady,
    OrderDelivered,
    AddressUpdated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::VerificationCode => "order_verification",
            NotificationKind::NewOrder => "new_order",
            NotificationKind::OrderReady => "order_ready",
            NotificationKind::OrderDelivered => "order_delivered",
            NotificationKind::AddressUpdated => "address_update",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboxEvent {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub payload: Value,
}

/// Short human reference for an order: the last six characters of its id.
pub fn order_ref(order_id: Uuid) -> String {
    let id = order_id.simple().to_string();
    id[id.len() - 6..].to_string()
}

impl OutboxEvent {
    pub fn verification_code(buyer_id: Uuid, order_id: Uuid, code: &str, regenerated: bool) -> Self {
        let (title, body) = if regenerated {
            (
                "New Verification Code",
                format!(
                    "Your new verification code for order #{} is: {code}. Please show this to the delivery person.",
                    order_ref(order_id)
                ),
            )
        } else {
            (
                "Order Verification Code",
                format!(
                    "Your verification code for order #{} is: {code}. Share it only when you receive your order.",
                    order_ref(order_id)
                ),
            )
        };
        OutboxEvent {
            recipient_id: buyer_id,
            kind: NotificationKind::VerificationCode,
            title: title.into(),
            body,
            payload: json!({ "order_id": order_id, "code": code }),
        }
    }

    pub fn new_order(farmer_id: Uuid, order_id: Uuid, subtotal: i64, delivery_address: Option<&Value>) -> Self {
        OutboxEvent {
            recipient_id: farmer_id,
            kind: NotificationKind::NewOrder,
            title: "New Order Received".into(),
            body: format!("Order #{} worth {subtotal} has been placed.", order_ref(order_id)),
            payload: json!({
                "order_id": order_id,
                "total_amount": subtotal,
                "delivery_address": delivery_address,
            }),
        }
    }

    pub fn order_ready(buyer_id: Uuid, order_id: Uuid, delivery_type: DeliveryType, total_amount: i64) -> Self {
        let body = match delivery_type {
            DeliveryType::Pickup => "Your order is ready! You can now pick it up from the farm.",
            DeliveryType::Delivery => "Your order is ready! It will be out for delivery soon.",
        };
        OutboxEvent {
            recipient_id: buyer_id,
            kind: NotificationKind::OrderReady,
            title: "Order Ready".into(),
            body: body.into(),
            payload: json!({
                "order_id": order_id,
                "delivery_type": delivery_type.as_str(),
                "total_amount": total_amount,
            }),
        }
    }

    pub fn order_delivered(buyer_id: Uuid, order_id: Uuid) -> Self {
        OutboxEvent {
            recipient_id: buyer_id,
            kind: NotificationKind::OrderDelivered,
            title: "Order Delivered Successfully".into(),
            body: format!(
                "Your order #{} has been delivered and verified.",
                order_ref(order_id)
            ),
            payload: json!({ "order_id": order_id }),
        }
    }

    pub fn address_updated(buyer_id: Uuid, order_id: Uuid) -> Self {
        OutboxEvent {
            recipient_id: buyer_id,
            kind: NotificationKind::AddressUpdated,
            title: "Delivery Address Updated".into(),
            body: "Your order delivery address has been updated.".into(),
            payload: json!({ "order_id": order_id }),
        }
    }
}

pub async fn enqueue<C: ConnectionTrait>(db: &C, event: OutboxEvent) -> AppResult<()> {
    OutboxActive {
        id: Set(Uuid::new_v4()),
        recipient_id: Set(event.recipient_id),
        kind: Set(event.kind.as_str().to_string()),
        title: Set(event.title),
        body: Set(event.body),
        payload: Set(event.payload),
        status: Set("pending".into()),
        attempts: Set(0),
        last_error: Set(None),
        created_at: NotSet,
        sent_at: Set(None),
    }
    .insert(db)
    .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct PendingRow {
    id: Uuid,
    recipient_id: Uuid,
    kind: String,
    title: String,
    body: String,
    payload: Value,
    attempts: i32,
}

/// Result of one delivery attempt.
#[derive(Debug, PartialEq)]
pub enum Delivery {
    Sent,
    Failed(String),
}

/// Deliver each notification in order, isolating failures per message.
pub async fn deliver_batch(notifier: &dyn Notifier, batch: &[Notification]) -> Vec<Delivery> {
    let mut outcomes = Vec::with_capacity(batch.len());
    for notification in batch {
        match notifier.deliver(notification).await {
            Ok(()) => outcomes.push(Delivery::Sent),
            Err(err) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    error = %err,
                    "notification delivery failed"
                );
                outcomes.push(Delivery::Failed(err.to_string()));
            }
        }
    }
    outcomes
}

/// Background worker draining the outbox.
pub struct Dispatcher {
    pool: DbPool,
    notifier: Arc<dyn Notifier>,
    config: OutboxConfig,
}

impl Dispatcher {
    pub fn new(pool: DbPool, notifier: Arc<dyn Notifier>, config: OutboxConfig) -> Self {
        Self {
            pool,
            notifier,
            config,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.poll_secs.max(1)));
        loop {
            ticker.tick().await;
            match self.dispatch_once().await {
                Ok(0) => {}
                Ok(count) => tracing::debug!(count, "outbox batch dispatched"),
                Err(err) => tracing::warn!(error = %err, "outbox dispatch failed"),
            }
        }
    }

    /// Deliver one batch of pending notifications. Returns how many rows were handled.
    ///
    /// Rows are locked with `SKIP LOCKED`, so several dispatchers can share the table.
    pub async fn dispatch_once(&self) -> AppResult<usize> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, PendingRow>(
            r#"
            SELECT id, recipient_id, kind, title, body, payload, attempts
            FROM notification_outbox
            WHERE status = 'pending'
            ORDER BY created_at
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(self.config.batch_size.max(1))
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        let batch: Vec<Notification> = rows
            .iter()
            .map(|row| Notification {
                id: row.id,
                recipient_id: row.recipient_id,
                kind: row.kind.clone(),
                title: row.title.clone(),
                body: row.body.clone(),
                payload: row.payload.clone(),
            })
            .collect();

        let outcomes = deliver_batch(self.notifier.as_ref(), &batch).await;

        for (row, outcome) in rows.iter().zip(outcomes) {
            match outcome {
                Delivery::Sent => {
                    sqlx::query(
                        "UPDATE notification_outbox SET status = 'sent', attempts = attempts + 1, sent_at = now() WHERE id = $1",
                    )
                    .bind(row.id)
                    .execute(&mut *tx)
                    .await?;
                }
                Delivery::Failed(error) => {
                    let status = if row.attempts + 1 >= self.config.max_attempts {
                        "failed"
                    } else {
                        "pending"
                    };
                    sqlx::query(
                        "UPDATE notification_outbox SET status = $2, attempts = attempts + 1, last_error = $3 WHERE id = $1",
                    )
                    .bind(row.id)
                    .bind(status)
                    .bind(error)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockNotifier;

    fn notification(kind: &str) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            kind: kind.into(),
            title: "t".into(),
            body: "b".into(),
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn one_failed_delivery_does_not_stop_the_batch() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_deliver()
            .times(3)
            .returning(|n| {
                if n.kind == "broken" {
                    Err(anyhow::anyhow!("push gateway down"))
                } else {
                    Ok(())
                }
            });

        let batch = vec![notification("new_order"), notification("broken"), notification("order_ready")];
        let outcomes = deliver_batch(&notifier, &batch).await;

        assert_eq!(
            outcomes,
            vec![
                Delivery::Sent,
                Delivery::Failed("push gateway down".into()),
                Delivery::Sent
            ]
        );
    }

    #[test]
    fn order_ref_is_last_six_hex_chars() {
        let id = Uuid::parse_str("6f1c2d3e-4a5b-4c6d-8e9f-0a1b2c3d4e5f").unwrap();
        assert_eq!(order_ref(id), "3d4e5f");
    }

    #[test]
    fn ready_message_depends_on_delivery_type() {
        let buyer = Uuid::new_v4();
        let order = Uuid::new_v4();
        let pickup = OutboxEvent::order_ready(buyer, order, DeliveryType::Pickup, 100);
        let delivery = OutboxEvent::order_ready(buyer, order, DeliveryType::Delivery, 100);
        assert!(pickup.body.contains("pick it up"));
        assert!(delivery.body.contains("out for delivery"));
        assert_eq!(pickup.recipient_id, buyer);
    }

    #[test]
    fn regenerated_code_message_carries_the_code() {
        let event = OutboxEvent::verification_code(Uuid::new_v4(), Uuid::new_v4(), "AB12CD", true);
        assert_eq!(event.title, "New Verification Code");
        assert!(event.body.contains("AB12CD"));
        assert_eq!(event.payload["code"], "AB12CD");
    }
}
