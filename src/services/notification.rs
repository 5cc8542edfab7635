//! Fire-and-forget order notifications. Services submit jobs to a bounded
//! queue after their transaction commits; a background worker delivers them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::DeliveryType;

#[derive(Debug, Clone, Serialize)]
pub struct OrderNotice {
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub product_title: String,
    pub quantity: i32,
    pub total_amount: i64,
    pub delivery_type: DeliveryType,
}

#[derive(Debug, Clone)]
pub enum NotificationJob {
    OrderConfirmed(OrderNotice),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_buyer_order_confirmed(&self, notice: &OrderNotice) -> anyhow::Result<()>;
    async fn notify_seller_new_order(&self, notice: &OrderNotice) -> anyhow::Result<()>;
}

/// Writes notifications to the log. Used when no delivery endpoint is set.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_buyer_order_confirmed(&self, notice: &OrderNotice) -> anyhow::Result<()> {
        tracing::info!(
            order_id = %notice.order_id,
            buyer_id = %notice.buyer_id,
            "buyer order confirmation"
        );
        Ok(())
    }

    async fn notify_seller_new_order(&self, notice: &OrderNotice) -> anyhow::Result<()> {
        tracing::info!(
            order_id = %notice.order_id,
            seller_id = %notice.seller_id,
            "seller new order"
        );
        Ok(())
    }
}

/// Posts notifications as JSON to the mail service.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn post(&self, kind: &str, recipient: Uuid, notice: &OrderNotice) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&serde_json::json!({
                "kind": kind,
                "recipient_id": recipient,
                "order": notice,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify_buyer_order_confirmed(&self, notice: &OrderNotice) -> anyhow::Result<()> {
        self.post("buyer_order_confirmed", notice.buyer_id, notice).await
    }

    async fn notify_seller_new_order(&self, notice: &OrderNotice) -> anyhow::Result<()> {
        self.post("seller_new_order", notice.seller_id, notice).await
    }
}

/// Sending half handed to services. Submission never blocks and never fails
/// the caller.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<NotificationJob>,
}

impl NotificationQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn submit(&self, job: NotificationJob) {
        if let Err(err) = self.tx.try_send(job) {
            tracing::warn!(error = %err, "notification dropped");
        }
    }
}

pub struct NotificationWorker {
    notifier: Arc<dyn Notifier>,
}

impl NotificationWorker {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Runs until every queue handle is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<NotificationJob>) {
        tracing::info!("notification worker started");

        while let Some(job) = rx.recv().await {
            match job {
                NotificationJob::OrderConfirmed(notice) => {
                    if let Err(err) = self.notifier.notify_buyer_order_confirmed(&notice).await {
                        tracing::warn!(order_id = %notice.order_id, error = %err, "buyer notification failed");
                    }
                    if let Err(err) = self.notifier.notify_seller_new_order(&notice).await {
                        tracing::warn!(order_id = %notice.order_id, error = %err, "seller notification failed");
                    }
                }
            }
        }

        tracing::info!("notification channel closed, worker stopping");
    }
}
