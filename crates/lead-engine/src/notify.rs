//! Handler notifications
//!
//! Delivery is best effort: the engine logs a failed notification and moves
//! on, it never rolls back an assignment because a message could not be sent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::enquiry::{Enquiry, EnquiryId, HandlerId, Priority};
use crate::error::{LeadError, Result};

/// Message sent to a newly assigned handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub handler: HandlerId,
    pub enquiry_id: EnquiryId,
    pub mobile: String,
    pub name: Option<String>,
    pub priority: Priority,
    pub assigned_at: DateTime<Utc>,
}

impl Notification {
    pub fn for_assignment(handler: &HandlerId, enquiry: &Enquiry) -> Self {
        Self {
            handler: handler.clone(),
            enquiry_id: enquiry.id,
            mobile: enquiry.mobile.clone(),
            name: enquiry.name.clone(),
            priority: enquiry.priority,
            assigned_at: enquiry.updated_at,
        }
    }
}

/// Outbound delivery channel (SMS, email, push, ...)
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn notify(&self, handler: &HandlerId, enquiry: &Enquiry) -> Result<()>;
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSender for TracingNotifier {
    async fn notify(&self, handler: &HandlerId, enquiry: &Enquiry) -> Result<()> {
        info!(
            "📨 Enquiry {} ({}, {}) assigned to {}",
            enquiry.id,
            enquiry.mobile,
            enquiry.priority.as_str(),
            handler
        );
        Ok(())
    }
}

/// Forwards notifications to an in-process channel, e.g. a delivery worker
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create the notifier and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSender for ChannelNotifier {
    async fn notify(&self, handler: &HandlerId, enquiry: &Enquiry) -> Result<()> {
        self.tx
            .send(Notification::for_assignment(handler, enquiry))
            .map_err(|_| LeadError::notification("notification receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_notifier_reports_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);

        let enquiry = crate::enquiry::tests_support::enquiry();
        let err = notifier.notify(&HandlerId::from("asha"), &enquiry).await.unwrap_err();
        assert!(matches!(err, LeadError::Notification(_)));
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let enquiry = crate::enquiry::tests_support::enquiry();

        notifier.notify(&HandlerId::from("asha"), &enquiry).await.unwrap();
        let message = rx.recv().await.unwrap();
        assert_eq!(message.handler.as_str(), "asha");
        assert_eq!(message.enquiry_id, enquiry.id);
    }
}
