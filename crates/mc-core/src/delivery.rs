//! Notification delivery tracker
//!
//! Pull-based, at-least-once. Consumers poll `list_undelivered` and report
//! attempts; the delivered, read and acknowledged flags move independently.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::model::{NewNotification, Notification};
use crate::store::Store;
use crate::{Error, Result};

/// Page size for per-agent listings
pub const AGENT_NOTIFICATION_LIMIT: usize = 50;

#[derive(Clone)]
pub struct DeliveryTracker {
    store: Arc<Store>,
}

impl DeliveryTracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Insert a fresh record: unread, undelivered, zero attempts
    pub fn create(&self, new: NewNotification) -> Result<Notification> {
        let notification = self.store.insert_notification(new, Utc::now())?;
        debug!(
            id = %notification.id,
            target = %notification.target_agent_id,
            kind = notification.kind.as_str(),
            "notification created"
        );
        Ok(notification)
    }

    pub fn get(&self, id: &str) -> Result<Notification> {
        self.store
            .notification(id)?
            .ok_or_else(|| Error::not_found("notification", id))
    }

    pub fn list_undelivered(&self, target_agent_id: Option<&str>) -> Result<Vec<Notification>> {
        self.store.list_undelivered(target_agent_id)
    }

    /// Latest notifications for an agent, newest first
    pub fn list_for_agent(&self, target_agent_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        self.store
            .list_notifications_for(target_agent_id, unread_only, AGENT_NOTIFICATION_LIMIT)
    }

    /// Count an attempt and flag delivered. Unknown ids are ignored.
    pub fn record_delivery_attempt(&self, id: &str) -> Result<Option<Notification>> {
        let updated = self.store.record_delivery_attempt(id, Utc::now())?;
        match &updated {
            Some(n) => debug!(id, attempts = n.delivery_attempts, "delivery attempt recorded"),
            None => warn!(id, "delivery attempt for unknown notification ignored"),
        }
        Ok(updated)
    }

    /// Acknowledge; also marks the record read
    pub fn acknowledge(&self, id: &str) -> Result<Notification> {
        self.store.acknowledge_notification(id, Utc::now())
    }

    pub fn mark_read(&self, id: &str) -> Result<Notification> {
        self.store.mark_notification_read(id, Utc::now())
    }

    pub fn mark_all_read(&self, target_agent_id: &str) -> Result<usize> {
        self.store.mark_all_notifications_read(target_agent_id, Utc::now())
    }

    pub fn count_unread(&self, target_agent_id: &str) -> Result<usize> {
        self.store.count_unread(target_agent_id)
    }

    pub fn delete_for_reference(&self, reference_id: &str) -> Result<usize> {
        self.store.delete_notifications_for_reference(reference_id)
    }
}
