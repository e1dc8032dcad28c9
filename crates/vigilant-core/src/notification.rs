//! Bounded, newest-first queue of user-facing notifications.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Default number of notifications retained.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 100;

/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A single entry in the notification center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Monotonic per center.
    pub id: u64,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Local>,
    pub read: bool,
}

/// Notification queue with a fixed capacity.
///
/// New entries go to the front; once over capacity the oldest entry is
/// dropped from the back. There is no time-based expiry.
#[derive(Debug)]
pub struct NotificationCenter {
    entries: VecDeque<Notification>,
    capacity: usize,
    next_id: u64,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl NotificationCenter {
    /// Create a center retaining at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1000) + 1),
            capacity,
            next_id: 0,
        }
    }

    /// Insert a notification at the front.
    ///
    /// Returns the ID assigned to it.
    pub fn add(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.entries.push_front(Notification {
            id,
            title: title.into(),
            message: message.into(),
            severity,
            created_at: Local::now(),
            read: false,
        });
        self.entries.truncate(self.capacity);

        tracing::debug!(id, %severity, "notification added");
        id
    }

    /// Mark one notification read. Returns false if it is no longer held.
    pub fn mark_read(&mut self, id: u64) -> bool {
        match self.entries.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for notification in &mut self.entries {
            notification.read = true;
        }
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.read).count()
    }

    /// Remove every notification. IDs keep increasing afterwards.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Newest notification.
    pub fn latest(&self) -> Option<&Notification> {
        self.entries.front()
    }

    /// Get an entry by position, 0 being the newest.
    pub fn get(&self, index: usize) -> Option<&Notification> {
        self.entries.get(index)
    }

    /// The `n` newest notifications.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Notification> {
        self.entries.iter().take(n)
    }

    /// Get an iterator over all entries (newest first).
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_newest_first() {
        let mut center = NotificationCenter::new(10);
        let first = center.add("System", "one", Severity::Info);
        let second = center.add("System", "two", Severity::Success);

        assert!(second > first);
        assert_eq!(center.latest().unwrap().message, "two");
        assert_eq!(center.get(1).unwrap().message, "one");
    }

    #[test]
    fn test_read_tracking() {
        let mut center = NotificationCenter::new(10);
        let id = center.add("System", "one", Severity::Warning);
        center.add("System", "two", Severity::Error);
        assert_eq!(center.unread_count(), 2);

        assert!(center.mark_read(id));
        assert_eq!(center.unread_count(), 1);
        assert!(!center.mark_read(999));

        center.mark_all_read();
        assert_eq!(center.unread_count(), 0);
    }

    #[test]
    fn test_clear_keeps_ids_monotonic() {
        let mut center = NotificationCenter::new(10);
        let before = center.add("System", "one", Severity::Info);
        center.clear();
        assert!(center.is_empty());

        let after = center.add("System", "two", Severity::Info);
        assert!(after > before);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(
            serde_json::to_string(&Severity::Success).unwrap(),
            "\"success\""
        );
    }
}
