//! Bounded notification log.
//!
//! Append-only apart from the read flag; the oldest entries are evicted once
//! the configured capacity is reached.

use chrono::Utc;

use crate::ring::RingBuffer;
use crate::types::{Notification, NotificationKind};

/// Fixed-capacity log of notifications with monotonically increasing ids
#[derive(Clone, Debug)]
pub struct NotificationLog {
    entries: RingBuffer<Notification>,
    next_id: u64,
}

impl NotificationLog {
    /// Create an empty log holding at most `capacity` notifications
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RingBuffer::new(capacity),
            next_id: 1,
        }
    }

    /// Append a notification and return a copy of it
    pub fn push(
        &mut self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        item_id: Option<String>,
    ) -> Notification {
        let notification = Notification {
            id: self.next_id,
            kind,
            title: title.into(),
            message: message.into(),
            read: false,
            item_id,
            created_at: Utc::now(),
        };
        self.next_id += 1;
        self.entries.push(notification.clone());
        notification
    }

    /// Flip the read flag of one notification
    ///
    /// Returns false if the id is unknown or was already evicted.
    pub fn mark_read(&mut self, id: u64) -> bool {
        match self.entries.iter_recent_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.read = true;
                true
            }
            None => false,
        }
    }

    /// Flip the read flag of every notification, returning how many changed
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for notification in self.entries.iter_recent_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        changed
    }

    /// Notifications not yet read
    pub fn unread_count(&self) -> usize {
        self.entries.iter_recent().filter(|n| !n.read).count()
    }

    /// Copy of the log, newest first
    pub fn recent(&self) -> Vec<Notification> {
        self.entries.to_vec_recent()
    }

    /// Number of notifications held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every notification (ids keep increasing)
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
