//! Interfaces to the outside world.
//!
//! The pipeline only sees these traits; concrete calendar and chat clients
//! live with the caller. Both are async and object-safe via `async_trait`.

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::notification::Notification;
use crate::types::MeetingCandidate;

/// Creates calendar events for detected meetings.
#[async_trait]
pub trait CalendarSink: Send + Sync {
    /// Create an event and return its id.
    async fn create_event(&self, meeting: &MeetingCandidate) -> Result<String, CollaboratorError>;
}

/// Delivers notifications (chat, desktop, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), CollaboratorError>;
}

/// Notifier that writes to the log. Used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), CollaboratorError> {
        log::info!(
            "[{}] {}: {}",
            notification.email_id,
            notification.title,
            notification.text.replace('\n', " ")
        );
        Ok(())
    }
}
