//! Work deferred until after the response has been produced.

use std::sync::Arc;
use tracing::error;

use crate::events::Event;
use crate::mail::Notifier;

/// Jobs collected while a request is handled.
///
/// Nothing runs until [`BackgroundTasks::spawn`] is called, which the Lambda
/// entry point does only once the response is built. Spawned jobs are
/// detached: no handle is kept and failures are only logged.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    notifications: Vec<Event>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the email for an event.
    pub fn notify(&mut self, event: Event) {
        self.notifications.push(event);
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn spawn(self, notifier: Arc<dyn Notifier>) {
        for event in self.notifications {
            let notifier = Arc::clone(&notifier);
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&event).await {
                    error!(event_id = event.id, error = %e, "Failed to send event email");
                }
            });
        }
    }
}
