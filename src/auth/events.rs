use crate::errors::TransportError;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

/// Name under which the unauthorized event is published.
pub const UNAUTHORIZED_EVENT: &str = "auth:unauthorized";

/// Session-level notifications for the application.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// The session can no longer be authenticated; the application should
    /// sign the user out.
    Unauthorized {
        error: TransportError,
        timestamp: DateTime<Utc>,
    },
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::Unauthorized { .. } => UNAUTHORIZED_EVENT,
        }
    }
}

/// Broadcast bus for [`AuthEvent`]s.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, event: AuthEvent) {
        debug!(event = event.name(), "publishing session event");
        let _ = self.sender.send(event);
    }

    pub fn emit_unauthorized(&self, error: TransportError) {
        self.emit(AuthEvent::Unauthorized {
            error,
            timestamp: Utc::now(),
        });
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_unauthorized() {
        let events = SessionEvents::default();
        let mut first = events.subscribe();
        let mut second = events.subscribe();

        events.emit_unauthorized(TransportError::RefreshFailed {
            message: "expired".to_string(),
        });

        for receiver in [&mut first, &mut second] {
            let event = receiver.recv().await.unwrap();
            assert_eq!(event.name(), "auth:unauthorized");
            let AuthEvent::Unauthorized { error, .. } = event;
            assert!(matches!(error, TransportError::RefreshFailed { .. }));
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        SessionEvents::new(0).emit_unauthorized(TransportError::CallerAborted);
    }
}
