//! Thread-safe in-memory audit trail.

use parking_lot::Mutex;

use super::AuditEvent;

/// Recorder for audit events shared by every request thread of an adapter.
///
/// Each recorded event is also emitted as a `tracing` event under the
/// `realm_adapter::audit` target, so a subscriber can forward audit records
/// to persistent storage.
///
/// # Example
///
/// ```
/// use realm_adapter::audit::{AuditTrail, AuditEvent, AuditEventKind, AuditOutcome};
///
/// let trail = AuditTrail::new();
/// trail.record(AuditEvent::new(AuditEventKind::Authentication, AuditOutcome::Success));
/// assert_eq!(trail.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event and emits it through `tracing`.
    pub fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "realm_adapter::audit",
            kind = %event.kind(),
            outcome = %event.outcome(),
            principal = event.principal().unwrap_or("<none>"),
            path = event.path().unwrap_or(""),
            detail = event.detail().unwrap_or(""),
            "audit event"
        );
        self.events.lock().push(event);
    }

    /// Snapshot of recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Discards all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
