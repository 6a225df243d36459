//! Audit trail of security decisions.
//!
//! This module provides:
//! - `AuditEvent`: Structured record of one decision
//! - `AuditTrail`: Thread-safe recorder that also emits through `tracing`
//!
//! Events are safe to log: they hold paths, principal names and short
//! reasons, never credentials.

mod event;
mod trail;

pub use event::{AuditEvent, AuditEventKind, AuditOutcome};
pub use trail::AuditTrail;
