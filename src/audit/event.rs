//! Audit event schema.
//!
//! Events carry identifiers and decision metadata only. Credentials never
//! reach an event.

use std::fmt;

/// Kind of security decision being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    /// Caller authentication (provider, legacy, password or digest)
    Authentication,
    /// Resource authorization
    Authorization,
    /// Transport guarantee check and HTTPS redirect
    TransportGuarantee,
    /// Digest nonce replay check
    ReplayDetection,
    /// Run-as identity switch
    RunAs,
    /// Caller logout
    Logout,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEventKind::Authentication => write!(f, "authentication"),
            AuditEventKind::Authorization => write!(f, "authorization"),
            AuditEventKind::TransportGuarantee => write!(f, "transport_guarantee"),
            AuditEventKind::ReplayDetection => write!(f, "replay_detection"),
            AuditEventKind::RunAs => write!(f, "run_as"),
            AuditEventKind::Logout => write!(f, "logout"),
        }
    }
}

/// Outcome of an audited decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// The caller may proceed
    Success,
    /// Denied by policy or by failed credentials
    Denied,
    /// Failed because a collaborator failed
    Error,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Denied => write!(f, "denied"),
            AuditOutcome::Error => write!(f, "error"),
        }
    }
}

/// A structured audit record of one security decision.
///
/// # Example
///
/// ```
/// use realm_adapter::audit::{AuditEvent, AuditEventKind, AuditOutcome};
///
/// let event = AuditEvent::new(AuditEventKind::Authorization, AuditOutcome::Denied)
///     .with_path("/app/admin")
///     .with_principal("alice")
///     .with_detail("resource permission denied");
///
/// assert_eq!(event.principal(), Some("alice"));
/// assert!(event.to_string().contains("kind=authorization"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    kind: AuditEventKind,
    outcome: AuditOutcome,
    path: Option<String>,
    principal: Option<String>,
    detail: Option<String>,
}

impl AuditEvent {
    /// Creates an event with no context attached.
    pub fn new(kind: AuditEventKind, outcome: AuditOutcome) -> Self {
        Self {
            kind,
            outcome,
            path: None,
            principal: None,
            detail: None,
        }
    }

    /// Attaches the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attaches the principal the decision concerned.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Attaches a short reason or component name.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Event kind.
    pub fn kind(&self) -> AuditEventKind {
        self.kind
    }

    /// Event outcome.
    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    /// Request path, if known.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Principal, if known.
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    /// Reason or component detail.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuditEvent[kind={}, outcome={}, principal={}",
            self.kind,
            self.outcome,
            self.principal.as_deref().unwrap_or("<none>")
        )?;
        if let Some(path) = &self.path {
            write!(f, ", path={}", path)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ", detail={}", detail)?;
        }
        write!(f, "]")
    }
}
