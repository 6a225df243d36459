use std::fmt;
use std::sync::Arc;

use rustls_pki_types::CertificateDer;

use crate::context::SecurityContext;

/// Name of the default caller principal assigned to unauthenticated callers.
pub const ANONYMOUS: &str = "ANONYMOUS";

/// An authenticated user or service principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    name: String,
}

impl Principal {
    /// Creates a principal with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The default caller principal used for anonymous access.
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS)
    }

    /// Returns the principal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this is the default anonymous principal.
    pub fn is_anonymous(&self) -> bool {
        self.name == ANONYMOUS
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The set of principals established by an authentication exchange.
///
/// Principals keep their insertion order; the first one becomes the caller
/// principal of a [`SecurityContext`] built from this subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    principals: Vec<Principal>,
    read_only: bool,
}

impl Subject {
    /// Creates an empty, writable subject.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a subject holding the given principals.
    pub fn with_principals(principals: impl IntoIterator<Item = Principal>) -> Self {
        let mut subject = Self::new();
        for principal in principals {
            subject.add_principal(principal);
        }
        subject
    }

    /// Adds a principal unless an equal one is already present.
    ///
    /// Returns `false` when the subject is read-only or already holds it.
    pub fn add_principal(&mut self, principal: Principal) -> bool {
        if self.read_only || self.principals.contains(&principal) {
            return false;
        }
        self.principals.push(principal);
        true
    }

    /// Returns the principals in insertion order.
    pub fn principals(&self) -> &[Principal] {
        &self.principals
    }

    /// Returns true if no principal has been established.
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    /// True when the set is non-empty and holds nothing but the anonymous principal.
    pub fn contains_only_anonymous(&self) -> bool {
        !self.principals.is_empty() && self.principals.iter().all(Principal::is_anonymous)
    }

    /// Removes every principal. Read-only subjects are left untouched.
    pub fn clear(&mut self) {
        if !self.read_only {
            self.principals.clear();
        }
    }

    /// Marks the subject read-only.
    pub fn set_read_only(&mut self) {
        self.read_only = true;
    }

    /// Returns true if the subject can no longer be modified.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Principal attached to an HTTP request.
///
/// Pairs the caller principal with the [`SecurityContext`] it was
/// established under, so the container can re-install that context later.
/// Principals established by client-certificate login also keep the chain
/// they presented.
#[derive(Debug, Clone)]
pub struct WebPrincipal {
    principal: Principal,
    context: Option<Arc<SecurityContext>>,
    certificates: Option<Vec<CertificateDer<'static>>>,
}

impl WebPrincipal {
    /// Creates a request principal bound to a security context.
    pub fn new(principal: Principal, context: Option<Arc<SecurityContext>>) -> Self {
        Self {
            principal,
            context,
            certificates: None,
        }
    }

    /// Attaches the certificate chain the principal logged in with.
    pub fn with_certificates(mut self, chain: Vec<CertificateDer<'static>>) -> Self {
        self.certificates = Some(chain);
        self
    }

    /// The certificate chain, leaf first, for certificate logins.
    pub fn certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.certificates.as_deref()
    }

    /// True if the principal was established from a client certificate.
    pub fn is_using_certificate(&self) -> bool {
        self.certificates.is_some()
    }

    /// Returns the principal name.
    pub fn name(&self) -> &str {
        self.principal.name()
    }

    /// Returns the underlying principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns the security context the principal was established under.
    pub fn security_context(&self) -> Option<&Arc<SecurityContext>> {
        self.context.as_ref()
    }
}

impl fmt::Display for WebPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
