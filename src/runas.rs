//! Run-as identity substitution for declared components.
//!
//! Bindings are built once from the declared [`RunAsDescriptor`]s and are
//! read-only afterwards. [`RunAsSwitcher::apply`] installs the bound
//! identity for one component invocation; [`RunAsSwitcher::revert`]
//! restores whatever context the invocation carries, clearing the thread's
//! context when it carries none.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail};
use crate::authenticator::RealmLogin;
use crate::context::SecurityContext;
use crate::error::Error;

/// A declared run-as identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunAsDescriptor {
    /// Component (servlet) name the identity applies to
    pub component: Option<String>,
    /// Principal name to assume
    pub principal: Option<String>,
}

/// Servlet attached to an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServletInfo {
    /// Name the servlet was declared under
    pub declared_name: String,
    /// Whether the servlet finished initialization
    pub initialized: bool,
}

/// Per-call metadata pairing a run-as switch with its restore.
///
/// Hand the same value to [`RunAsSwitcher::apply`] and
/// [`RunAsSwitcher::revert`] to restore the prior identity exactly.
#[derive(Debug, Clone, Default)]
pub struct ComponentInvocation {
    /// Explicit component instance name
    pub instance_name: Option<String>,
    /// Servlet the call targets
    pub servlet: Option<ServletInfo>,
    /// Context active before the switch
    pub previous: Option<Arc<SecurityContext>>,
}

impl ComponentInvocation {
    /// Invocation naming the component explicitly.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            instance_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Invocation targeting `servlet`.
    pub fn for_servlet(servlet: ServletInfo) -> Self {
        Self {
            servlet: Some(servlet),
            ..Self::default()
        }
    }

    /// Human-readable component name.
    ///
    /// The explicit instance name wins; otherwise the attached servlet's
    /// declared name is used, once that servlet is initialized.
    pub fn component_name(&self) -> Option<&str> {
        self.instance_name.as_deref().or_else(|| {
            self.servlet
                .as_ref()
                .filter(|servlet| servlet.initialized)
                .map(|servlet| servlet.declared_name.as_str())
        })
    }
}

/// Swaps the thread's identity for declared run-as components.
pub struct RunAsSwitcher {
    bindings: HashMap<String, String>,
    login: Arc<dyn RealmLogin>,
    realm: String,
    audit: Arc<AuditTrail>,
}

impl RunAsSwitcher {
    /// Builds the binding table; incomplete descriptors are skipped with a warning.
    pub fn new(
        descriptors: &[RunAsDescriptor],
        login: Arc<dyn RealmLogin>,
        realm: impl Into<String>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        let mut bindings = HashMap::new();
        for descriptor in descriptors {
            match (&descriptor.component, &descriptor.principal) {
                (Some(component), Some(principal)) => {
                    bindings.insert(component.clone(), principal.clone());
                }
                _ => tracing::warn!(?descriptor, "ignoring incomplete run-as declaration"),
            }
        }
        Self {
            bindings,
            login,
            realm: realm.into(),
            audit,
        }
    }

    /// Principal bound to `component`, if any.
    pub fn binding(&self, component: &str) -> Option<&str> {
        self.bindings.get(component).map(String::as_str)
    }

    /// Returns true if no run-as identity is declared.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Installs the bound identity for `invocation`'s component.
    ///
    /// The previously active context is stored on `invocation`. Does
    /// nothing when the component has no binding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoginFailed`] if the realm refuses the bound
    /// principal. The thread's context is left untouched in that case.
    pub fn apply(&self, invocation: &mut ComponentInvocation) -> Result<(), Error> {
        if self.bindings.is_empty() {
            return Ok(());
        }
        let Some(component) = invocation.component_name().map(str::to_string) else {
            return Ok(());
        };
        let Some(principal) = self.bindings.get(&component) else {
            return Ok(());
        };

        let subject = match self.login.login_principal(principal, &self.realm) {
            Ok(subject) => subject,
            Err(e) => {
                tracing::warn!(%component, %principal, error = %e, "run-as login failed");
                self.audit.record(
                    AuditEvent::new(AuditEventKind::RunAs, AuditOutcome::Error)
                        .with_principal(principal.as_str())
                        .with_detail(component.as_str()),
                );
                return Err(e.into());
            }
        };

        invocation.previous = SecurityContext::current();
        SecurityContext::set_current(Some(Arc::new(SecurityContext::new(subject))));
        tracing::debug!(%component, %principal, "run-as identity installed");
        self.audit.record(
            AuditEvent::new(AuditEventKind::RunAs, AuditOutcome::Success)
                .with_principal(principal.as_str())
                .with_detail(component.as_str()),
        );
        Ok(())
    }

    /// Restores the context stored on `invocation`.
    ///
    /// An invocation carrying no previous context clears the thread's
    /// context. Does nothing when the component has no binding.
    pub fn revert(&self, invocation: &ComponentInvocation) {
        if self.bindings.is_empty() {
            return;
        }
        let Some(component) = invocation
            .component_name()
            .filter(|name| self.bindings.contains_key(*name))
        else {
            return;
        };

        if invocation.previous.is_none() {
            tracing::debug!(component, "no saved context, clearing run-as identity");
        }
        SecurityContext::set_current(invocation.previous.clone());
    }
}

impl std::fmt::Debug for RunAsSwitcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunAsSwitcher")
            .field("bindings", &self.bindings)
            .field("realm", &self.realm)
            .finish()
    }
}
