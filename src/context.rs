//! The caller identity active on the current thread.
//!
//! Exactly one [`SecurityContext`] slot exists per thread. It is empty until
//! something installs a context, replaced on authentication and run-as
//! switches, and cleared on logout. Contexts are shared as `Arc` so a request
//! principal can keep a handle to the context it was established under.

use std::cell::RefCell;
use std::sync::Arc;

use crate::principal::{Principal, Subject};

thread_local! {
    static CURRENT: RefCell<Option<Arc<SecurityContext>>> = const { RefCell::new(None) };
}

/// An established caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    caller: Principal,
    subject: Subject,
    server_generated: bool,
}

impl SecurityContext {
    /// Builds a context from the principals a login or provider established.
    ///
    /// The first non-anonymous principal becomes the caller principal; a
    /// subject without one yields the anonymous caller.
    pub fn new(subject: Subject) -> Self {
        let caller = subject
            .principals()
            .iter()
            .find(|p| !p.is_anonymous())
            .cloned()
            .unwrap_or_else(Principal::anonymous);
        Self {
            caller,
            subject,
            server_generated: false,
        }
    }

    /// The server-generated context installed for callers nobody authenticated.
    pub fn unauthenticated() -> Self {
        Self {
            caller: Principal::anonymous(),
            subject: Subject::with_principals([Principal::anonymous()]),
            server_generated: true,
        }
    }

    /// Returns the caller principal.
    pub fn caller_principal(&self) -> &Principal {
        &self.caller
    }

    /// Returns the subject backing this context.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// True when the server created this context rather than a login.
    pub fn did_server_generate_credentials(&self) -> bool {
        self.server_generated
    }

    /// Returns the context active on this thread, if any.
    pub fn current() -> Option<Arc<SecurityContext>> {
        CURRENT.with(|slot| slot.borrow().clone())
    }

    /// Installs `context` as this thread's active context and returns the previous one.
    pub fn set_current(context: Option<Arc<SecurityContext>>) -> Option<Arc<SecurityContext>> {
        CURRENT.with(|slot| slot.replace(context))
    }

    /// Installs the server-generated unauthenticated context.
    pub fn set_unauthenticated() {
        Self::set_current(Some(Arc::new(Self::unauthenticated())));
    }

    /// Clears this thread's active context.
    pub fn clear() {
        Self::set_current(None);
    }
}
