//! Container-side collaborators: the legacy authenticator, realm logins and
//! lifecycle notifications.

use std::sync::Arc;

use crate::certificate::CertificateCredentials;
use crate::config::LoginConfig;
use crate::digest::DigestCredentials;
use crate::error::{Error, LoginError};
use crate::principal::{Subject, WebPrincipal};
use crate::provider::AuthProvider;
use crate::secret::Password;
use crate::web::{HttpRequest, HttpResponse};

/// The container's built-in login mechanism.
pub trait LegacyAuthenticator: Send + Sync {
    /// Authenticates the request per the login config.
    ///
    /// Returns `false` when a challenge or error response has been sent.
    fn authenticate(
        &self,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        login_config: Option<&LoginConfig>,
    ) -> Result<bool, Error>;

    /// Registers an established principal with the container's session and SSO machinery.
    fn register(
        &self,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        principal: WebPrincipal,
        auth_type: &str,
        username: &str,
        password: Option<&Password>,
    ) -> Result<(), Error>;

    /// Logs the caller on `request` out.
    ///
    /// `in_logout` is true when the provider subject has already been
    /// cleaned by an enclosing adapter logout. Implementations that call
    /// back into [`RealmAdapter::logout`](crate::RealmAdapter::logout) must
    /// pass it on, so the nested call goes straight to the legacy logout.
    fn logout(&self, request: &mut dyn HttpRequest, in_logout: bool) -> Result<(), Error>;

    /// True if the authenticator caches principals in sessions.
    fn caches_sessions(&self) -> bool {
        false
    }
}

/// Login against the application's realm.
///
/// Each successful call returns the subject the realm established; the
/// adapter turns it into the thread's security context.
pub trait RealmLogin: Send + Sync {
    /// Username/password login.
    fn login(&self, username: &str, password: &Password, realm: &str)
        -> Result<Subject, LoginError>;

    /// Credential-less login used for run-as identities and failover.
    fn login_principal(&self, principal: &str, realm: &str) -> Result<Subject, LoginError>;

    /// Digest login.
    fn login_digest(&self, credentials: &DigestCredentials) -> Result<Subject, LoginError>;

    /// Client-certificate login keyed on the leaf certificate's subject.
    fn login_certificate(
        &self,
        credentials: &CertificateCredentials,
        realm: &str,
    ) -> Result<Subject, LoginError>;
}

/// Lifecycle notifications fired around provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerEvent {
    /// Before provider validation
    BeforeAuthentication,
    /// After provider validation, whatever its outcome
    AfterAuthentication,
    /// Before the provider secures the response
    BeforePostAuthentication,
    /// After the provider secured the response, whatever its outcome
    AfterPostAuthentication,
    /// Before the provider cleans the subject
    BeforeLogout,
    /// After the provider cleaned the subject, whatever its outcome
    AfterLogout,
}

/// Receives [`ContainerEvent`]s.
pub trait ContainerEvents: Send + Sync {
    /// Delivers one event.
    fn fire(&self, event: ContainerEvent);
}

/// Event sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl ContainerEvents for NoopEvents {
    fn fire(&self, _event: ContainerEvent) {}
}

/// Runs `f` between `before` and `after`; `after` fires regardless of the result.
pub(crate) fn bracket<T>(
    events: &dyn ContainerEvents,
    before: ContainerEvent,
    after: ContainerEvent,
    f: impl FnOnce() -> T,
) -> T {
    events.fire(before);
    let result = f();
    events.fire(after);
    result
}

/// Source of the application's declared security configuration.
///
/// Consulted exactly once per adapter, when the auth config is first
/// resolved.
pub trait SecurityConfigSource: Send + Sync {
    /// The login config declared for the application.
    fn login_config(&self) -> Option<LoginConfig>;

    /// The pluggable provider configured for `app_context_id`, if any.
    ///
    /// `default_provider_id` names the provider system applications fall back to.
    fn auth_provider(
        &self,
        app_context_id: &str,
        is_system_app: bool,
        default_provider_id: Option<&str>,
    ) -> Result<Option<Arc<dyn AuthProvider>>, Error>;
}
