//! The realm adapter façade.
//!
//! [`RealmAdapter`] composes the gate, the authentication delegate, the
//! run-as switcher, the transport redirector and the nonce registry into
//! the request lifecycle the container drives:
//!
//! 1. [`find_security_constraints`](RealmAdapter::find_security_constraints)
//! 2. [`has_user_data_permission`](RealmAdapter::has_user_data_permission)
//! 3. [`pre_authenticate_check`](RealmAdapter::pre_authenticate_check)
//! 4. [`authenticate`](RealmAdapter::authenticate)
//! 5. [`has_resource_permission`](RealmAdapter::has_resource_permission)
//! 6. [`post_authenticate`](RealmAdapter::post_authenticate)
//!
//! One adapter serves every request thread of one application.

use std::sync::Arc;

use http::Method;
use rustls_pki_types::CertificateDer;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail};
use crate::authenticator::{
    ContainerEvents, LegacyAuthenticator, NoopEvents, RealmLogin, SecurityConfigSource,
};
use crate::certificate::{CertificateCredentials, CERTIFICATE_REALM};
use crate::config::{AdapterConfig, AuthConfig};
use crate::context::SecurityContext;
use crate::delegate::AuthenticationDelegate;
use crate::digest::{DigestCredentials, DigestRequest};
use crate::error::Error;
use crate::gate::{AuthorizationGate, PreAuthOptions, PreAuthOutcome, SecurityConstraints, UserDataDecision};
use crate::nonce::{
    InMemoryNonceCacheFactory, LazyNonceRegistry, NonceCacheFactory, NonceRegistry,
    SharedNonceCaches,
};
use crate::oracle::PermissionOracle;
use crate::principal::{Principal, Subject, WebPrincipal};
use crate::redirect::{HostResolver, RedirectTarget, SystemResolver, TransportRedirector};
use crate::runas::{ComponentInvocation, RunAsSwitcher};
use crate::secret::Password;
use crate::web::{HttpRequest, HttpResponse};

/// Outcome of the transport check as seen by the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDataOutcome {
    /// Proceed with the request.
    Allowed,
    /// Stop; an error response has been sent.
    Denied,
    /// Stop; a redirect to this HTTPS location has been sent.
    Redirected(String),
}

/// Authentication and authorization decisions for one web application.
pub struct RealmAdapter {
    config: AdapterConfig,
    gate: AuthorizationGate,
    delegate: AuthenticationDelegate,
    run_as: RunAsSwitcher,
    redirector: TransportRedirector,
    nonces: LazyNonceRegistry,
    login: Arc<dyn RealmLogin>,
    audit: Arc<AuditTrail>,
}

impl RealmAdapter {
    /// Starts building an adapter for `config`.
    pub fn builder(config: AdapterConfig) -> RealmAdapterBuilder {
        RealmAdapterBuilder::new(config)
    }

    /// The adapter's static configuration.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// The audit trail decisions are recorded on.
    pub fn audit_trail(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    /// The resolved security configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if resolution fails.
    pub fn auth_config(&self) -> Result<Arc<AuthConfig>, Error> {
        self.gate.auth_config()
    }

    /// Returns `None` when the container can skip every security check.
    ///
    /// # Errors
    ///
    /// Propagates configuration resolution failures.
    pub fn find_security_constraints(&self) -> Result<Option<SecurityConstraints>, Error> {
        self.gate.find_security_constraints()
    }

    /// Checks the transport guarantee, redirecting to HTTPS when the
    /// resource would be granted over a secure transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceUnavailable`] when the oracle fails and
    /// `Host` header errors from the redirect; a response has been sent in
    /// both cases.
    pub fn has_user_data_permission(
        &self,
        constraints: &SecurityConstraints,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        uri: Option<&str>,
        method: Option<&Method>,
    ) -> Result<UserDataOutcome, Error> {
        match self
            .gate
            .has_user_data_permission(constraints, request, response, uri, method)?
        {
            UserDataDecision::Allowed => Ok(UserDataOutcome::Allowed),
            UserDataDecision::Denied | UserDataDecision::BadRequest => Ok(UserDataOutcome::Denied),
            UserDataDecision::RedirectRequired => {
                let outcome = match self.redirector.redirect(&*request, response)? {
                    Some(location) => UserDataOutcome::Redirected(location),
                    None => UserDataOutcome::Denied,
                };
                let audit_outcome = match outcome {
                    UserDataOutcome::Redirected(_) => AuditOutcome::Success,
                    _ => AuditOutcome::Denied,
                };
                self.audit.record(
                    AuditEvent::new(AuditEventKind::TransportGuarantee, audit_outcome)
                        .with_path(request.request_uri())
                        .with_detail("confidential transport required"),
                );
                Ok(outcome)
            }
        }
    }

    /// Where an HTTPS redirect for `request` would point.
    ///
    /// # Errors
    ///
    /// Fails when the `Host` header is missing or unparsable.
    pub fn redirect_target(&self, request: &dyn HttpRequest) -> Result<RedirectTarget, Error> {
        self.redirector.compute_redirect_target(request)
    }

    /// Decides whether `request` needs authentication.
    ///
    /// # Errors
    ///
    /// Never fails for oracle or configuration problems; those are
    /// answered with a 503.
    pub fn pre_authenticate_check(
        &self,
        constraints: &SecurityConstraints,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        options: PreAuthOptions,
    ) -> Result<PreAuthOutcome, Error> {
        self.gate
            .pre_authenticate_check(constraints, request, response, options)
    }

    /// Authenticates `request`.
    ///
    /// `requested` marks an explicit authentication request from the
    /// application.
    ///
    /// # Errors
    ///
    /// Propagates configuration and legacy authenticator failures.
    pub fn authenticate(
        &self,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        requested: bool,
    ) -> Result<bool, Error> {
        let config = self.gate.auth_config()?;
        let oracle = self.gate.oracle();
        self.delegate
            .authenticate(&config, oracle.as_ref(), request, response, requested)
    }

    /// Checks resource permission; the provider still secures the response
    /// of a denied request.
    ///
    /// # Errors
    ///
    /// Propagates configuration and post-authenticate failures.
    pub fn has_resource_permission(
        &self,
        constraints: &SecurityConstraints,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
    ) -> Result<bool, Error> {
        self.gate
            .has_resource_permission(constraints, request, response, |request, _| {
                self.delegate.post_authenticate(request)
            })
    }

    /// Lets the provider secure the response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderAuthFailure`] if the provider fails.
    pub fn post_authenticate(&self, request: &mut dyn HttpRequest) -> Result<bool, Error> {
        self.delegate.post_authenticate(request)
    }

    /// Logs the caller on `request` out.
    ///
    /// Pass `in_logout` when called from within a logout already in progress.
    ///
    /// # Errors
    ///
    /// Returns logout failures after the legacy logout has run.
    pub fn logout(&self, request: &mut dyn HttpRequest, in_logout: bool) -> Result<(), Error> {
        let config = self.gate.auth_config()?;
        self.delegate.logout(&config, request, in_logout)
    }

    /// Clears the thread's security context without touching any request.
    pub fn clear_security_context(&self) {
        SecurityContext::clear();
    }

    /// Re-installs the context `principal` was established under on this thread.
    ///
    /// A principal without a stored context leaves the thread unauthenticated.
    pub fn set_current_security_context(&self, principal: &WebPrincipal) {
        SecurityContext::set_current(principal.security_context().cloned());
    }

    /// Releases the provider of a resolved configuration.
    ///
    /// Nothing is resolved here; an adapter that never served a request has
    /// no provider to release.
    pub fn shutdown(&self) {
        let Some(config) = self.gate.resolved_auth_config() else {
            return;
        };
        if let Some(provider) = config.provider() {
            tracing::debug!(app = %self.config.app_context_id(), "disabling authentication provider");
            provider.disable();
        }
    }

    /// Whether `principal` holds `role` for the servlet `request` is mapped to.
    pub fn has_role(&self, request: &dyn HttpRequest, principal: Option<&Principal>, role: &str) -> bool {
        let component = request.servlet_name().unwrap_or_default();
        self.has_role_for(component, principal, role)
    }

    /// Whether `principal` holds `role` as referenced by `component`.
    pub fn has_role_for(&self, component: &str, principal: Option<&Principal>, role: &str) -> bool {
        let granted = self
            .gate
            .oracle()
            .has_role_ref_permission(component, role, principal);
        tracing::debug!(
            component,
            role,
            principal = principal.map(Principal::name).unwrap_or("<none>"),
            granted,
            "role check"
        );
        granted
    }

    /// Username/password login against the application's realm.
    ///
    /// On success the new context is installed on this thread. Failures
    /// are logged and audited and yield `None`.
    pub fn authenticate_password(&self, username: &str, password: &Password) -> Option<WebPrincipal> {
        let realm = self.realm();
        match self.login.login(username, password, &realm) {
            Ok(subject) => Some(self.install(subject)),
            Err(e) => {
                tracing::warn!(username, %realm, error = %e, "password login failed");
                self.record_login_failure(username, &e.to_string());
                None
            }
        }
    }

    /// Digest login with replay protection.
    ///
    /// The client nonce count must advance past every count previously
    /// admitted for that nonce. Replays, malformed parameters and realm
    /// failures are logged and audited and yield `None`.
    pub fn authenticate_digest(&self, request: &DigestRequest) -> Option<WebPrincipal> {
        let (cnonce, count) = match request.nonce_count() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting digest request");
                self.record_login_failure(request.username().unwrap_or("<none>"), &e.to_string());
                return None;
            }
        };

        if let Err(e) = self.nonce_registry().admit(cnonce, count) {
            self.audit.record(
                AuditEvent::new(AuditEventKind::ReplayDetection, AuditOutcome::Denied)
                    .with_principal(request.username().unwrap_or("<none>"))
                    .with_detail(e.to_string()),
            );
            return None;
        }

        let Some(username) = request.username() else {
            tracing::warn!("digest request carries no username");
            self.record_login_failure("<none>", "digest request carries no username");
            return None;
        };

        let credentials = DigestCredentials {
            realm: self.realm(),
            username: username.to_string(),
            params: request.params().to_vec(),
        };
        match self.login.login_digest(&credentials) {
            Ok(subject) => Some(self.install(subject)),
            Err(e) => {
                tracing::warn!(username, error = %e, "digest login failed");
                self.record_login_failure(username, &e.to_string());
                None
            }
        }
    }

    /// Client-certificate login against the certificate realm.
    ///
    /// `chain` has been verified by the TLS layer; its leaf subject names the
    /// caller. The returned principal carries the chain. Unparsable chains and
    /// realm failures are logged and audited and yield `None`.
    pub fn authenticate_certificate(&self, chain: &[CertificateDer<'_>]) -> Option<WebPrincipal> {
        let credentials = match CertificateCredentials::from_chain(chain) {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting client certificate");
                self.record_login_failure("<none>", &e.to_string());
                return None;
            }
        };

        match self.login.login_certificate(&credentials, CERTIFICATE_REALM) {
            Ok(subject) => Some(self.install(subject).with_certificates(credentials.into_chain())),
            Err(e) => {
                tracing::warn!(subject = credentials.subject(), error = %e, "certificate login failed");
                self.record_login_failure(credentials.subject(), &e.to_string());
                None
            }
        }
    }

    /// Logs `principal` in again and installs the resulting context.
    ///
    /// Certificate principals repeat the certificate login with their chain.
    /// Passwords are never retained, so any other principal is re-established
    /// by name without credentials.
    pub fn reauthenticate(&self, principal: &WebPrincipal) -> bool {
        let established = match principal.certificates() {
            Some(chain) => self.authenticate_certificate(chain),
            None => self.create_failover_principal(principal.name()),
        };
        established.is_some()
    }

    /// Re-establishes `username` without credentials after session failover.
    pub fn create_failover_principal(&self, username: &str) -> Option<WebPrincipal> {
        let realm = self.realm();
        match self.login.login_principal(username, &realm) {
            Ok(subject) => Some(self.install(subject)),
            Err(e) => {
                tracing::warn!(username, %realm, error = %e, "failover login failed");
                self.record_login_failure(username, &e.to_string());
                None
            }
        }
    }

    /// The application's nonce registry, created on first use.
    pub fn nonce_registry(&self) -> Arc<NonceRegistry> {
        self.nonces.get()
    }

    /// Installs the run-as identity declared for `invocation`'s component.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoginFailed`] if the realm refuses the identity.
    pub fn apply_run_as(&self, invocation: &mut ComponentInvocation) -> Result<(), Error> {
        self.run_as.apply(invocation)
    }

    /// Restores the identity saved by [`apply_run_as`](Self::apply_run_as).
    pub fn revert_run_as(&self, invocation: &ComponentInvocation) {
        self.run_as.revert(invocation)
    }

    /// Swaps the permission oracle after a policy update.
    pub fn replace_oracle(&self, oracle: Arc<dyn PermissionOracle>) {
        self.gate.replace_oracle(oracle);
    }

    fn realm(&self) -> String {
        self.gate
            .auth_config()
            .ok()
            .and_then(|config| {
                config
                    .login_config()
                    .and_then(|login| login.realm_name.clone())
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or_else(|| self.config.realm_name().to_string())
    }

    fn install(&self, subject: Subject) -> WebPrincipal {
        let context = Arc::new(SecurityContext::new(subject));
        SecurityContext::set_current(Some(Arc::clone(&context)));
        let principal = WebPrincipal::new(context.caller_principal().clone(), Some(context));
        self.audit.record(
            AuditEvent::new(AuditEventKind::Authentication, AuditOutcome::Success)
                .with_principal(principal.name()),
        );
        principal
    }

    fn record_login_failure(&self, username: &str, detail: &str) {
        self.audit.record(
            AuditEvent::new(AuditEventKind::Authentication, AuditOutcome::Denied)
                .with_principal(username)
                .with_detail(detail),
        );
    }
}

impl std::fmt::Debug for RealmAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmAdapter")
            .field("app_context_id", &self.config.app_context_id())
            .field("run_as", &self.run_as)
            .field("redirector", &self.redirector)
            .finish()
    }
}

/// Wires a [`RealmAdapter`] to its collaborators.
///
/// The config source, oracle, authenticator and realm login are required.
/// Events default to [`NoopEvents`], host resolution to
/// [`SystemResolver`] and nonce caches to private in-memory registries.
///
/// # Examples
///
/// ```ignore
/// let adapter = RealmAdapter::builder(config)
///     .security_config_source(source)
///     .oracle(oracle)
///     .authenticator(authenticator)
///     .realm_login(login)
///     .build()?;
/// ```
pub struct RealmAdapterBuilder {
    config: AdapterConfig,
    source: Option<Arc<dyn SecurityConfigSource>>,
    oracle: Option<Arc<dyn PermissionOracle>>,
    authenticator: Option<Arc<dyn LegacyAuthenticator>>,
    login: Option<Arc<dyn RealmLogin>>,
    events: Arc<dyn ContainerEvents>,
    resolver: Option<Box<dyn HostResolver>>,
    shared_nonces: Option<Arc<dyn SharedNonceCaches>>,
    nonce_factory: Arc<dyn NonceCacheFactory>,
    audit: Arc<AuditTrail>,
}

impl RealmAdapterBuilder {
    fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            source: None,
            oracle: None,
            authenticator: None,
            login: None,
            events: Arc::new(NoopEvents),
            resolver: None,
            shared_nonces: None,
            nonce_factory: Arc::new(InMemoryNonceCacheFactory),
            audit: Arc::new(AuditTrail::new()),
        }
    }

    /// Source of the declared login config and provider.
    pub fn security_config_source(mut self, source: Arc<dyn SecurityConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Permission oracle for the application.
    pub fn oracle(mut self, oracle: Arc<dyn PermissionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// The container's legacy authenticator.
    pub fn authenticator(mut self, authenticator: Arc<dyn LegacyAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Realm login used for every credential kind, run-as and failover.
    pub fn realm_login(mut self, login: Arc<dyn RealmLogin>) -> Self {
        self.login = Some(login);
        self
    }

    /// Receiver of container lifecycle events.
    pub fn events(mut self, events: Arc<dyn ContainerEvents>) -> Self {
        self.events = events;
        self
    }

    /// Host resolution used for redirect listener matching.
    pub fn host_resolver(mut self, resolver: Box<dyn HostResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Cluster-managed nonce registries, preferred over private ones.
    pub fn shared_nonce_caches(mut self, shared: Arc<dyn SharedNonceCaches>) -> Self {
        self.shared_nonces = Some(shared);
        self
    }

    /// Factory for private nonce registries.
    pub fn nonce_cache_factory(mut self, factory: Arc<dyn NonceCacheFactory>) -> Self {
        self.nonce_factory = factory;
        self
    }

    /// Audit trail to record decisions on.
    pub fn audit_trail(mut self, audit: Arc<AuditTrail>) -> Self {
        self.audit = audit;
        self
    }

    /// Builds the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first missing collaborator.
    pub fn build(self) -> Result<RealmAdapter, Error> {
        let source = self.source.ok_or_else(|| missing("security config source"))?;
        let oracle = self.oracle.ok_or_else(|| missing("permission oracle"))?;
        let authenticator = self.authenticator.ok_or_else(|| missing("authenticator"))?;
        let login = self.login.ok_or_else(|| missing("realm login"))?;
        let resolver = self
            .resolver
            .unwrap_or_else(|| Box::new(SystemResolver::new()));

        let config = self.config;
        tracing::debug!(
            app = %config.app_name,
            context = %config.app_context_id(),
            realm = config.realm_name(),
            "building realm adapter"
        );

        Ok(RealmAdapter {
            gate: AuthorizationGate::new(&config, source, oracle, Arc::clone(&self.audit)),
            delegate: AuthenticationDelegate::new(authenticator, self.events, Arc::clone(&self.audit)),
            run_as: RunAsSwitcher::new(
                &config.run_as,
                Arc::clone(&login),
                config.realm_name(),
                Arc::clone(&self.audit),
            ),
            redirector: TransportRedirector::new(
                config.redirect_port,
                config.listeners.clone(),
                config.session_parameter.clone(),
                resolver,
            ),
            nonces: LazyNonceRegistry::new(
                config.app_name.clone(),
                self.shared_nonces,
                self.nonce_factory,
            ),
            login,
            audit: self.audit,
            config,
        })
    }
}

fn missing(what: &str) -> Error {
    Error::Configuration(format!("realm adapter requires a {what}"))
}
