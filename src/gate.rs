use std::sync::Arc;

use http::{Method, StatusCode};
use parking_lot::RwLock;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail};
use crate::authenticator::SecurityConfigSource;
use crate::config::{AdapterConfig, AuthConfig};
use crate::context::SecurityContext;
use crate::error::{Error, OracleError};
use crate::logging::RequestLog;
use crate::oracle::{PermissionOracle, UserDataVerdict};
use crate::web::{HttpRequest, HttpResponse};

/// Detail message recorded with 403 and 503 responses.
pub(crate) const FORBIDDEN_DETAIL: &str = "Access to the requested resource has been denied";

/// `Expires` value that marks a response as already stale.
const DATE_ONE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Proof that the application has constrained resources.
///
/// Obtained from [`AuthorizationGate::find_security_constraints`]; when that
/// returns `None` the container can skip every security check for the
/// request. It cannot be constructed outside this crate.
#[derive(Debug, Clone, Copy)]
pub struct SecurityConstraints {
    _private: (),
}

impl SecurityConstraints {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

/// Decision on a request's transport guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDataDecision {
    /// The transport satisfies the constraints.
    Allowed,
    /// Denied; a 403 has been sent.
    Denied,
    /// The permission query was malformed; a 400 has been sent.
    BadRequest,
    /// Granted once upgraded; the caller must redirect to HTTPS.
    RedirectRequired,
}

/// Result of the pre-authenticate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreAuthOutcome {
    /// The request may proceed without authentication.
    NotNeeded,
    /// The caller must authenticate.
    Needed,
    /// The caller is authenticated but not authorized, or the check failed; a response has been sent.
    AuthenticatedButNotAuthorized,
}

/// Container switches honoured by the pre-authenticate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreAuthOptions {
    /// Add headers preventing proxies from caching protected responses
    pub disable_proxy_caching: bool,
    /// Use `Pragma`/`no-cache` instead of `Cache-Control: private`
    pub secure_pages_with_pragma: bool,
    /// Single sign-on is enabled for the virtual server
    pub sso_enabled: bool,
}

impl Default for PreAuthOptions {
    fn default() -> Self {
        Self {
            disable_proxy_caching: true,
            secure_pages_with_pragma: false,
            sso_enabled: false,
        }
    }
}

/// Decides whether a request may reach its resource.
///
/// The gate resolves the application's [`AuthConfig`] lazily, exactly once,
/// and consults the [`PermissionOracle`] for every decision except the
/// form-login bypass, which is evaluated before any oracle call.
///
/// # Examples
///
/// ```ignore
/// let gate = AuthorizationGate::new(&config, source, oracle, audit);
/// if let Some(constraints) = gate.find_security_constraints()? {
///     match gate.pre_authenticate_check(&constraints, &mut req, &mut resp, PreAuthOptions::default())? {
///         PreAuthOutcome::NotNeeded => { /* serve */ }
///         PreAuthOutcome::Needed => { /* authenticate */ }
///         PreAuthOutcome::AuthenticatedButNotAuthorized => { /* response already sent */ }
///     }
/// }
/// ```
pub struct AuthorizationGate {
    app_context_id: String,
    is_system_app: bool,
    default_provider_id: Option<String>,
    form_action: String,
    source: Arc<dyn SecurityConfigSource>,
    oracle: RwLock<Arc<dyn PermissionOracle>>,
    resolved: RwLock<Option<Arc<AuthConfig>>>,
    audit: Arc<AuditTrail>,
}

impl AuthorizationGate {
    /// Creates a gate; nothing is resolved until first use.
    pub fn new(
        config: &AdapterConfig,
        source: Arc<dyn SecurityConfigSource>,
        oracle: Arc<dyn PermissionOracle>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            app_context_id: config.app_context_id(),
            is_system_app: config.is_system_app,
            default_provider_id: config.default_provider_id().map(str::to_string),
            form_action: config.form_action.clone(),
            source,
            oracle: RwLock::new(oracle),
            resolved: RwLock::new(None),
            audit,
        }
    }

    /// Returns the application's security configuration, resolving it on first use.
    ///
    /// Concurrent first callers block on the write lock; exactly one of them
    /// consults the config source and every caller observes its result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the provider lookup fails. Nothing
    /// is cached in that case.
    pub fn auth_config(&self) -> Result<Arc<AuthConfig>, Error> {
        if let Some(config) = self.resolved.read().as_ref() {
            return Ok(Arc::clone(config));
        }

        let mut resolved = self.resolved.write();
        if let Some(config) = resolved.as_ref() {
            return Ok(Arc::clone(config));
        }

        let login_config = self.source.login_config();
        let provider = self
            .source
            .auth_provider(
                &self.app_context_id,
                self.is_system_app,
                self.default_provider_id.as_deref(),
            )
            .map_err(|e| {
                if matches!(e, Error::Configuration(_)) {
                    e
                } else {
                    Error::Configuration(e.to_string())
                }
            })?;

        let config = Arc::new(AuthConfig::new(login_config, provider));
        tracing::debug!(
            app = %self.app_context_id,
            login_page = ?config.login_page(),
            error_page = ?config.error_page(),
            provider = config.provider_configured(),
            "resolved security configuration"
        );
        *resolved = Some(Arc::clone(&config));
        Ok(config)
    }

    /// The security configuration if it has already been resolved.
    pub fn resolved_auth_config(&self) -> Option<Arc<AuthConfig>> {
        self.resolved.read().clone()
    }

    /// The current permission oracle.
    pub fn oracle(&self) -> Arc<dyn PermissionOracle> {
        Arc::clone(&self.oracle.read())
    }

    /// Replaces the permission oracle after a policy update.
    pub fn replace_oracle(&self, oracle: Arc<dyn PermissionOracle>) {
        *self.oracle.write() = oracle;
        tracing::debug!(app = %self.app_context_id, "permission oracle replaced");
    }

    /// Returns `None` when no resource is constrained and no provider is configured.
    ///
    /// # Errors
    ///
    /// Propagates configuration resolution failures.
    pub fn find_security_constraints(&self) -> Result<Option<SecurityConstraints>, Error> {
        let config = self.auth_config()?;
        if self.oracle().has_no_constrained_resources() && !config.provider_configured() {
            return Ok(None);
        }
        Ok(Some(SecurityConstraints::new()))
    }

    /// Checks the transport guarantee for `request`, or for `uri` and `method` if given.
    ///
    /// Secure requests are allowed without consulting the oracle. On
    /// [`UserDataDecision::RedirectRequired`] the caller must redirect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceUnavailable`] after sending a 503 if the
    /// oracle fails unexpectedly.
    pub fn has_user_data_permission(
        &self,
        _constraints: &SecurityConstraints,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        uri: Option<&str>,
        method: Option<&Method>,
    ) -> Result<UserDataDecision, Error> {
        ensure_servlet_path(request);
        let log = RequestLog::for_request(request);
        log.debug(format_args!(
            "checking user data permission, context path {}",
            request.context_path()
        ));

        if request.is_secure() {
            log.debug(format_args!("request is secure"));
            return Ok(UserDataDecision::Allowed);
        }

        let oracle = self.oracle();
        match oracle.has_user_data_permission(&*request, uri, method) {
            Ok(UserDataVerdict::Granted) => Ok(UserDataDecision::Allowed),
            Ok(UserDataVerdict::RequiresSecureTransport) => {
                log.debug(format_args!("confidential transport required, redirecting"));
                Ok(UserDataDecision::RedirectRequired)
            }
            Ok(UserDataVerdict::Denied) => {
                response.send_error(StatusCode::FORBIDDEN, Some(FORBIDDEN_DETAIL.to_string()));
                self.record(&log, AuditEventKind::TransportGuarantee, AuditOutcome::Denied, "user data permission denied");
                Ok(UserDataDecision::Denied)
            }
            Err(OracleError::InvalidRequest(msg)) => {
                log.warn(format_args!("bad request while checking user data permission: {msg}"));
                response.send_error(StatusCode::BAD_REQUEST, Some("Bad request".to_string()));
                self.record(&log, AuditEventKind::TransportGuarantee, AuditOutcome::Denied, &msg);
                Ok(UserDataDecision::BadRequest)
            }
            Err(OracleError::Failure(msg)) => {
                log.error(format_args!("user data permission check failed: {msg}"));
                response.send_error(StatusCode::SERVICE_UNAVAILABLE, None);
                response.set_detail_message(FORBIDDEN_DETAIL);
                self.record(&log, AuditEventKind::TransportGuarantee, AuditOutcome::Error, &msg);
                Err(Error::ServiceUnavailable(msg))
            }
        }
    }

    /// Checks resource permission, sending 403 or 503 on denial.
    ///
    /// On an ordinary denial `post_authenticate` still runs, so a provider
    /// can finalize its exchange whatever the outcome.
    ///
    /// # Errors
    ///
    /// Propagates configuration failures and failures of `post_authenticate`.
    pub fn has_resource_permission<F>(
        &self,
        _constraints: &SecurityConstraints,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        post_authenticate: F,
    ) -> Result<bool, Error>
    where
        F: FnOnce(&mut dyn HttpRequest, &mut dyn HttpResponse) -> Result<bool, Error>,
    {
        let config = self.auth_config()?;
        let log = RequestLog::for_request(request);

        match self.check_resource_permission(request, &config) {
            Ok(true) => Ok(true),
            Ok(false) => {
                response.send_error(StatusCode::FORBIDDEN, None);
                response.set_detail_message(FORBIDDEN_DETAIL);
                self.record(&log, AuditEventKind::Authorization, AuditOutcome::Denied, "resource permission denied");
                post_authenticate(request, response)?;
                Ok(false)
            }
            Err(e) => {
                log.error(format_args!("resource permission check failed: {e}"));
                response.send_error(StatusCode::SERVICE_UNAVAILABLE, None);
                response.set_detail_message(FORBIDDEN_DETAIL);
                self.record(&log, AuditEventKind::Authorization, AuditOutcome::Error, &e.to_string());
                Ok(false)
            }
        }
    }

    /// Decides whether the request needs authentication.
    ///
    /// Installs the unauthenticated context first when no caller is
    /// established. Unexpected failures answer 503 and yield
    /// [`PreAuthOutcome::AuthenticatedButNotAuthorized`] rather than an error.
    pub fn pre_authenticate_check(
        &self,
        _constraints: &SecurityConstraints,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        options: PreAuthOptions,
    ) -> Result<PreAuthOutcome, Error> {
        if request.user_principal().is_none() {
            SecurityContext::set_unauthenticated();
        }
        let log = RequestLog::for_request(request);

        let granted = match self
            .auth_config()
            .and_then(|config| {
                if config.provider_configured() {
                    return Ok(None);
                }
                Ok(Some(self.check_resource_permission(request, &config)?))
            }) {
            Ok(None) => return Ok(PreAuthOutcome::Needed),
            Ok(Some(granted)) => granted,
            Err(e) => {
                log.error(format_args!("pre-authenticate check failed: {e}"));
                response.send_error(StatusCode::SERVICE_UNAVAILABLE, None);
                response.set_detail_message(FORBIDDEN_DETAIL);
                self.record(&log, AuditEventKind::Authorization, AuditOutcome::Error, &e.to_string());
                return Ok(PreAuthOutcome::AuthenticatedButNotAuthorized);
            }
        };

        let authenticated = request.user_principal().is_some();
        if granted {
            if authenticated {
                disable_proxy_caching(request, response, options);
                if options.sso_enabled {
                    match self.oracle().permit_all(&*request) {
                        Ok(false) => request.create_session(),
                        Ok(true) => {}
                        Err(e) => log.warn(format_args!("permit-all check for SSO failed: {e}")),
                    }
                }
            }
            return Ok(PreAuthOutcome::NotNeeded);
        }

        if authenticated {
            response.send_error(StatusCode::FORBIDDEN, None);
            response.set_detail_message(FORBIDDEN_DETAIL);
            self.record(&log, AuditEventKind::Authorization, AuditOutcome::Denied, "authenticated caller not authorized");
            Ok(PreAuthOutcome::AuthenticatedButNotAuthorized)
        } else {
            disable_proxy_caching(request, response, options);
            Ok(PreAuthOutcome::Needed)
        }
    }

    /// Asks the oracle for resource permission, honouring the form-login bypass.
    ///
    /// The login page, the error page and form submissions are allowed
    /// before the oracle is consulted, so a login flow can never be blocked
    /// by the constraints it is trying to satisfy.
    pub(crate) fn check_resource_permission(
        &self,
        request: &mut dyn HttpRequest,
        config: &AuthConfig,
    ) -> Result<bool, OracleError> {
        if config.login_page().is_some() || config.error_page().is_some() {
            let path = request.request_path();
            if config.login_page() == Some(path) {
                tracing::debug!(path, "allowing access to login page");
                return Ok(true);
            }
            if config.error_page() == Some(path) {
                tracing::debug!(path, "allowing access to error page");
                return Ok(true);
            }
            if path.ends_with(self.form_action.as_str()) {
                tracing::debug!(path, "allowing credential submission");
                return Ok(true);
            }
        }

        ensure_servlet_path(request);
        let oracle = self.oracle();
        oracle.has_resource_permission(&*request)
    }

    fn record(&self, log: &RequestLog, kind: AuditEventKind, outcome: AuditOutcome, detail: &str) {
        self.audit.record(
            AuditEvent::new(kind, outcome)
                .with_path(log.path())
                .with_principal(log.principal())
                .with_detail(detail),
        );
    }
}

/// Sets the servlet path from the URI when the container has not.
fn ensure_servlet_path(request: &mut dyn HttpRequest) {
    if request.servlet_path().is_none() {
        let path = request.request_path().to_string();
        request.set_servlet_path(path);
    }
}

fn disable_proxy_caching(
    request: &dyn HttpRequest,
    response: &mut dyn HttpResponse,
    options: PreAuthOptions,
) {
    if !options.disable_proxy_caching || *request.method() == Method::POST {
        return;
    }
    if options.secure_pages_with_pragma {
        response.set_header("Pragma", "No-cache");
        response.set_header("Cache-Control", "no-cache");
    } else {
        response.set_header("Cache-Control", "private");
    }
    response.set_header("Expires", DATE_ONE);
}
