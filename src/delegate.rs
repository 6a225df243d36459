//! Provider-driven authentication.
//!
//! With no provider configured every call is a strict pass-through to the
//! legacy authenticator. Otherwise the delegate runs the provider's
//! validate / secure / clean lifecycle, installs the established
//! [`SecurityContext`] and caches the negotiated provider context on the
//! request for the post-authenticate phase.

use std::sync::Arc;

use http::StatusCode;

use crate::audit::{AuditEvent, AuditEventKind, AuditOutcome, AuditTrail};
use crate::authenticator::{bracket, ContainerEvent, ContainerEvents, LegacyAuthenticator};
use crate::config::AuthConfig;
use crate::context::SecurityContext;
use crate::error::{Error, ProviderError};
use crate::logging::RequestLog;
use crate::oracle::PermissionOracle;
use crate::principal::{Subject, WebPrincipal};
use crate::provider::{AuthProvider, AuthStatus, MessageInfo, PROXY_AUTH_TYPE};
use crate::web::{HttpRequest, HttpResponse};

/// Runs authentication for one application.
pub struct AuthenticationDelegate {
    authenticator: Arc<dyn LegacyAuthenticator>,
    events: Arc<dyn ContainerEvents>,
    audit: Arc<AuditTrail>,
}

impl AuthenticationDelegate {
    /// Creates a delegate over the container's authenticator.
    pub fn new(
        authenticator: Arc<dyn LegacyAuthenticator>,
        events: Arc<dyn ContainerEvents>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            authenticator,
            events,
            audit,
        }
    }

    /// Authenticates `request`.
    ///
    /// Without a provider this returns the legacy authenticator's result
    /// unchanged. With one, provider validation runs between the
    /// authentication events. `requested` marks an explicit authentication
    /// request from the application, which always makes the exchange
    /// mandatory.
    ///
    /// # Errors
    ///
    /// Only the legacy authenticator's failures propagate. Provider
    /// failures, and an oracle failure deciding whether the exchange is
    /// mandatory, are answered with a 500 and yield `Ok(false)`.
    pub fn authenticate(
        &self,
        config: &AuthConfig,
        oracle: &dyn PermissionOracle,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        requested: bool,
    ) -> Result<bool, Error> {
        let Some(provider) = config.provider() else {
            return self
                .authenticator
                .authenticate(request, response, config.login_config());
        };

        bracket(
            self.events.as_ref(),
            ContainerEvent::BeforeAuthentication,
            ContainerEvent::AfterAuthentication,
            || Ok(self.validate(provider.as_ref(), config, oracle, request, response, requested)),
        )
    }

    fn validate(
        &self,
        provider: &dyn AuthProvider,
        config: &AuthConfig,
        oracle: &dyn PermissionOracle,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        requested: bool,
    ) -> bool {
        let log = RequestLog::for_request(request);

        let permit_all = match oracle.permit_all(&*request) {
            Ok(permit_all) => permit_all,
            Err(e) => {
                log.error(format_args!("permit-all check failed before validation: {e}"));
                response.send_error(StatusCode::INTERNAL_SERVER_ERROR, Some(e.to_string()));
                self.record(&log, AuditOutcome::Error, &e.to_string());
                return false;
            }
        };
        let mandatory = !permit_all || requested;

        let mut info = MessageInfo::new();
        info.set_mandatory(mandatory);
        let mut subject = Subject::new();

        let validated = provider.auth_context(&info).and_then(|context| {
            let context = context
                .ok_or_else(|| ProviderError::Auth("no provider context for exchange".to_string()))?;
            let status = context.validate_request(&*request, &mut info, &mut subject)?;
            Ok((context, status))
        });

        let context = match validated {
            Ok((context, AuthStatus::Success)) => context,
            Ok((_, status)) => {
                log.debug(format_args!("provider returned {status:?}"));
                if mandatory {
                    self.record(&log, AuditOutcome::Denied, &format!("provider returned {status:?}"));
                }
                return false;
            }
            Err(ProviderError::Auth(reason)) => {
                log.warn(format_args!("provider rejected the exchange: {reason}"));
                response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                response.set_detail_message(&reason);
                self.record(&log, AuditOutcome::Error, &reason);
                return false;
            }
            Err(e @ ProviderError::Runtime(_)) => {
                log.error(format_args!("provider failed during validation: {e}"));
                response.send_error(StatusCode::INTERNAL_SERVER_ERROR, Some(e.to_string()));
                self.record(&log, AuditOutcome::Error, &e.to_string());
                return false;
            }
        };

        if subject.is_empty() || subject.contains_only_anonymous() {
            if request.user_principal().is_some() {
                request.set_user_principal(None);
                request.set_auth_type(None);
            }
            if mandatory {
                log.debug(format_args!("no caller principal established for mandatory exchange"));
                self.record(&log, AuditOutcome::Denied, "no caller principal established");
                return false;
            }
        } else {
            let name = self.establish(subject, &info, config, request, response);
            self.audit.record(
                AuditEvent::new(AuditEventKind::Authentication, AuditOutcome::Success)
                    .with_path(log.path())
                    .with_principal(name),
            );
        }

        info.cache_auth_context(context);
        request.set_message_info(info);
        true
    }

    /// Installs the context for `subject` and records the caller on the request.
    ///
    /// Returns the caller principal's name.
    fn establish(
        &self,
        subject: Subject,
        info: &MessageInfo,
        config: &AuthConfig,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
    ) -> String {
        let context = Arc::new(SecurityContext::new(subject));
        SecurityContext::set_current(Some(Arc::clone(&context)));

        let principal = WebPrincipal::new(context.caller_principal().clone(), Some(context));
        let name = principal.name().to_string();
        let auth_type = info
            .auth_type()
            .or_else(|| config.auth_method())
            .unwrap_or(PROXY_AUTH_TYPE)
            .to_string();

        if info.should_register() {
            self.register(request, response, principal, &auth_type);
        } else {
            request.set_auth_type(Some(auth_type));
            request.set_user_principal(Some(principal));
        }
        name
    }

    /// Hands the principal to the container's session and SSO registration.
    ///
    /// Failures are logged; authentication still succeeds.
    fn register(
        &self,
        request: &mut dyn HttpRequest,
        response: &mut dyn HttpResponse,
        principal: WebPrincipal,
        auth_type: &str,
    ) {
        if self.authenticator.caches_sessions() {
            request.create_session();
        }
        let username = principal.name().to_string();
        if let Err(e) = self
            .authenticator
            .register(request, response, principal, auth_type, &username, None)
        {
            tracing::error!(principal = %username, error = %e, "unable to register session");
        }
    }

    /// Lets the provider secure the response of a validated exchange.
    ///
    /// Returns false when no provider context is cached on the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderAuthFailure`] if the provider fails.
    pub fn post_authenticate(&self, request: &mut dyn HttpRequest) -> Result<bool, Error> {
        let Some(mut info) = request.take_message_info() else {
            return Ok(false);
        };
        let Some(context) = info.auth_context().cloned() else {
            request.set_message_info(info);
            return Ok(false);
        };

        let status = bracket(
            self.events.as_ref(),
            ContainerEvent::BeforePostAuthentication,
            ContainerEvent::AfterPostAuthentication,
            || context.secure_response(&*request, &mut info),
        );
        request.set_message_info(info);

        let status = status.inspect_err(|e| {
            tracing::warn!(path = %request.request_uri(), error = %e, "provider failed to secure response");
        })?;
        Ok(status == AuthStatus::Success)
    }

    /// Logs the caller out.
    ///
    /// With a provider configured, and unless `in_logout` marks a nested
    /// call, the provider cleans the caller's subject first. The legacy
    /// logout always runs afterwards and the thread's context is cleared.
    ///
    /// The legacy authenticator is told whether it runs inside a provider
    /// logout: after a cleanup, or when `in_logout` was passed in. A
    /// re-entering authenticator hands that flag back, so the provider
    /// cleans the subject once per logout.
    ///
    /// # Errors
    ///
    /// Returns the legacy logout's failure if it failed, else the
    /// provider's.
    pub fn logout(
        &self,
        config: &AuthConfig,
        request: &mut dyn HttpRequest,
        in_logout: bool,
    ) -> Result<(), Error> {
        let log = RequestLog::for_request(request);

        let (cleaned, nested) = match config.provider() {
            Some(provider) if !in_logout => (self.clean_subject(provider.as_ref(), request), true),
            _ => (Ok(()), in_logout),
        };
        if let Err(e) = &cleaned {
            log.warn(format_args!("provider failed to clean subject: {e}"));
        }

        let legacy = self.authenticator.logout(request, nested);
        if let Err(e) = &legacy {
            log.error(format_args!("legacy logout failed: {e}"));
        }
        SecurityContext::clear();

        let outcome = if cleaned.is_ok() && legacy.is_ok() {
            AuditOutcome::Success
        } else {
            AuditOutcome::Error
        };
        self.audit.record(
            AuditEvent::new(AuditEventKind::Logout, outcome)
                .with_path(log.path())
                .with_principal(log.principal()),
        );

        legacy.and(cleaned)
    }

    fn clean_subject(
        &self,
        provider: &dyn AuthProvider,
        request: &mut dyn HttpRequest,
    ) -> Result<(), Error> {
        let mut info = request.take_message_info().unwrap_or_default();
        info.set_mandatory(true);

        let Some(context) = provider.auth_context(&info)? else {
            return Ok(());
        };

        let mut subject = match SecurityContext::current() {
            Some(current) if !current.did_server_generate_credentials() => current.subject().clone(),
            _ => Subject::new(),
        };
        if subject.is_read_only() {
            tracing::warn!("read-only subject found during logout");
        }

        bracket(
            self.events.as_ref(),
            ContainerEvent::BeforeLogout,
            ContainerEvent::AfterLogout,
            || context.clean_subject(&mut info, &mut subject),
        )?;
        Ok(())
    }

    fn record(&self, log: &RequestLog, outcome: AuditOutcome, detail: &str) {
        self.audit.record(
            AuditEvent::new(AuditEventKind::Authentication, outcome)
                .with_path(log.path())
                .with_principal(log.principal())
                .with_detail(detail),
        );
    }
}

impl std::fmt::Debug for AuthenticationDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationDelegate")
            .field("caches_sessions", &self.authenticator.caches_sessions())
            .finish()
    }
}
