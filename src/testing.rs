//! Stub collaborators for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::Method;
use parking_lot::Mutex;

use crate::authenticator::{
    ContainerEvent, ContainerEvents, LegacyAuthenticator, RealmLogin, SecurityConfigSource,
};
use crate::certificate::CertificateCredentials;
use crate::config::LoginConfig;
use crate::digest::DigestCredentials;
use crate::error::{Error, LoginError, OracleError, ProviderError};
use crate::oracle::{PermissionOracle, UserDataVerdict};
use crate::principal::{Principal, Subject, WebPrincipal};
use crate::provider::{AuthProvider, AuthStatus, MessageInfo, ServerAuthContext};
use crate::secret::Password;
use crate::web::{HttpRequest, HttpResponse};

#[derive(Debug, Default)]
pub(crate) struct OracleCalls {
    resource: AtomicUsize,
    user_data: AtomicUsize,
}

impl OracleCalls {
    pub(crate) fn resource(&self) -> usize {
        self.resource.load(Ordering::SeqCst)
    }

    pub(crate) fn user_data(&self) -> usize {
        self.user_data.load(Ordering::SeqCst)
    }
}

pub(crate) struct StubOracle {
    resource: Result<bool, OracleError>,
    user_data: Result<UserDataVerdict, OracleError>,
    permit_all: Result<bool, OracleError>,
    unconstrained: bool,
    roles: Vec<(String, String)>,
    pub(crate) calls: Arc<OracleCalls>,
}

impl StubOracle {
    pub(crate) fn granting() -> Self {
        Self {
            resource: Ok(true),
            user_data: Ok(UserDataVerdict::Granted),
            permit_all: Ok(false),
            unconstrained: false,
            roles: Vec::new(),
            calls: Arc::default(),
        }
    }

    pub(crate) fn denying() -> Self {
        Self {
            resource: Ok(false),
            user_data: Ok(UserDataVerdict::Denied),
            ..Self::granting()
        }
    }

    pub(crate) fn with_resource(mut self, result: Result<bool, OracleError>) -> Self {
        self.resource = result;
        self
    }

    pub(crate) fn with_user_data(mut self, result: Result<UserDataVerdict, OracleError>) -> Self {
        self.user_data = result;
        self
    }

    pub(crate) fn with_role(mut self, principal: &str, role: &str) -> Self {
        self.roles.push((principal.to_string(), role.to_string()));
        self
    }

    pub(crate) fn permitting_all(mut self) -> Self {
        self.permit_all = Ok(true);
        self
    }

    pub(crate) fn with_permit_all(mut self, result: Result<bool, OracleError>) -> Self {
        self.permit_all = result;
        self
    }

    pub(crate) fn unconstrained(mut self) -> Self {
        self.unconstrained = true;
        self
    }
}

impl PermissionOracle for StubOracle {
    fn has_resource_permission(&self, _request: &dyn HttpRequest) -> Result<bool, OracleError> {
        self.calls.resource.fetch_add(1, Ordering::SeqCst);
        self.resource.clone()
    }

    fn has_user_data_permission(
        &self,
        _request: &dyn HttpRequest,
        _uri: Option<&str>,
        _method: Option<&Method>,
    ) -> Result<UserDataVerdict, OracleError> {
        self.calls.user_data.fetch_add(1, Ordering::SeqCst);
        self.user_data.clone()
    }

    fn permit_all(&self, _request: &dyn HttpRequest) -> Result<bool, OracleError> {
        self.permit_all.clone()
    }

    fn has_role_ref_permission(
        &self,
        _component: &str,
        role: &str,
        principal: Option<&Principal>,
    ) -> bool {
        principal.is_some_and(|p| {
            self.roles
                .iter()
                .any(|(name, granted)| name == p.name() && granted == role)
        })
    }

    fn has_no_constrained_resources(&self) -> bool {
        self.unconstrained
    }
}

#[derive(Default)]
pub(crate) struct StubSource {
    login: Option<LoginConfig>,
    provider: Option<Arc<dyn AuthProvider>>,
    failure: Option<fn() -> Error>,
}

impl StubSource {
    pub(crate) fn with_login_config(login: LoginConfig) -> Self {
        Self {
            login: Some(login),
            ..Self::default()
        }
    }

    pub(crate) fn failing(failure: fn() -> Error) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    pub(crate) fn providing(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider: Some(provider),
            ..Self::default()
        }
    }

    pub(crate) fn with_provider(mut self) -> Self {
        self.provider = Some(Arc::new(ScriptedProvider::succeeding([Principal::new(
            "alice",
        )])));
        self
    }
}

impl SecurityConfigSource for StubSource {
    fn login_config(&self) -> Option<LoginConfig> {
        self.login.clone()
    }

    fn auth_provider(
        &self,
        _app_context_id: &str,
        _is_system_app: bool,
        _default_provider_id: Option<&str>,
    ) -> Result<Option<Arc<dyn AuthProvider>>, Error> {
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(self.provider.clone()),
        }
    }
}

pub(crate) struct StubLogin {
    accept: bool,
}

impl StubLogin {
    pub(crate) fn accepting() -> Self {
        Self { accept: true }
    }

    pub(crate) fn rejecting() -> Self {
        Self { accept: false }
    }

    fn subject_for(&self, username: &str, realm: &str) -> Result<Subject, LoginError> {
        if self.accept {
            Ok(Subject::with_principals([Principal::new(username)]))
        } else {
            Err(LoginError::new(username, realm, "unknown user"))
        }
    }
}

impl RealmLogin for StubLogin {
    fn login(&self, username: &str, _password: &Password, realm: &str) -> Result<Subject, LoginError> {
        self.subject_for(username, realm)
    }

    fn login_principal(&self, principal: &str, realm: &str) -> Result<Subject, LoginError> {
        self.subject_for(principal, realm)
    }

    fn login_digest(&self, credentials: &DigestCredentials) -> Result<Subject, LoginError> {
        self.subject_for(&credentials.username, &credentials.realm)
    }

    fn login_certificate(
        &self,
        credentials: &CertificateCredentials,
        realm: &str,
    ) -> Result<Subject, LoginError> {
        let name = credentials.common_name().unwrap_or(credentials.subject());
        self.subject_for(name, realm)
    }
}

#[derive(Clone)]
struct Script {
    outcome: Result<AuthStatus, ProviderError>,
    principals: Vec<Principal>,
    properties: Vec<(String, String)>,
    clean_error: Option<ProviderError>,
    cleaned: Arc<AtomicUsize>,
}

impl ServerAuthContext for Script {
    fn validate_request(
        &self,
        _request: &dyn HttpRequest,
        info: &mut MessageInfo,
        subject: &mut Subject,
    ) -> Result<AuthStatus, ProviderError> {
        let status = self.outcome.clone()?;
        for principal in &self.principals {
            subject.add_principal(principal.clone());
        }
        for (key, value) in &self.properties {
            info.set_property(key.as_str(), value.as_str());
        }
        Ok(status)
    }

    fn secure_response(
        &self,
        _request: &dyn HttpRequest,
        _info: &mut MessageInfo,
    ) -> Result<AuthStatus, ProviderError> {
        Ok(AuthStatus::Success)
    }

    fn clean_subject(&self, _info: &mut MessageInfo, subject: &mut Subject) -> Result<(), ProviderError> {
        self.cleaned.fetch_add(1, Ordering::SeqCst);
        subject.clear();
        self.clean_error.clone().map_or(Ok(()), Err)
    }
}

pub(crate) struct ScriptedProvider {
    script: Script,
    pub(crate) cleaned: Arc<AtomicUsize>,
    pub(crate) disabled: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn succeeding(principals: impl IntoIterator<Item = Principal>) -> Self {
        let cleaned = Arc::new(AtomicUsize::new(0));
        Self {
            script: Script {
                outcome: Ok(AuthStatus::Success),
                principals: principals.into_iter().collect(),
                properties: Vec::new(),
                clean_error: None,
                cleaned: Arc::clone(&cleaned),
            },
            cleaned,
            disabled: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(error: ProviderError) -> Self {
        let mut provider = Self::succeeding([]);
        provider.script.outcome = Err(error);
        provider
    }

    pub(crate) fn with_property(mut self, key: &str, value: &str) -> Self {
        self.script
            .properties
            .push((key.to_string(), value.to_string()));
        self
    }

    pub(crate) fn failing_clean(mut self, error: ProviderError) -> Self {
        self.script.clean_error = Some(error);
        self
    }
}

impl AuthProvider for ScriptedProvider {
    fn auth_context(
        &self,
        _info: &MessageInfo,
    ) -> Result<Option<Arc<dyn ServerAuthContext>>, ProviderError> {
        Ok(Some(Arc::new(self.script.clone())))
    }

    fn disable(&self) {
        self.disabled.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct RecordingAuthenticator {
    verdict: bool,
    caches: bool,
    registrations: Mutex<Vec<(String, String)>>,
    logouts: Mutex<Vec<bool>>,
}

impl RecordingAuthenticator {
    pub(crate) fn answering(verdict: bool) -> Self {
        Self {
            verdict,
            caches: false,
            registrations: Mutex::new(Vec::new()),
            logouts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn caching_sessions(mut self) -> Self {
        self.caches = true;
        self
    }

    pub(crate) fn registrations(&self) -> Vec<(String, String)> {
        self.registrations.lock().clone()
    }

    pub(crate) fn logouts(&self) -> usize {
        self.logouts.lock().len()
    }

    /// The `in_logout` flag of every legacy logout, in call order.
    pub(crate) fn logout_flags(&self) -> Vec<bool> {
        self.logouts.lock().clone()
    }
}

impl LegacyAuthenticator for RecordingAuthenticator {
    fn authenticate(
        &self,
        _request: &mut dyn HttpRequest,
        _response: &mut dyn HttpResponse,
        _login_config: Option<&LoginConfig>,
    ) -> Result<bool, Error> {
        Ok(self.verdict)
    }

    fn register(
        &self,
        _request: &mut dyn HttpRequest,
        _response: &mut dyn HttpResponse,
        _principal: WebPrincipal,
        auth_type: &str,
        username: &str,
        _password: Option<&Password>,
    ) -> Result<(), Error> {
        self.registrations
            .lock()
            .push((username.to_string(), auth_type.to_string()));
        Ok(())
    }

    fn logout(&self, _request: &mut dyn HttpRequest, in_logout: bool) -> Result<(), Error> {
        self.logouts.lock().push(in_logout);
        Ok(())
    }

    fn caches_sessions(&self) -> bool {
        self.caches
    }
}

#[derive(Default)]
pub(crate) struct RecordingEvents(Mutex<Vec<ContainerEvent>>);

impl RecordingEvents {
    pub(crate) fn fired(&self) -> Vec<ContainerEvent> {
        self.0.lock().clone()
    }
}

impl ContainerEvents for RecordingEvents {
    fn fire(&self, event: ContainerEvent) {
        self.0.lock().push(event);
    }
}
