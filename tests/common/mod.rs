//! Shared collaborator stubs for integration tests.

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use http::Method;
use parking_lot::Mutex;

use realm_adapter::provider::{AuthProvider, AuthStatus, MessageInfo, ServerAuthContext};
use realm_adapter::web::{HttpRequest, HttpResponse};
use realm_adapter::{
    AdapterConfig, CertificateCredentials, ContainerEvent, ContainerEvents, DigestCredentials,
    Error, HostResolver,
    LegacyAuthenticator, LoginConfig, LoginError, OracleError, PermissionOracle, Principal,
    ProviderError, RealmAdapter, RealmLogin, SecurityConfigSource, Subject, UserDataVerdict,
    WebPrincipal, FORM_METHOD,
};
use realm_adapter::Password;

/// Oracle answering fixed verdicts and counting calls.
pub struct CountingOracle {
    pub resource: bool,
    pub user_data: Result<UserDataVerdict, OracleError>,
    pub permit_all: bool,
    pub resource_calls: AtomicUsize,
    pub user_data_calls: AtomicUsize,
}

impl CountingOracle {
    pub fn new(resource: bool, user_data: UserDataVerdict) -> Self {
        Self {
            resource,
            user_data: Ok(user_data),
            permit_all: false,
            resource_calls: AtomicUsize::new(0),
            user_data_calls: AtomicUsize::new(0),
        }
    }

    pub fn deny_all() -> Self {
        Self::new(false, UserDataVerdict::Denied)
    }

    pub fn grant_all() -> Self {
        Self::new(true, UserDataVerdict::Granted)
    }

    pub fn resource_calls(&self) -> usize {
        self.resource_calls.load(Ordering::SeqCst)
    }

    pub fn user_data_calls(&self) -> usize {
        self.user_data_calls.load(Ordering::SeqCst)
    }
}

impl PermissionOracle for CountingOracle {
    fn has_resource_permission(&self, _request: &dyn HttpRequest) -> Result<bool, OracleError> {
        self.resource_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.resource)
    }

    fn has_user_data_permission(
        &self,
        _request: &dyn HttpRequest,
        _uri: Option<&str>,
        _method: Option<&Method>,
    ) -> Result<UserDataVerdict, OracleError> {
        self.user_data_calls.fetch_add(1, Ordering::SeqCst);
        self.user_data.clone()
    }

    fn permit_all(&self, _request: &dyn HttpRequest) -> Result<bool, OracleError> {
        Ok(self.permit_all)
    }

    fn has_role_ref_permission(&self, _component: &str, _role: &str, _principal: Option<&Principal>) -> bool {
        false
    }

    fn has_no_constrained_resources(&self) -> bool {
        false
    }
}

/// Config source counting how often the provider is looked up.
#[derive(Default)]
pub struct CountingSource {
    pub login: Option<LoginConfig>,
    pub provider: Option<Arc<dyn AuthProvider>>,
    pub lookups: AtomicUsize,
}

impl CountingSource {
    pub fn form(login_page: &str, error_page: &str) -> Self {
        Self {
            login: Some(LoginConfig {
                auth_method: Some(FORM_METHOD.to_string()),
                realm_name: None,
                login_page: Some(login_page.to_string()),
                error_page: Some(error_page.to_string()),
            }),
            ..Self::default()
        }
    }

    pub fn with_provider(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider: Some(provider),
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl SecurityConfigSource for CountingSource {
    fn login_config(&self) -> Option<LoginConfig> {
        self.login.clone()
    }

    fn auth_provider(
        &self,
        _app_context_id: &str,
        _is_system_app: bool,
        _default_provider_id: Option<&str>,
    ) -> Result<Option<Arc<dyn AuthProvider>>, Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        std::thread::yield_now();
        Ok(self.provider.clone())
    }
}

/// Provider context establishing a fixed principal set.
pub struct FixedContext {
    pub principals: Vec<Principal>,
    pub cleaned: AtomicUsize,
}

impl FixedContext {
    pub fn cleaned(&self) -> usize {
        self.cleaned.load(Ordering::SeqCst)
    }
}

impl ServerAuthContext for FixedContext {
    fn validate_request(
        &self,
        _request: &dyn HttpRequest,
        _info: &mut MessageInfo,
        subject: &mut Subject,
    ) -> Result<AuthStatus, ProviderError> {
        for principal in &self.principals {
            subject.add_principal(principal.clone());
        }
        Ok(AuthStatus::Success)
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
        Ok(())
    }
}

/// Provider whose context establishes a fixed principal set.
pub struct FixedProvider {
    pub context: Arc<FixedContext>,
    pub disabled: AtomicUsize,
}

impl FixedProvider {
    pub fn establishing(principals: impl IntoIterator<Item = Principal>) -> Self {
        Self {
            context: Arc::new(FixedContext {
                principals: principals.into_iter().collect(),
                cleaned: AtomicUsize::new(0),
            }),
            disabled: AtomicUsize::new(0),
        }
    }

    pub fn disabled(&self) -> usize {
        self.disabled.load(Ordering::SeqCst)
    }
}

impl AuthProvider for FixedProvider {
    fn auth_context(
        &self,
        _info: &MessageInfo,
    ) -> Result<Option<Arc<dyn ServerAuthContext>>, ProviderError> {
        Ok(Some(self.context.clone()))
    }

    fn disable(&self) {
        self.disabled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Legacy authenticator answering a fixed verdict.
pub struct FixedAuthenticator {
    pub verdict: bool,
    pub logouts: AtomicUsize,
}

impl FixedAuthenticator {
    pub fn answering(verdict: bool) -> Self {
        Self {
            verdict,
            logouts: AtomicUsize::new(0),
        }
    }
}

impl LegacyAuthenticator for FixedAuthenticator {
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
        request: &mut dyn HttpRequest,
        _response: &mut dyn HttpResponse,
        principal: WebPrincipal,
        auth_type: &str,
        _username: &str,
        _password: Option<&Password>,
    ) -> Result<(), Error> {
        request.set_auth_type(Some(auth_type.to_string()));
        request.set_user_principal(Some(principal));
        Ok(())
    }

    fn logout(&self, request: &mut dyn HttpRequest, _in_logout: bool) -> Result<(), Error> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        request.set_user_principal(None);
        Ok(())
    }
}

/// Legacy authenticator whose logout calls back into the adapter once,
/// the way session invalidation listeners do.
#[derive(Default)]
pub struct ReentrantAuthenticator {
    pub adapter: OnceLock<Weak<RealmAdapter>>,
    pub flags: Mutex<Vec<bool>>,
}

impl ReentrantAuthenticator {
    pub fn flags(&self) -> Vec<bool> {
        self.flags.lock().clone()
    }
}

impl LegacyAuthenticator for ReentrantAuthenticator {
    fn authenticate(
        &self,
        _request: &mut dyn HttpRequest,
        _response: &mut dyn HttpResponse,
        _login_config: Option<&LoginConfig>,
    ) -> Result<bool, Error> {
        Ok(false)
    }

    fn register(
        &self,
        _request: &mut dyn HttpRequest,
        _response: &mut dyn HttpResponse,
        _principal: WebPrincipal,
        _auth_type: &str,
        _username: &str,
        _password: Option<&Password>,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn logout(&self, request: &mut dyn HttpRequest, in_logout: bool) -> Result<(), Error> {
        let first = {
            let mut flags = self.flags.lock();
            flags.push(in_logout);
            flags.len() == 1
        };
        if first {
            if let Some(adapter) = self.adapter.get().and_then(Weak::upgrade) {
                adapter.logout(request, in_logout)?;
            }
        }
        Ok(())
    }
}

/// Realm accepting `secret` as every user's password.
pub struct SecretRealm;

impl RealmLogin for SecretRealm {
    fn login(&self, username: &str, password: &Password, realm: &str) -> Result<Subject, LoginError> {
        if password.expose() == "secret" {
            Ok(Subject::with_principals([Principal::new(username)]))
        } else {
            Err(LoginError::new(username, realm, "bad password"))
        }
    }

    fn login_principal(&self, principal: &str, _realm: &str) -> Result<Subject, LoginError> {
        Ok(Subject::with_principals([Principal::new(principal)]))
    }

    fn login_digest(&self, credentials: &DigestCredentials) -> Result<Subject, LoginError> {
        Ok(Subject::with_principals([Principal::new(credentials.username.as_str())]))
    }

    fn login_certificate(
        &self,
        credentials: &CertificateCredentials,
        realm: &str,
    ) -> Result<Subject, LoginError> {
        match credentials.common_name() {
            Some(name) => Ok(Subject::with_principals([Principal::new(name)])),
            None => Err(LoginError::new(credentials.subject(), realm, "no common name")),
        }
    }
}

/// Resolver with no network access.
pub struct OfflineResolver;

impl HostResolver for OfflineResolver {
    fn canonical_host_name(&self) -> Option<String> {
        Some("node1.internal".to_string())
    }

    fn local_addresses(&self) -> Vec<IpAddr> {
        Vec::new()
    }

    fn resolve(&self, host: &str) -> Vec<IpAddr> {
        host.parse().map(|ip| vec![ip]).unwrap_or_default()
    }
}

/// Event sink recording what fired.
#[derive(Default)]
pub struct EventLog(pub Mutex<Vec<ContainerEvent>>);

impl ContainerEvents for EventLog {
    fn fire(&self, event: ContainerEvent) {
        self.0.lock().push(event);
    }
}

/// Builds an adapter from the given collaborators.
pub fn adapter(
    config: AdapterConfig,
    source: Arc<CountingSource>,
    oracle: Arc<CountingOracle>,
    authenticator: Arc<FixedAuthenticator>,
) -> RealmAdapter {
    RealmAdapter::builder(config)
        .security_config_source(source)
        .oracle(oracle)
        .authenticator(authenticator)
        .realm_login(Arc::new(SecretRealm))
        .host_resolver(Box::new(OfflineResolver))
        .build()
        .expect("adapter builds")
}

/// Installs a test subscriber once; repeated calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
