//! Adapter configuration.
//!
//! [`AdapterConfig`] is injected when the adapter is built and never read
//! from process globals. [`LoginConfig`] is what the container declares for
//! the application; [`AuthConfig`] is the immutable snapshot the adapter
//! resolves from it on first use.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::provider::AuthProvider;
use crate::redirect::NetworkListener;
use crate::runas::RunAsDescriptor;

/// Realm used when neither the configuration nor the login config names one.
pub const DEFAULT_REALM: &str = "default";

/// Request path suffix of form-login credential submissions.
pub const DEFAULT_FORM_ACTION: &str = "/j_security_check";

/// Path parameter carrying a URL-encoded session identifier.
pub const DEFAULT_SESSION_PARAMETER: &str = "jsessionid";

/// Auth method label for form login.
pub const FORM_METHOD: &str = "FORM";

/// Static configuration of one adapter instance.
///
/// # Examples
///
/// ```
/// use realm_adapter::AdapterConfig;
///
/// let config = AdapterConfig {
///     app_name: "shop".to_string(),
///     virtual_server: "server".to_string(),
///     context_root: "/shop".to_string(),
///     redirect_port: 8443,
///     ..AdapterConfig::default()
/// };
/// assert_eq!(config.app_context_id(), "server /shop");
/// assert!(config.default_provider_id().is_none());
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Application name; keys the per-application nonce cache
    pub app_name: String,
    /// Virtual server the application is deployed on
    pub virtual_server: String,
    /// Context root of the web module
    pub context_root: String,
    /// Realm the application authenticates against
    pub realm_name: Option<String>,
    /// Whether this is a server-internal application
    pub is_system_app: bool,
    /// Provider used for system applications when none is configured
    pub default_provider_id: Option<String>,
    /// Port HTTPS redirects target; zero or negative disables redirects
    pub redirect_port: i32,
    /// Network listeners requests may arrive on, in configuration order
    pub listeners: Vec<NetworkListener>,
    /// Declared run-as identities
    pub run_as: Vec<RunAsDescriptor>,
    /// Path suffix identifying form-login submissions
    pub form_action: String,
    /// Path parameter name for URL-encoded session identifiers
    pub session_parameter: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            virtual_server: String::new(),
            context_root: String::new(),
            realm_name: None,
            is_system_app: false,
            default_provider_id: None,
            redirect_port: -1,
            listeners: Vec::new(),
            run_as: Vec::new(),
            form_action: DEFAULT_FORM_ACTION.to_string(),
            session_parameter: DEFAULT_SESSION_PARAMETER.to_string(),
        }
    }
}

impl AdapterConfig {
    /// Identifier the provider configuration is registered under.
    pub fn app_context_id(&self) -> String {
        format!("{} {}", self.virtual_server, self.context_root)
    }

    /// The configured default provider id, with blank values treated as absent.
    pub fn default_provider_id(&self) -> Option<&str> {
        self.default_provider_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// The realm name, falling back to [`DEFAULT_REALM`].
    pub fn realm_name(&self) -> &str {
        self.realm_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_REALM)
    }
}

/// Login configuration declared by the container for the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Declared auth method (BASIC, FORM, DIGEST, CLIENT-CERT, ...)
    pub auth_method: Option<String>,
    /// Realm named by the login config
    pub realm_name: Option<String>,
    /// Form login page, context relative
    pub login_page: Option<String>,
    /// Form error page, context relative
    pub error_page: Option<String>,
}

impl LoginConfig {
    /// Returns true if the declared method is form login.
    pub fn is_form(&self) -> bool {
        self.auth_method.as_deref() == Some(FORM_METHOD)
    }
}

/// Resolved per-application security configuration.
///
/// Built once per adapter and immutable afterwards.
#[derive(Clone, Default)]
pub struct AuthConfig {
    login_config: Option<LoginConfig>,
    login_page: Option<String>,
    error_page: Option<String>,
    provider: Option<Arc<dyn AuthProvider>>,
}

impl AuthConfig {
    /// Builds the snapshot from the declared login config and provider.
    ///
    /// Login and error pages are only retained for form login.
    pub fn new(login_config: Option<LoginConfig>, provider: Option<Arc<dyn AuthProvider>>) -> Self {
        let (login_page, error_page) = match &login_config {
            Some(config) if config.is_form() => {
                (config.login_page.clone(), config.error_page.clone())
            }
            _ => (None, None),
        };
        Self {
            login_config,
            login_page,
            error_page,
            provider,
        }
    }

    /// Returns the declared login config.
    pub fn login_config(&self) -> Option<&LoginConfig> {
        self.login_config.as_ref()
    }

    /// Form login page, if form login is configured.
    pub fn login_page(&self) -> Option<&str> {
        self.login_page.as_deref()
    }

    /// Form error page, if form login is configured.
    pub fn error_page(&self) -> Option<&str> {
        self.error_page.as_deref()
    }

    /// Declared auth method.
    pub fn auth_method(&self) -> Option<&str> {
        self.login_config
            .as_ref()
            .and_then(|config| config.auth_method.as_deref())
    }

    /// The pluggable provider, if one is configured.
    pub fn provider(&self) -> Option<&Arc<dyn AuthProvider>> {
        self.provider.as_ref()
    }

    /// Returns true if a pluggable provider handles authentication.
    pub fn provider_configured(&self) -> bool {
        self.provider.is_some()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("login_config", &self.login_config)
            .field("login_page", &self.login_page)
            .field("error_page", &self.error_page)
            .field("provider_configured", &self.provider_configured())
            .finish()
    }
}
