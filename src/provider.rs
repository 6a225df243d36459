//! Contract of the pluggable authentication provider.
//!
//! A provider validates inbound requests, secures responses and cleans
//! subjects on logout. Per-exchange state travels in a [`MessageInfo`]
//! that the adapter caches on the request between the authenticate and
//! post-authenticate phases.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ProviderError;
use crate::principal::Subject;
use crate::web::HttpRequest;

/// Property marking the exchange as mandatory.
pub const IS_MANDATORY: &str = "auth.message.mandatory";

/// Property a provider sets to name the auth type of the principal.
pub const AUTH_TYPE: &str = "auth.message.auth_type";

/// Boolean-valued property asking the container to register a session.
pub const REGISTER_SESSION: &str = "auth.message.register_session";

/// Presence-flag property asking the container to register with its authenticator.
pub const REGISTER_WITH_AUTHENTICATOR: &str = "auth.message.register_with_authenticator";

/// Auth type used when neither the provider nor the login config supplies one.
pub const PROXY_AUTH_TYPE: &str = "PLUGGABLE_PROVIDER";

/// Status returned by provider lifecycle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// The provider established or accepted the exchange.
    Success,
    /// The provider rejected the exchange.
    Failure,
    /// The provider sent a successful response itself.
    SendSuccess,
    /// The provider sent a failure response itself.
    SendFailure,
    /// The provider needs another round trip (e.g. a challenge).
    SendContinue,
}

/// Provider context negotiated for one exchange.
pub trait ServerAuthContext: Send + Sync {
    /// Validates the request, adding established principals to `subject`.
    fn validate_request(
        &self,
        request: &dyn HttpRequest,
        info: &mut MessageInfo,
        subject: &mut Subject,
    ) -> Result<AuthStatus, ProviderError>;

    /// Secures the response before it is sent.
    fn secure_response(
        &self,
        request: &dyn HttpRequest,
        info: &mut MessageInfo,
    ) -> Result<AuthStatus, ProviderError>;

    /// Removes provider-established principals and credentials from `subject`.
    fn clean_subject(&self, info: &mut MessageInfo, subject: &mut Subject)
        -> Result<(), ProviderError>;
}

/// A pluggable provider configured for an application.
pub trait AuthProvider: Send + Sync {
    /// Obtains the context for an exchange.
    ///
    /// `Ok(None)` means the provider has no context for this exchange.
    fn auth_context(
        &self,
        info: &MessageInfo,
    ) -> Result<Option<Arc<dyn ServerAuthContext>>, ProviderError>;

    /// Releases the provider when its application is shut down.
    fn disable(&self) {}
}

/// Transient state of one provider exchange.
///
/// # Examples
///
/// ```
/// use realm_adapter::provider::{MessageInfo, REGISTER_SESSION};
///
/// let mut info = MessageInfo::new();
/// info.set_mandatory(true);
/// info.set_property(REGISTER_SESSION, "true");
///
/// assert!(info.is_mandatory());
/// assert!(info.should_register());
/// ```
#[derive(Clone, Default)]
pub struct MessageInfo {
    properties: HashMap<String, String>,
    auth_context: Option<Arc<dyn ServerAuthContext>>,
}

impl MessageInfo {
    /// Creates an empty exchange.
    pub fn new() -> Self {
        Self::default()
    }

    /// Property value by key.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Sets a property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// True if the key is present, whatever its value.
    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Marks the exchange as mandatory or optional.
    pub fn set_mandatory(&mut self, mandatory: bool) {
        if mandatory {
            self.set_property(IS_MANDATORY, "true");
        } else {
            self.properties.remove(IS_MANDATORY);
        }
    }

    /// True if the exchange must produce a non-anonymous principal.
    pub fn is_mandatory(&self) -> bool {
        self.bool_property(IS_MANDATORY)
    }

    /// Auth type label set by the provider.
    pub fn auth_type(&self) -> Option<&str> {
        self.property(AUTH_TYPE)
    }

    /// True if the provider asked for registration with the container.
    ///
    /// Either the presence flag or a true-valued session property counts.
    pub fn should_register(&self) -> bool {
        self.contains(REGISTER_WITH_AUTHENTICATOR) || self.bool_property(REGISTER_SESSION)
    }

    /// Provider context cached after successful validation.
    pub fn auth_context(&self) -> Option<&Arc<dyn ServerAuthContext>> {
        self.auth_context.as_ref()
    }

    /// Caches the provider context for the post-authenticate phase.
    pub fn cache_auth_context(&mut self, context: Arc<dyn ServerAuthContext>) {
        self.auth_context = Some(context);
    }

    fn bool_property(&self, key: &str) -> bool {
        self.property(key)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }
}

impl fmt::Debug for MessageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageInfo")
            .field("properties", &self.properties)
            .field("has_auth_context", &self.auth_context.is_some())
            .finish()
    }
}
