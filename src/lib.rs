//! Authentication and authorization decisions for web applications.
//!
//! A [`RealmAdapter`] sits between an HTTP container and a pluggable
//! authentication provider. For every request it decides:
//! - whether the request needs a secure transport, redirecting if so
//! - whether authentication is needed at all
//! - who the caller is, via the provider or the container's own authenticator
//! - whether the caller may reach the resource
//! - which identity is active while a declared run-as component executes
//!
//! # Core Types
//!
//! - [`RealmAdapter`]: Façade the container drives through the request lifecycle
//! - [`AuthorizationGate`]: Transport and resource decisions backed by a [`PermissionOracle`]
//! - [`AuthenticationDelegate`]: Provider validate/secure/clean lifecycle
//! - [`NonceRegistry`]: Digest nonce replay protection
//! - [`RunAsSwitcher`]: Run-as identity substitution
//! - [`TransportRedirector`]: HTTPS redirect targets behind proxies and on direct listeners
//! - [`SecurityContext`]: The caller identity active on the current thread
//!
//! Collaborators the container supplies are traits: [`PermissionOracle`],
//! [`provider::AuthProvider`], [`LegacyAuthenticator`], [`RealmLogin`] and
//! [`SecurityConfigSource`]. Requests and responses are reached through
//! [`web::HttpRequest`] and [`web::HttpResponse`].
//!
//! # Examples
//!
//! ```
//! use realm_adapter::{NonceRegistry, Password};
//!
//! // Passwords never reach logs
//! let password = Password::new("hunter2");
//! assert_eq!(format!("{password:?}"), "[REDACTED]");
//!
//! // Digest nonce counts must advance
//! let nonces = NonceRegistry::in_memory("shop");
//! assert!(nonces.admit("abc123", 1).is_ok());
//! assert!(nonces.admit("abc123", 1).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
pub mod audit;
mod authenticator;
mod certificate;
mod config;
mod context;
mod delegate;
mod digest;
mod error;
mod gate;
mod logging;
mod nonce;
mod oracle;
mod principal;
pub mod provider;
mod redirect;
mod runas;
mod secret;
#[cfg(test)]
mod testing;
pub mod web;

pub use adapter::{RealmAdapter, RealmAdapterBuilder, UserDataOutcome};
pub use authenticator::{
    ContainerEvent, ContainerEvents, LegacyAuthenticator, NoopEvents, RealmLogin,
    SecurityConfigSource,
};
pub use certificate::{CertificateCredentials, CERTIFICATE_REALM};
pub use rustls_pki_types::CertificateDer;
pub use config::{
    AdapterConfig, AuthConfig, LoginConfig, DEFAULT_FORM_ACTION, DEFAULT_REALM,
    DEFAULT_SESSION_PARAMETER, FORM_METHOD,
};
pub use context::SecurityContext;
pub use delegate::AuthenticationDelegate;
pub use digest::{DigestCredentials, DigestParameter, DigestRequest};
pub use error::{Error, LoginError, OracleError, ProviderError};
pub use gate::{AuthorizationGate, PreAuthOptions, PreAuthOutcome, SecurityConstraints, UserDataDecision};
pub use nonce::{
    InMemoryNonceCacheFactory, InMemoryNonceStore, NonceCacheFactory, NonceEntry, NonceRegistry,
    NonceStore, SharedNonceCaches,
};
pub use oracle::{PermissionOracle, UserDataVerdict};
pub use principal::{Principal, Subject, WebPrincipal, ANONYMOUS};
pub use redirect::{
    parse_host_header, HostResolver, NetworkListener, RedirectTarget, SystemResolver,
    TransportRedirector,
};
pub use runas::{ComponentInvocation, RunAsDescriptor, RunAsSwitcher, ServletInfo};
pub use secret::Password;
