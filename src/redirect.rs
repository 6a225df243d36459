//! HTTPS redirect target computation.
//!
//! A request counts as direct when some configured listener matches both
//! the host and the port of its `Host` header. Anything else arrived
//! through a front-end proxy and is redirected to the host and port the
//! client used.

use std::net::{IpAddr, ToSocketAddrs};

use http::StatusCode;
use serde::Deserialize;

use crate::error::Error;
use crate::logging::RequestLog;
use crate::web::{HttpRequest, HttpResponse};

/// Addresses that bind every local interface.
const WILDCARD_ADDRESSES: [&str; 2] = ["0.0.0.0", "::"];

/// A network listener requests may arrive on directly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkListener {
    /// Bound address; absent or wildcard means every local interface
    #[serde(default)]
    pub address: Option<String>,
    /// Bound port
    pub port: u16,
}

impl NetworkListener {
    /// Listener on every interface.
    pub fn any(port: u16) -> Self {
        Self {
            address: None,
            port,
        }
    }

    /// Listener on one address.
    pub fn bound(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: Some(address.into()),
            port,
        }
    }

    fn is_wildcard(&self) -> bool {
        match self.address.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(address) => WILDCARD_ADDRESSES.contains(&address),
        }
    }
}

/// Host name resolution used for listener matching.
pub trait HostResolver: Send + Sync {
    /// Canonical name of the local host.
    fn canonical_host_name(&self) -> Option<String>;

    /// Addresses of the local host.
    fn local_addresses(&self) -> Vec<IpAddr>;

    /// Addresses `host` resolves to; empty if it does not resolve.
    fn resolve(&self, host: &str) -> Vec<IpAddr>;
}

/// [`HostResolver`] backed by the operating system.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    hostname: Option<String>,
}

impl SystemResolver {
    /// Reads the local host name once.
    pub fn new() -> Self {
        let hostname = match whoami::fallible::hostname() {
            Ok(name) => Some(name),
            Err(e) => {
                tracing::warn!(error = %e, "local host name unavailable");
                None
            }
        };
        Self { hostname }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HostResolver for SystemResolver {
    fn canonical_host_name(&self) -> Option<String> {
        self.hostname.clone()
    }

    fn local_addresses(&self) -> Vec<IpAddr> {
        let mut addresses = self
            .hostname
            .as_deref()
            .map(|name| self.resolve(name))
            .unwrap_or_default();
        addresses.extend(self.resolve("localhost"));
        addresses.sort();
        addresses.dedup();
        addresses
    }

    fn resolve(&self, host: &str) -> Vec<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return vec![ip];
        }
        match (host, 0).to_socket_addrs() {
            Ok(addrs) => addrs.map(|addr| addr.ip()).collect(),
            Err(e) => {
                tracing::debug!(host, error = %e, "host does not resolve");
                Vec::new()
            }
        }
    }
}

/// Where an HTTPS redirect should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Redirects are disabled; the caller answers 403.
    Disabled,
    /// Redirect to `host`, on `port` or the scheme default.
    Target {
        /// Host to redirect to
        host: String,
        /// Explicit port, if any
        port: Option<u16>,
    },
}

/// Splits a `Host` header value into host and optional port.
///
/// Bracketed IPv6 literals are unwrapped.
///
/// # Errors
///
/// Returns [`Error::InvalidHostHeader`] for empty hosts and unparsable ports.
pub fn parse_host_header(value: &str) -> Result<(String, Option<u16>), Error> {
    let value = value.trim();
    let invalid = || Error::InvalidHostHeader(value.to_string());

    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
        match after {
            "" => (host, None),
            _ => (host, Some(after.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match value.split_once(':') {
            Some((host, port)) if !port.contains(':') => (host, Some(port)),
            _ => (value, None),
        }
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = match port.map(str::trim) {
        None | Some("") => None,
        Some(port) => Some(port.parse::<u16>().map_err(|_| invalid())?),
    };
    Ok((host.to_string(), port))
}

/// Computes and sends HTTPS redirects.
pub struct TransportRedirector {
    redirect_port: i32,
    listeners: Vec<NetworkListener>,
    session_parameter: String,
    resolver: Box<dyn HostResolver>,
}

impl TransportRedirector {
    /// Creates a redirector. A non-positive `redirect_port` disables redirects.
    pub fn new(
        redirect_port: i32,
        listeners: Vec<NetworkListener>,
        session_parameter: impl Into<String>,
        resolver: Box<dyn HostResolver>,
    ) -> Self {
        Self {
            redirect_port,
            listeners,
            session_parameter: session_parameter.into(),
            resolver,
        }
    }

    /// Decides the host and port an HTTPS redirect for `request` targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHostHeader`] or [`Error::InvalidHostHeader`]
    /// when the `Host` header is unusable, and [`Error::Configuration`] if
    /// the redirect port does not fit a TCP port.
    pub fn compute_redirect_target(&self, request: &dyn HttpRequest) -> Result<RedirectTarget, Error> {
        if self.redirect_port <= 0 {
            return Ok(RedirectTarget::Disabled);
        }

        let header = request.header("Host").ok_or(Error::MissingHostHeader)?;
        let (host, port) = parse_host_header(header)?;

        let direct = port.is_some_and(|port| {
            self.listeners
                .iter()
                .any(|listener| listener.port == port && self.matches_host(listener, &host))
        });

        if direct {
            let port = u16::try_from(self.redirect_port).map_err(|_| {
                Error::Configuration(format!("redirect port {} out of range", self.redirect_port))
            })?;
            Ok(RedirectTarget::Target {
                host: request.server_name().to_string(),
                port: Some(port),
            })
        } else {
            tracing::debug!(%host, ?port, "request arrived through a front end");
            Ok(RedirectTarget::Target { host, port })
        }
    }

    /// Builds the `https` URL for `request` on `host` and `port`.
    ///
    /// Keeps the request URI, a URL-carried session id and the query string.
    pub fn redirect_url(&self, request: &dyn HttpRequest, host: &str, port: Option<u16>) -> String {
        let mut url = String::from("https://");
        if host.contains(':') {
            url.push('[');
            url.push_str(host);
            url.push(']');
        } else {
            url.push_str(host);
        }
        if let Some(port) = port {
            url.push(':');
            url.push_str(&port.to_string());
        }
        url.push_str(request.request_uri());
        if let Some(id) = request.requested_session_id() {
            if request.is_requested_session_id_from_url() {
                url.push(';');
                url.push_str(&self.session_parameter);
                url.push('=');
                url.push_str(id);
            }
        }
        if let Some(query) = request.query_string() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Sends the HTTPS redirect for `request`.
    ///
    /// Returns the location sent, or `None` when redirects are disabled and
    /// a 403 carrying the encoded request URI was sent instead.
    ///
    /// # Errors
    ///
    /// Fails after sending a 400 when the `Host` header is unusable.
    pub fn redirect(
        &self,
        request: &dyn HttpRequest,
        response: &mut dyn HttpResponse,
    ) -> Result<Option<String>, Error> {
        let log = RequestLog::for_request(request);
        match self.compute_redirect_target(request) {
            Ok(RedirectTarget::Disabled) => {
                log.debug(format_args!("SSL redirect is disabled"));
                let encoded = urlencoding::encode(request.request_uri()).into_owned();
                response.send_error(StatusCode::FORBIDDEN, Some(encoded));
                Ok(None)
            }
            Ok(RedirectTarget::Target { host, port }) => {
                let location = self.redirect_url(request, &host, port);
                log.debug(format_args!("redirecting to {location}"));
                response.send_redirect(&location);
                Ok(Some(location))
            }
            Err(e) => {
                log.warn(format_args!("cannot redirect: {e}"));
                response.send_error(e.status(), None);
                Err(e)
            }
        }
    }

    fn matches_host(&self, listener: &NetworkListener, host: &str) -> bool {
        if listener.is_wildcard() {
            let canonical = self.resolver.canonical_host_name();
            if canonical.is_some_and(|name| name.eq_ignore_ascii_case(host)) {
                return true;
            }
            let local = self.resolver.local_addresses();
            return self.resolver.resolve(host).iter().any(|ip| local.contains(ip));
        }

        let address = listener.address.as_deref().map(str::trim).unwrap_or_default();
        if address.eq_ignore_ascii_case(host) {
            return true;
        }
        let bound = self.resolver.resolve(address);
        self.resolver.resolve(host).iter().any(|ip| bound.contains(ip))
    }
}

impl std::fmt::Debug for TransportRedirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRedirector")
            .field("redirect_port", &self.redirect_port)
            .field("listeners", &self.listeners)
            .finish()
    }
}
