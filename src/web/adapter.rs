//! Owned request type implementing [`HttpRequest`].

use http::Method;

use crate::principal::WebPrincipal;
use crate::provider::MessageInfo;

use super::HttpRequest;

/// A framework-agnostic HTTP request.
///
/// `RequestAdapter` holds simple owned data so containers without their own
/// request type, and tests, can drive the realm adapter directly.
/// Containers with richer request objects implement [`HttpRequest`] on them
/// instead.
///
/// # Examples
///
/// ```
/// use realm_adapter::web::{HttpRequest, RequestAdapter};
/// use http::Method;
///
/// let request = RequestAdapter::new(Method::GET, "/app/orders")
///     .with_context_path("/app")
///     .with_header("Host", "shop.example.com:8080")
///     .with_query("page=2");
///
/// assert_eq!(request.header("host"), Some("shop.example.com:8080"));
/// assert_eq!(request.request_path(), "/orders");
/// assert!(!request.is_secure());
/// ```
#[derive(Debug, Clone)]
pub struct RequestAdapter {
    method: Method,
    request_uri: String,
    context_path: String,
    servlet_path: Option<String>,
    secure: bool,
    server_name: String,
    headers: Vec<(String, String)>,
    query: Option<String>,
    requested_session_id: Option<String>,
    session_id_from_url: bool,
    session_created: bool,
    servlet_name: Option<String>,
    user_principal: Option<WebPrincipal>,
    auth_type: Option<String>,
    message_info: Option<MessageInfo>,
}

impl RequestAdapter {
    /// Creates a plain-HTTP request for `uri` on `localhost`.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            request_uri: uri.into(),
            context_path: String::new(),
            servlet_path: None,
            secure: false,
            server_name: "localhost".to_string(),
            headers: Vec::new(),
            query: None,
            requested_session_id: None,
            session_id_from_url: false,
            session_created: false,
            servlet_name: None,
            user_principal: None,
            auth_type: None,
            message_info: None,
        }
    }

    /// Sets the application context path.
    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = path.into();
        self
    }

    /// Marks the request as arriving over a secure transport.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the server name of the connection.
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the raw query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets the session id the client presented and where it came from.
    pub fn with_requested_session(mut self, id: impl Into<String>, from_url: bool) -> Self {
        self.requested_session_id = Some(id.into());
        self.session_id_from_url = from_url;
        self
    }

    /// Sets the servlet the request is mapped to.
    pub fn with_servlet_name(mut self, name: impl Into<String>) -> Self {
        self.servlet_name = Some(name.into());
        self
    }

    /// Sets an already established principal.
    pub fn with_principal(mut self, principal: WebPrincipal) -> Self {
        self.user_principal = Some(principal);
        self
    }

    /// Returns true if [`HttpRequest::create_session`] was called.
    pub fn session_created(&self) -> bool {
        self.session_created
    }
}

impl HttpRequest for RequestAdapter {
    fn request_uri(&self) -> &str {
        &self.request_uri
    }

    fn context_path(&self) -> &str {
        &self.context_path
    }

    fn servlet_path(&self) -> Option<&str> {
        self.servlet_path.as_deref()
    }

    fn set_servlet_path(&mut self, path: String) {
        self.servlet_path = Some(path);
    }

    fn method(&self) -> &Method {
        &self.method
    }

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn requested_session_id(&self) -> Option<&str> {
        self.requested_session_id.as_deref()
    }

    fn is_requested_session_id_from_url(&self) -> bool {
        self.session_id_from_url
    }

    fn create_session(&mut self) {
        self.session_created = true;
    }

    fn servlet_name(&self) -> Option<&str> {
        self.servlet_name.as_deref()
    }

    fn user_principal(&self) -> Option<&WebPrincipal> {
        self.user_principal.as_ref()
    }

    fn set_user_principal(&mut self, principal: Option<WebPrincipal>) {
        self.user_principal = principal;
    }

    fn auth_type(&self) -> Option<&str> {
        self.auth_type.as_deref()
    }

    fn set_auth_type(&mut self, auth_type: Option<String>) {
        self.auth_type = auth_type;
    }

    fn message_info(&self) -> Option<&MessageInfo> {
        self.message_info.as_ref()
    }

    fn set_message_info(&mut self, info: MessageInfo) {
        self.message_info = Some(info);
    }

    fn take_message_info(&mut self) -> Option<MessageInfo> {
        self.message_info.take()
    }
}
