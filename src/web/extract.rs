//! Capability traits the hosting container implements.
//!
//! The adapter never inspects concrete container types. Anything that can
//! answer these questions about a request and accept these responses can be
//! driven through the adapter.

use http::{Method, StatusCode};

use crate::principal::WebPrincipal;
use crate::provider::MessageInfo;

/// Read and annotate an inbound HTTP request.
///
/// # Examples
///
/// ```
/// use realm_adapter::web::{HttpRequest, RequestAdapter};
/// use http::Method;
///
/// let request = RequestAdapter::new(Method::GET, "/shop/cart")
///     .with_context_path("/shop");
/// assert_eq!(request.request_path(), "/cart");
/// ```
pub trait HttpRequest {
    /// Full request URI without the query string.
    fn request_uri(&self) -> &str;

    /// Context path of the application the request is routed to.
    fn context_path(&self) -> &str;

    /// Servlet path, once the container or adapter has set it.
    fn servlet_path(&self) -> Option<&str>;

    /// Records the servlet path.
    fn set_servlet_path(&mut self, path: String);

    /// HTTP method.
    fn method(&self) -> &Method;

    /// True if the request arrived over a secure transport.
    fn is_secure(&self) -> bool;

    /// Server name the connection was addressed to.
    fn server_name(&self) -> &str;

    /// Header value, looked up case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;

    /// Raw query string.
    fn query_string(&self) -> Option<&str>;

    /// Session identifier the client presented.
    fn requested_session_id(&self) -> Option<&str>;

    /// True if the presented session identifier came from the URL.
    fn is_requested_session_id_from_url(&self) -> bool;

    /// Creates a session for the request if none exists.
    fn create_session(&mut self);

    /// Name of the servlet the request is mapped to.
    fn servlet_name(&self) -> Option<&str>;

    /// Authenticated principal, if any.
    fn user_principal(&self) -> Option<&WebPrincipal>;

    /// Sets or clears the authenticated principal.
    fn set_user_principal(&mut self, principal: Option<WebPrincipal>);

    /// Auth type label recorded for the principal.
    fn auth_type(&self) -> Option<&str>;

    /// Sets or clears the auth type label.
    fn set_auth_type(&mut self, auth_type: Option<String>);

    /// Provider exchange state cached on the request.
    fn message_info(&self) -> Option<&MessageInfo>;

    /// Caches provider exchange state for the rest of the request.
    fn set_message_info(&mut self, info: MessageInfo);

    /// Removes and returns the cached provider exchange state.
    fn take_message_info(&mut self) -> Option<MessageInfo>;

    /// Request URI relative to the context path.
    ///
    /// Empty when the URI is not longer than the context path.
    fn request_path(&self) -> &str {
        let uri = self.request_uri();
        let context = self.context_path();
        if context.len() < uri.len() {
            uri.get(context.len()..).unwrap_or("")
        } else {
            ""
        }
    }
}

/// Produce the HTTP outcome of a security decision.
pub trait HttpResponse {
    /// Sends an error status with an optional message.
    fn send_error(&mut self, status: StatusCode, message: Option<String>);

    /// Sends a redirect to `location`.
    fn send_redirect(&mut self, location: &str);

    /// Sets the status without committing a body.
    fn set_status(&mut self, status: StatusCode);

    /// Sets a response header, replacing any previous value.
    fn set_header(&mut self, name: &str, value: &str);

    /// Records a detail message for the container's error page.
    fn set_detail_message(&mut self, message: &str);
}
