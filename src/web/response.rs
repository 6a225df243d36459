//! Recording response type implementing [`HttpResponse`].

use http::StatusCode;

use super::HttpResponse;

/// A response that records what the adapter asked of it.
///
/// # Examples
///
/// ```
/// use realm_adapter::web::{HttpResponse, ResponseRecorder};
/// use http::StatusCode;
///
/// let mut response = ResponseRecorder::new();
/// response.send_error(StatusCode::FORBIDDEN, None);
/// assert_eq!(response.status(), StatusCode::FORBIDDEN);
/// assert!(response.is_committed());
/// ```
#[derive(Debug, Clone)]
pub struct ResponseRecorder {
    status: StatusCode,
    message: Option<String>,
    redirect: Option<String>,
    headers: Vec<(String, String)>,
    detail: Option<String>,
    committed: bool,
}

impl ResponseRecorder {
    /// Creates an uncommitted `200 OK` response.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            message: None,
            redirect: None,
            headers: Vec::new(),
            detail: None,
            committed: false,
        }
    }

    /// Current status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Message sent with the last error.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Redirect location, if a redirect was sent.
    pub fn redirect_location(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    /// Header value by exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Detail message for the error page.
    pub fn detail_message(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// True once an error or redirect has been sent.
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl Default for ResponseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResponse for ResponseRecorder {
    fn send_error(&mut self, status: StatusCode, message: Option<String>) {
        self.status = status;
        self.message = message;
        self.committed = true;
    }

    fn send_redirect(&mut self, location: &str) {
        self.status = StatusCode::FOUND;
        self.redirect = Some(location.to_string());
        self.set_header("Location", location);
        self.committed = true;
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn set_detail_message(&mut self, message: &str) {
        self.detail = Some(message.to_string());
    }
}
