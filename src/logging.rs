use std::fmt;

use crate::web::HttpRequest;

/// Request-scoped logger.
///
/// Captures the request path and caller so every decision and collaborator
/// failure is logged with that context. The values are copied out of the
/// request, leaving the caller free to mutate it afterwards.
#[derive(Debug, Clone)]
pub(crate) struct RequestLog {
    path: String,
    principal: String,
}

impl RequestLog {
    /// Captures context from `request`.
    pub(crate) fn for_request(request: &dyn HttpRequest) -> Self {
        Self {
            path: request.request_uri().to_string(),
            principal: request
                .user_principal()
                .map(|p| p.name().to_string())
                .unwrap_or_else(|| "<none>".to_string()),
        }
    }

    /// The captured request path.
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// The captured principal name, or `<none>`.
    pub(crate) fn principal(&self) -> &str {
        &self.principal
    }

    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(path = %self.path, principal = %self.principal, "{}", args);
    }

    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(path = %self.path, principal = %self.principal, "{}", args);
    }

    pub(crate) fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(path = %self.path, principal = %self.principal, "{}", args);
    }
}
