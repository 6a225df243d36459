use http::StatusCode;
use thiserror::Error;

/// Errors produced by the realm adapter.
///
/// Each variant corresponds to an outcome the hosting container must
/// translate into an HTTP response; [`Error::status`] gives that mapping.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid security configuration. Fatal for the request.
    #[error("security configuration error: {0}")]
    Configuration(String),

    /// The pluggable provider rejected the exchange or raised an error.
    #[error("authentication provider failure: {0}")]
    ProviderAuthFailure(String),

    /// A digest nonce count did not advance past the stored count.
    #[error("possible replay detected for nonce '{nonce}': count {incoming} <= {stored}")]
    ReplayDetected {
        /// Client nonce value
        nonce: String,
        /// Count supplied by the request
        incoming: u64,
        /// Highest count previously accepted
        stored: u64,
    },

    /// The permission oracle refused the query as malformed.
    #[error("invalid permission query: {0}")]
    OracleInvalidRequest(String),

    /// Unexpected failure while evaluating authorization.
    #[error("authorization service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Digest parameters are missing or unparsable.
    #[error("malformed digest request: {0}")]
    MalformedDigest(String),

    /// A client certificate chain is empty or its leaf cannot be parsed.
    #[error("malformed client certificate: {0}")]
    MalformedCertificate(String),

    /// The request carries no `Host` header.
    #[error("missing Host header")]
    MissingHostHeader,

    /// The `Host` header could not be parsed.
    #[error("invalid Host header '{0}'")]
    InvalidHostHeader(String),

    /// Realm login rejected the supplied credentials.
    #[error(transparent)]
    LoginFailed(#[from] LoginError),

    /// The legacy authenticator failed.
    #[error("authenticator failure: {0}")]
    Authenticator(String),
}

impl Error {
    /// Returns the HTTP status the container should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Configuration(_) | Error::ProviderAuthFailure(_) | Error::Authenticator(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::ReplayDetected { .. } | Error::LoginFailed(_) => StatusCode::UNAUTHORIZED,
            Error::OracleInvalidRequest(_)
            | Error::MalformedDigest(_)
            | Error::MalformedCertificate(_)
            | Error::MissingHostHeader
            | Error::InvalidHostHeader(_) => StatusCode::BAD_REQUEST,
            Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Failure raised by a [`PermissionOracle`](crate::PermissionOracle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The request could not be expressed as a permission query.
    #[error("invalid argument: {0}")]
    InvalidRequest(String),
    /// Any other oracle-side failure.
    #[error("oracle failure: {0}")]
    Failure(String),
}

impl From<OracleError> for Error {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::InvalidRequest(msg) => Error::OracleInvalidRequest(msg),
            OracleError::Failure(msg) => Error::ServiceUnavailable(msg),
        }
    }
}

/// Failure raised by a pluggable authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider's own authentication exception.
    #[error("{0}")]
    Auth(String),
    /// An unexpected runtime failure inside the provider.
    #[error("unexpected provider error: {0}")]
    Runtime(String),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Error::ProviderAuthFailure(err.to_string())
    }
}

/// Failure raised by a [`RealmLogin`](crate::RealmLogin).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("login failed for '{username}' in realm '{realm}': {reason}")]
pub struct LoginError {
    /// User the login was attempted for
    pub username: String,
    /// Realm the login was attempted against
    pub realm: String,
    /// Why the realm refused
    pub reason: String,
}

impl LoginError {
    /// Creates a new login error.
    pub fn new(
        username: impl Into<String>,
        realm: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            realm: realm.into(),
            reason: reason.into(),
        }
    }
}
