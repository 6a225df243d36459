//! Contract of the permission oracle.
//!
//! The oracle owns the declarative constraint model; the adapter only asks
//! it yes/no/redirect questions.

use http::Method;

use crate::error::OracleError;
use crate::principal::Principal;
use crate::web::HttpRequest;

/// Verdict on a request's transport guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDataVerdict {
    /// The current transport satisfies every applicable constraint.
    Granted,
    /// No transport would satisfy the constraints.
    Denied,
    /// Granted once the request is repeated over a secure transport.
    RequiresSecureTransport,
}

impl TryFrom<i32> for UserDataVerdict {
    type Error = OracleError;

    /// Maps the wire codes `1`, `0` and `-1`.
    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(UserDataVerdict::Granted),
            0 => Ok(UserDataVerdict::Denied),
            -1 => Ok(UserDataVerdict::RequiresSecureTransport),
            other => Err(OracleError::Failure(format!(
                "unknown user data verdict {other}"
            ))),
        }
    }
}

/// Answers authorization questions for one application.
///
/// Calls are synchronous with no internal timeout; the adapter never holds
/// one of its own locks while calling into the oracle.
pub trait PermissionOracle: Send + Sync {
    /// Whether the caller on `request` may access the requested resource.
    fn has_resource_permission(&self, request: &dyn HttpRequest) -> Result<bool, OracleError>;

    /// Transport verdict for `request`, or for an explicit `uri` and `method`.
    fn has_user_data_permission(
        &self,
        request: &dyn HttpRequest,
        uri: Option<&str>,
        method: Option<&Method>,
    ) -> Result<UserDataVerdict, OracleError>;

    /// Whether the requested resource is open to anonymous callers.
    fn permit_all(&self, request: &dyn HttpRequest) -> Result<bool, OracleError>;

    /// Whether `principal` holds `role` as referenced by `component`.
    fn has_role_ref_permission(
        &self,
        component: &str,
        role: &str,
        principal: Option<&Principal>,
    ) -> bool;

    /// True if the application declares no constrained resources at all.
    fn has_no_constrained_resources(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_codes() {
        assert_eq!(UserDataVerdict::try_from(1), Ok(UserDataVerdict::Granted));
        assert_eq!(UserDataVerdict::try_from(0), Ok(UserDataVerdict::Denied));
        assert_eq!(
            UserDataVerdict::try_from(-1),
            Ok(UserDataVerdict::RequiresSecureTransport)
        );
        assert!(UserDataVerdict::try_from(2).is_err());
    }
}
