use std::fmt;

/// A password that cannot be accidentally logged.
///
/// `Password` carries credentials from the container into realm logins and
/// authenticator registration. Its `Debug` and `Display` output is always
/// `[REDACTED]`; the value is only reachable through [`Password::expose`].
///
/// # Examples
///
/// ```
/// use realm_adapter::Password;
///
/// let password = Password::new("hunter2");
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(password.expose(), "hunter2");
/// ```
// Do NOT derive Clone, Debug or Display: copies and formatting bypass redaction.
pub struct Password {
    inner: Box<str>,
}

impl Password {
    /// Wraps a password value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into().into_boxed_str(),
        }
    }

    /// Explicitly exposes the password.
    ///
    /// The returned value must never reach a log line or an audit event.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Returns true if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
