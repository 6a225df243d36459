//! Digest authentication request parameters.
//!
//! Key derivation belongs to the realm. This module only carries the
//! parameters, finds the client nonce and nonce count the replay check needs,
//! and parses an `Authorization: Digest ...` header into parameters.

use crate::error::Error;

/// Parameter name of the client nonce.
pub const CNONCE: &str = "cnonce";

/// Parameter name of the hex nonce count.
pub const NONCE_COUNT: &str = "nc";

/// Parameter name of the digest user.
pub const USERNAME: &str = "username";

/// One digest parameter, possibly grouping nested parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestParameter {
    name: String,
    value: String,
    nested: Vec<DigestParameter>,
}

impl DigestParameter {
    /// Creates a plain name/value parameter.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            nested: Vec::new(),
        }
    }

    /// Creates a parameter grouping nested parameters.
    pub fn nested(name: impl Into<String>, params: Vec<DigestParameter>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            nested: params,
        }
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Nested parameters.
    pub fn params(&self) -> &[DigestParameter] {
        &self.nested
    }
}

/// Parameters of one digest-authenticated request.
///
/// # Examples
///
/// ```
/// use realm_adapter::DigestRequest;
///
/// let request = DigestRequest::from_authorization_header(
///     r#"Digest username="alice", realm="shop", nonce="xyz", uri="/cart", cnonce="abc123", nc=0000000a, qop=auth, response="deadbeef""#,
/// ).unwrap();
///
/// assert_eq!(request.username(), Some("alice"));
/// assert_eq!(request.nonce_count().unwrap(), ("abc123", 10));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestRequest {
    params: Vec<DigestParameter>,
}

impl DigestRequest {
    /// Wraps already generated parameters.
    pub fn new(params: Vec<DigestParameter>) -> Self {
        Self { params }
    }

    /// Parses the value of an `Authorization` header using the Digest scheme.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDigest`] if the scheme is not Digest or a
    /// parameter is not a `name=value` pair.
    pub fn from_authorization_header(value: &str) -> Result<Self, Error> {
        let value = value.trim();
        let rest = match value.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("digest") => rest,
            _ => {
                return Err(Error::MalformedDigest(
                    "authorization scheme is not Digest".to_string(),
                ))
            }
        };

        let params = split_params(rest)
            .into_iter()
            .map(|part| {
                let (name, raw) = part.split_once('=').ok_or_else(|| {
                    Error::MalformedDigest(format!("parameter '{part}' has no value"))
                })?;
                let raw = raw.trim();
                let unquoted = raw
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(raw);
                Ok(DigestParameter::new(
                    name.trim().to_ascii_lowercase(),
                    unquoted.replace("\\\"", "\""),
                ))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { params })
    }

    /// Top-level parameters.
    pub fn params(&self) -> &[DigestParameter] {
        &self.params
    }

    /// First value named `name`, searching top-level then nested parameters.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.params.iter().find_map(|p| find_in(p, name))
    }

    /// The digest user, if present.
    pub fn username(&self) -> Option<&str> {
        self.find(USERNAME)
    }

    /// Client nonce and parsed nonce count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDigest`] if either parameter is missing or
    /// the count is not hexadecimal.
    pub fn nonce_count(&self) -> Result<(&str, u64), Error> {
        let cnonce = self
            .find(CNONCE)
            .ok_or_else(|| Error::MalformedDigest("missing cnonce".to_string()))?;
        let nc = self
            .find(NONCE_COUNT)
            .ok_or_else(|| Error::MalformedDigest("missing nc".to_string()))?;
        let count = u64::from_str_radix(nc, 16)
            .map_err(|e| Error::MalformedDigest(format!("nonce count '{nc}': {e}")))?;
        Ok((cnonce, count))
    }
}

fn find_in<'a>(param: &'a DigestParameter, name: &str) -> Option<&'a str> {
    if param.nested.is_empty() {
        return (param.name == name).then_some(param.value.as_str());
    }
    param.nested.iter().find_map(|p| find_in(p, name))
}

/// Splits on commas outside quoted strings.
fn split_params(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(input[start..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Credentials handed to the realm for digest login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestCredentials {
    /// Realm the login targets
    pub realm: String,
    /// Digest user
    pub username: String,
    /// Every parameter of the request
    pub params: Vec<DigestParameter>,
}
