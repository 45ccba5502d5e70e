use crate::Error;
use base64::{Engine, engine::general_purpose::STANDARD as B64};
use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use std::fmt;

#[derive(Clone, Default, Eq, PartialEq)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Credentials passed through to an upstream CI system.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Auth {
    /// HTTP basic auth, as job servers expect.
    Basic { user: String, password: SecretString },
    /// `Authorization: token <value>`, as hosted build APIs expect.
    Token { token: SecretString },
}

impl Auth {
    #[must_use]
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            user: user.into(),
            password: SecretString::new(password),
        }
    }

    #[must_use]
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: SecretString::new(token),
        }
    }

    /// Basic auth only when both parts are present; an empty pair means anonymous.
    #[must_use]
    pub fn basic_if_present(user: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (user, password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some(Self::basic(user, password))
            }
            _ => None,
        }
    }

    pub(crate) fn secrets(&self) -> Vec<&str> {
        match self {
            Self::Basic { password, .. } => vec![password.expose()],
            Self::Token { token } => vec![token.expose()],
        }
    }

    pub(crate) fn apply(&self, headers: &mut HeaderMap) -> Result<(), Error> {
        let raw = match self {
            Self::Basic { user, password } => {
                format!("Basic {}", B64.encode(format!("{user}:{}", password.expose())))
            }
            Self::Token { token } => format!("token {}", token.expose()),
        };
        let mut value = HeaderValue::from_str(&raw).map_err(|err| Error::InvalidConfig {
            message: "invalid Authorization header value".into(),
            source: Some(Box::new(err)),
        })?;
        value.set_sensitive(true);

        headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}
