use std::fmt;

use serde::{Deserialize, Deserializer};
use zeroize::Zeroizing;

/// Credential material scoped to one request.
///
/// `Debug` never prints the value, there is no `Serialize` impl, and the
/// buffer is zeroized when the value is dropped.
#[derive(Clone, Default)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wrap a value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Borrow the plaintext. Callers must not log the returned value.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// True when the secret holds no characters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Treat blank input as absent.
    #[must_use]
    pub fn non_empty(value: Option<String>) -> Option<Self> {
        value
            .filter(|v| !v.trim().is_empty())
            .map(Secret::new)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for Secret {}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Secret::new)
    }
}
