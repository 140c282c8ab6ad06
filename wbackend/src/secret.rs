//! Credential wrapper that keeps secrets out of debug output.
//!
//! ```rust
//! use wbackend::SecretString;
//!
//! let key = SecretString::new("sk-local-123");
//! assert_eq!(key.expose(), "sk-local-123");
//! assert_eq!(format!("{key:?}"), "SecretString([REDACTED])");
//! ```

use std::fmt::{Debug, Formatter};

#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying value. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for SecretString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
