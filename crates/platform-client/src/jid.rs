//! Chat JID parsing and normalization.
//!
//! The platform addresses every chat by a `user@server` identifier. The
//! gateway validates identifiers before sending patches and stores the
//! normalized form, so equality checks do not depend on how the caller
//! spelled the server part.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// JID validation error.
#[derive(Debug, Error)]
pub enum JidError {
    #[error("malformed JID (expected user@server): {0}")]
    Malformed(String),

    #[error("JID has an empty user part: {0}")]
    EmptyUser(String),

    #[error("JID has an empty server part: {0}")]
    EmptyServer(String),
}

/// A validated `user@server` chat identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    /// Local part, kept as the caller wrote it.
    pub user: String,
    /// Server part, lowercased during parsing.
    pub server: String,
}

impl Jid {
    /// Parse and normalize a raw identifier.
    ///
    /// Surrounding whitespace is trimmed and the server part is lowercased.
    /// Identifiers with embedded whitespace, a missing `@`, or more than one
    /// `@` are rejected.
    pub fn parse(raw: &str) -> Result<Self, JidError> {
        let trimmed = raw.trim();
        let Some((user, server)) = trimmed.split_once('@') else {
            return Err(JidError::Malformed(raw.to_string()));
        };
        if user.is_empty() {
            return Err(JidError::EmptyUser(raw.to_string()));
        }
        if server.is_empty() {
            return Err(JidError::EmptyServer(raw.to_string()));
        }
        if server.contains('@') || trimmed.chars().any(char::is_whitespace) {
            return Err(JidError::Malformed(raw.to_string()));
        }
        Ok(Self {
            user: user.to_string(),
            server: server.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}
