//! # Script Keys
//!
//! A registry key is either a bare method path (`"items"`) or an uppercase
//! verb, one space, and the path (`"GET items"`). Bare keys answer every
//! verb at dispatch time and are reported as `POST` endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key of the environment-initialization script. Never dispatchable.
pub const ENVIRONMENT_KEY: &str = "__environment";

/// HTTP request methods a script key may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
}

impl HttpVerb {
    /// Every verb.
    pub const ALL: [HttpVerb; 9] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Patch,
        Self::Head,
        Self::Options,
        Self::Connect,
        Self::Trace,
    ];

    /// Uppercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for strings that are not an uppercase HTTP verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVerb(pub String);

impl fmt::Display for UnknownVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown HTTP verb '{}'", self.0)
    }
}

impl std::error::Error for UnknownVerb {}

impl FromStr for HttpVerb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVerb(s.to_string()))
    }
}

/// Verb-prefixed key for `path`: `"<VERB> <path>"`.
pub fn verb_prefixed(verb: &str, path: &str) -> String {
    format!("{verb} {path}")
}

/// Split a registry key into its verb and path.
///
/// Keys without a space are bare and default to `POST`. Returns `None` if the
/// prefix is not a known verb.
pub fn split_script_key(key: &str) -> Option<(HttpVerb, &str)> {
    match key.split_once(' ') {
        Some((verb, path)) => verb.parse().ok().map(|v| (v, path)),
        None => Some((HttpVerb::Post, key)),
    }
}
