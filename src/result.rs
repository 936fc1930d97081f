//! Error types and the crate-wide `Result` alias.
//!
//! Every keyword either completes or fails with an [`LdapKeywordError`]. The
//! variants follow the way a failure should be read by whoever runs the test:
//! configuration mistakes (bad host, scope, setting or keyword arguments),
//! connection problems, and the expected assertion failure,
//! [`UnexpectedEntryCount`](enum.LdapKeywordError.html#variant.UnexpectedEntryCount),
//! whose message carries both counts and the search parameters.
//!
//! Nothing here is retried. Transient and permanent network errors are
//! reported the same way.

use std::io;
use std::result::Result as StdResult;

use crate::search::{EntryCount, SearchRequest};

use thiserror::Error;

/// Type alias for the standard `Result` with the fixed `LdapKeywordError` error part.
pub type Result<T> = StdResult<T, LdapKeywordError>;

/// Failure reported by the directory collaborator.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Error returned by the LDAP client library.
    #[error(transparent)]
    Ldap(#[from] ldap3::result::LdapError),

    /// TLS connector could not be built.
    #[error("TLS setup error: {0}")]
    Tls(#[from] native_tls::Error),

    /// Any other collaborator failure.
    #[error("{0}")]
    Other(String),
}

/// Keyword-level error.
#[derive(Debug, Error)]
pub enum LdapKeywordError {
    /// The host argument can't be turned into a connection target.
    #[error("invalid LDAP host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    /// Connecting, TLS negotiation or binding failed.
    #[error("unable to connect to {identity}: {source}")]
    Connection {
        identity: String,
        #[source]
        source: ClientError,
    },

    /// Search attempted before a successful connect.
    #[error("there is no LDAP connection open")]
    NoActiveSession,

    /// Unrecognized scope string.
    #[error("invalid scope '{0}': scope should be BASE, ONE or SUB")]
    InvalidScope(String),

    /// The search itself failed, either in transport or with a non-success result code.
    #[error("LDAP search with {request} failed: {source}")]
    Search {
        request: SearchRequest,
        #[source]
        source: ClientError,
    },

    /// Entry count assertion failed.
    #[error("LDAP search returned {actual} {}, expected {expected}; {request}", plural(.actual))]
    UnexpectedEntryCount {
        expected: EntryCount,
        actual: usize,
        request: SearchRequest,
    },

    /// Requested attribute is not present in the entry.
    #[error("attribute '{attribute}' is not present in entry '{dn}'")]
    MissingAttribute { attribute: String, dn: String },

    /// Dispatcher was asked for a keyword it doesn't know.
    #[error("no keyword with name '{0}' found")]
    UnknownKeyword(String),

    /// Keyword called with the wrong number or shape of arguments.
    #[error("keyword '{keyword}' {reason}")]
    KeywordArguments { keyword: String, reason: String },

    /// Unknown setting or unparseable setting value.
    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// I/O error, e.g. when building the runtime.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn plural(n: &usize) -> &'static str {
    if *n == 1 {
        "entry"
    } else {
        "entries"
    }
}
