//! An LDAP keyword library for test automation.
//!
//! The crate lets a test framework open a connection to a directory server,
//! run searches, and check their outcome: whether a search returns a single
//! entry, some entries or none, and what the attributes of a found entry are.
//! The directory protocol itself is handled by the `ldap3` crate.
//!
//! There are three layers, usable independently:
//!
//! * [`DirectorySession`](struct.DirectorySession.html), an async handle which
//!   keeps at most one open connection and performs searches and checks on it;
//!
//! * [`LdapSession`](struct.LdapSession.html), a blocking façade for the former,
//!   which owns its own Tokio runtime;
//!
//! * [`LdapLibrary`](struct.LdapLibrary.html), the keyword dispatcher which
//!   takes keyword names and string arguments from the test framework.
//!
//! ## Connections
//!
//! A connection is identified by the scheme, host, port and bind DN. Asking
//! to connect with the same identity while the connection is alive is a no-op;
//! a different identity closes the current connection first. A host prefixed
//! with `ldaps://` makes a TLS connection, which by default verifies the server
//! certificate. Accepting any certificate must be requested explicitly with
//! [`TlsTrust::TrustAll`](enum.TlsTrust.html#variant.TrustAll).
//!
//! ## Example
//!
//! ```rust,no_run
//! use ldap_keywords::result::Result;
//! use ldap_keywords::{LdapSession, SearchRequest, SearchScope};
//!
//! fn main() -> Result<()> {
//!     let mut session = LdapSession::new()?;
//!     session.connect("localhost", 2389, "cn=admin,dc=example,dc=org", "secret")?;
//!     let req = SearchRequest::new("ou=People,dc=example,dc=org", SearchScope::Subtree, "(uid=john)");
//!     let mail = session.single_attribute_value(req, "mail")?;
//!     println!("{}", mail);
//!     session.disconnect();
//!     Ok(())
//! }
//! ```

#[macro_use]
extern crate log;

mod client;
mod conn;
mod keywords;
mod ldap;
pub mod result;
mod search;
mod session;
mod sync;

pub use client::{Connector, DirectoryClient};
pub use conn::{ConnectionIdentity, Scheme, SessionSettings, TlsTrust};
pub use keywords::{settings_from_args, KeywordValue, LdapLibrary, LIBRARY_VERSION};
pub use ldap::{Ldap3Client, Ldap3Connector};
pub use search::{base_name, Entry, EntryCount, SearchRequest, SearchResult, SearchScope};
pub use session::DirectorySession;
pub use sync::LdapSession;
