//! Directory client interface.
//!
//! The session manager doesn't talk to a directory server itself. It opens
//! connections through a [`Connector`](trait.Connector.html) and performs
//! operations on the returned [`DirectoryClient`](trait.DirectoryClient.html).
//! The crate's own implementation, in the `ldap` module, is backed by the
//! `ldap3` crate; tests substitute an in-memory directory.
//!
//! Both traits are async and implemented with the `async_trait` proc macro,
//! so they work equally well under the async session and its blocking façade.

use crate::conn::{ConnectionIdentity, SessionSettings};
use crate::result::ClientError;
use crate::search::{Entry, SearchRequest};

use async_trait::async_trait;

/// Opens connections to a directory server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Client handle produced by this connector.
    type Client: DirectoryClient;

    /// Establish the transport for `identity`, without binding.
    async fn open(
        &self,
        identity: &ConnectionIdentity,
        settings: &SessionSettings,
    ) -> Result<Self::Client, ClientError>;
}

/// Operations on an open directory connection.
#[async_trait]
pub trait DirectoryClient: Send {
    /// Simple Bind with the given DN and password.
    async fn bind(&mut self, bind_dn: &str, credential: &str) -> Result<(), ClientError>;

    /// Perform a Search and collect all returned entries.
    ///
    /// A non-success result code must be reported as an error.
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<Entry>, ClientError>;

    /// Unbind and close the connection.
    async fn close(&mut self) -> Result<(), ClientError>;

    /// Whether the underlying connection is still usable, as last observed.
    fn is_connected(&mut self) -> bool;

    /// Whether the connection is still usable, after giving the client a
    /// chance to process pending connection events such as a server-side close.
    async fn check_connected(&mut self) -> bool {
        self.is_connected()
    }
}
