//! Directory session management.
//!
//! A [`DirectorySession`](struct.DirectorySession.html) holds at most one open,
//! bound connection. Connecting again with the same identity while the
//! connection is alive does nothing; connecting with a different identity, or
//! after the connection was lost, closes the old connection and opens a new
//! one. Every search runs on the current connection and fails immediately if
//! there is none.
//!
//! The session is an ordinary value owned by whoever runs the tests. All
//! operations take `&mut self`; share a session between threads only behind a
//! mutex.

use std::collections::BTreeMap;

use crate::client::{Connector, DirectoryClient};
use crate::conn::{ConnectionIdentity, SessionSettings};
use crate::result::{LdapKeywordError, Result};
use crate::search::{Entry, EntryCount, SearchRequest, SearchResult};

struct Active<T> {
    identity: ConnectionIdentity,
    client: T,
}

/// Asynchronous session handle.
pub struct DirectorySession<C: Connector> {
    connector: C,
    settings: SessionSettings,
    active: Option<Active<C::Client>>,
}

impl<C: Connector> DirectorySession<C> {
    /// Create a session with default settings. No connection is opened.
    pub fn new(connector: C) -> Self {
        Self::with_settings(connector, SessionSettings::new())
    }

    pub fn with_settings(connector: C, settings: SessionSettings) -> Self {
        DirectorySession {
            connector,
            settings,
            active: None,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Identity of the current connection, if there is one.
    pub fn identity(&self) -> Option<&ConnectionIdentity> {
        self.active.as_ref().map(|a| &a.identity)
    }

    /// Whether there is a connection and it reports itself as connected.
    pub async fn is_connected(&mut self) -> bool {
        match self.active.as_mut() {
            Some(active) => active.client.check_connected().await,
            None => false,
        }
    }

    /// Connect and bind, reusing the current connection if it matches.
    ///
    /// Prefix `host` with `ldaps://` for a TLS connection. If opening or
    /// binding fails, the session is left without a connection.
    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        bind_dn: &str,
        credential: &str,
    ) -> Result<()> {
        let identity = ConnectionIdentity::new(host, port, bind_dn)?;
        if let Some(mut active) = self.active.take() {
            if active.identity != identity {
                warn!(
                    "There is already a connection to {}. Going to reconnect to {}.",
                    active.identity, identity
                );
            } else if active.client.check_connected().await {
                info!("There is already an LDAP connection open to {}", identity);
                self.active = Some(active);
                return Ok(());
            } else {
                warn!("Connection to {} was lost. Going to reconnect.", identity);
            }
            close_quietly(&mut active).await;
        }
        info!("Connecting to {}", identity);
        let mut client = match self.connector.open(&identity, &self.settings).await {
            Ok(client) => client,
            Err(source) => {
                return Err(LdapKeywordError::Connection {
                    identity: identity.to_string(),
                    source,
                })
            }
        };
        if let Err(source) = client.bind(bind_dn, credential).await {
            let mut failed = Active { identity, client };
            close_quietly(&mut failed).await;
            return Err(LdapKeywordError::Connection {
                identity: failed.identity.to_string(),
                source,
            });
        }
        self.active = Some(Active { identity, client });
        Ok(())
    }

    /// Close the current connection. Without one, only a warning is logged.
    pub async fn disconnect(&mut self) {
        match self.active.take() {
            Some(mut active) => {
                if active.client.check_connected().await {
                    info!("Disconnecting from {}", active.identity);
                    close_quietly(&mut active).await;
                } else {
                    warn!("Connection to {} is already closed", active.identity);
                }
            }
            None => warn!("There is no current connection to an LDAP server"),
        }
    }

    /// Run a Search on the current connection.
    pub async fn search(&mut self, request: SearchRequest) -> Result<SearchResult> {
        let active = self
            .active
            .as_mut()
            .ok_or(LdapKeywordError::NoActiveSession)?;
        info!("Performing search with {}", request);
        match active.client.search(&request).await {
            Ok(entries) => Ok(SearchResult { request, entries }),
            Err(source) => Err(LdapKeywordError::Search { request, source }),
        }
    }

    /// Fail unless the search returns exactly one entry.
    pub async fn require_single_entry(&mut self, request: SearchRequest) -> Result<()> {
        self.search(request).await?.single().map(|_| ())
    }

    /// Fail if the search returns no entries.
    pub async fn require_some_entries(&mut self, request: SearchRequest) -> Result<()> {
        self.search(request)
            .await?
            .expect_count(EntryCount::AtLeastOne)
            .map(|_| ())
    }

    /// Fail if the search returns any entries.
    pub async fn require_no_entries(&mut self, request: SearchRequest) -> Result<()> {
        self.search(request)
            .await?
            .expect_count(EntryCount::Zero)
            .map(|_| ())
    }

    /// Return the attributes of the single entry found by the search, keyed by
    /// attribute base name.
    pub async fn entry_as_mapping(
        &mut self,
        request: SearchRequest,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.single_entry(request).await?.to_mapping())
    }

    /// Return the first value of `attr` in the single entry found by the search.
    ///
    /// Only `attr` is requested from the server. An entry without the attribute
    /// is an error.
    pub async fn single_attribute_value(
        &mut self,
        request: SearchRequest,
        attr: &str,
    ) -> Result<String> {
        let value = self
            .single_entry(request.attrs(&[attr]))
            .await?
            .first_value(attr)?;
        info!("Returning value '{}'", value);
        Ok(value)
    }

    /// Return all values of `attr` in the single entry found by the search.
    pub async fn attribute_values(
        &mut self,
        request: SearchRequest,
        attr: &str,
    ) -> Result<Vec<String>> {
        let entry = self.single_entry(request.attrs(&[attr])).await?;
        entry
            .values(attr)
            .ok_or_else(|| LdapKeywordError::MissingAttribute {
                attribute: attr.to_owned(),
                dn: entry.dn.clone(),
            })
    }

    async fn single_entry(&mut self, request: SearchRequest) -> Result<Entry> {
        self.search(request).await?.single()
    }
}

async fn close_quietly<T: DirectoryClient>(active: &mut Active<T>) {
    if let Err(e) = active.client.close().await {
        warn!("Error closing connection to {}: {}", active.identity, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockDirectory;
    use crate::search::SearchScope;

    fn john() -> Entry {
        Entry::new("uid=john,o=mydomain,c=com")
            .attr("uid", &["john"])
            .attr("mail", &["a@x.com", "b@x.com"])
    }

    fn request() -> SearchRequest {
        SearchRequest::new("o=mydomain,c=com", SearchScope::Subtree, "(uid=john)")
    }

    #[tokio::test]
    async fn connect_twice_is_noop() {
        let dir = MockDirectory::default();
        let mut session = DirectorySession::new(dir.clone());
        session.connect("localhost", 2389, "cn=admin", "secret").await.unwrap();
        session.connect("ldap://localhost", 2389, "cn=admin", "secret").await.unwrap();
        let state = dir.state();
        assert_eq!(state.opened.len(), 1);
        assert_eq!(state.binds, vec!["cn=admin"]);
        assert!(state.closed.is_empty());
    }

    #[tokio::test]
    async fn different_identity_replaces_connection() {
        let dir = MockDirectory::default();
        let mut session = DirectorySession::new(dir.clone());
        session.connect("localhost", 2389, "cn=admin", "secret").await.unwrap();
        session.connect("localhost", 2389, "cn=other", "secret").await.unwrap();
        assert_eq!(session.identity().unwrap().bind_dn(), "cn=other");
        let state = dir.state();
        assert_eq!(state.opened.len(), 2);
        assert_eq!(state.closed, vec!["ldap://localhost:2389"]);
        assert_eq!(
            state.events,
            vec![
                "open ldap://localhost:2389",
                "close ldap://localhost:2389",
                "open ldap://localhost:2389",
            ]
        );
    }

    #[tokio::test]
    async fn lost_connection_is_reopened() {
        let dir = MockDirectory::default();
        let mut session = DirectorySession::new(dir.clone());
        session.connect("localhost", 2389, "cn=admin", "secret").await.unwrap();
        dir.sever();
        assert!(!session.is_connected().await);
        session.connect("localhost", 2389, "cn=admin", "secret").await.unwrap();
        assert!(session.is_connected().await);
        let state = dir.state();
        assert_eq!(state.opened.len(), 2);
        assert_eq!(state.closed.len(), 1);
    }

    #[tokio::test]
    async fn disconnect_without_session() {
        let dir = MockDirectory::default();
        let mut session = DirectorySession::new(dir.clone());
        session.disconnect().await;
        session.disconnect().await;
        assert!(dir.state().closed.is_empty());
    }

    #[tokio::test]
    async fn disconnect_closes() {
        let dir = MockDirectory::default();
        let mut session = DirectorySession::new(dir.clone());
        session.connect("localhost", 2389, "cn=admin", "secret").await.unwrap();
        session.disconnect().await;
        assert!(session.identity().is_none());
        assert_eq!(dir.state().closed.len(), 1);
        session.disconnect().await;
        assert_eq!(dir.state().closed.len(), 1);
    }

    #[tokio::test]
    async fn search_without_session() {
        let dir = MockDirectory::with_entries(vec![john()]);
        let mut session = DirectorySession::new(dir.clone());
        match session.search(request()).await {
            Err(LdapKeywordError::NoActiveSession) => (),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(dir.state().searches.is_empty());
    }

    #[tokio::test]
    async fn unreachable_host() {
        let dir = MockDirectory::default();
        dir.state().unreachable = true;
        let mut session = DirectorySession::new(dir.clone());
        match session.connect("localhost", 2389, "cn=admin", "secret").await {
            Err(LdapKeywordError::Connection { identity, .. }) => {
                assert_eq!(identity, "ldap://localhost:2389 as cn=admin")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn rejected_bind_leaves_no_session() {
        let dir = MockDirectory::default();
        dir.state().reject_bind = true;
        let mut session = DirectorySession::new(dir.clone());
        let err = session
            .connect("ldaps://localhost", 636, "cn=admin", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, LdapKeywordError::Connection { .. }));
        assert!(session.identity().is_none());
        assert_eq!(dir.state().closed, vec!["ldaps://localhost:636"]);
    }

    #[tokio::test]
    async fn single_entry_assertions() {
        let dir = MockDirectory::with_entries(vec![john()]);
        let mut session = DirectorySession::new(dir.clone());
        session.connect("localhost", 2389, "", "").await.unwrap();
        session.require_single_entry(request()).await.unwrap();
        session.require_some_entries(request()).await.unwrap();
        let err = session.require_no_entries(request()).await.unwrap_err();
        assert!(err.to_string().contains("returned 1 entry, expected none"));

        dir.state().entries.push(john());
        let err = session.require_single_entry(request()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("returned 2 entries"), "{}", msg);
        assert!(msg.contains("base 'o=mydomain,c=com'"), "{}", msg);
        assert!(msg.contains("scope 'SUB'"), "{}", msg);
        assert!(msg.contains("filter '(uid=john)'"), "{}", msg);

        dir.state().entries.clear();
        session.require_no_entries(request()).await.unwrap();
        assert!(session.require_some_entries(request()).await.is_err());
        assert!(session.require_single_entry(request()).await.is_err());
    }

    #[tokio::test]
    async fn extraction() {
        let dir = MockDirectory::with_entries(vec![john()]);
        let mut session = DirectorySession::new(dir.clone());
        session.connect("localhost", 2389, "", "").await.unwrap();

        let map = session.entry_as_mapping(request()).await.unwrap();
        assert_eq!(map["mail"], vec!["a@x.com", "b@x.com"]);

        let value = session.single_attribute_value(request(), "mail").await.unwrap();
        assert_eq!(value, "a@x.com");
        assert_eq!(dir.state().searches.last().unwrap().attrs, vec!["mail"]);

        let values = session.attribute_values(request(), "MAIL").await.unwrap();
        assert_eq!(values, vec!["a@x.com", "b@x.com"]);

        match session.single_attribute_value(request(), "telephoneNumber").await {
            Err(LdapKeywordError::MissingAttribute { attribute, .. }) => {
                assert_eq!(attribute, "telephoneNumber")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(session.attribute_values(request(), "cn").await.is_err());
    }
}
