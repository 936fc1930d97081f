use std::collections::BTreeMap;

use crate::client::Connector;
use crate::conn::{ConnectionIdentity, SessionSettings};
use crate::ldap::Ldap3Connector;
use crate::result::Result;
use crate::search::{SearchRequest, SearchResult};
use crate::session::DirectorySession;

use tokio::runtime::{self, Runtime};

/// Synchronous session handle.
///
/// This is a thin wrapper over the asynchronous [`DirectorySession`](struct.DirectorySession.html)
/// which owns a single-threaded Tokio runtime and blocks on every call.
/// Because of the runtime, it must not be used from within an async context.
pub struct LdapSession<C: Connector = Ldap3Connector> {
    session: DirectorySession<C>,
    rt: Runtime,
}

impl LdapSession<Ldap3Connector> {
    /// Create a session using the `ldap3` client and default settings.
    pub fn new() -> Result<Self> {
        Self::with_settings(SessionSettings::new())
    }

    /// Create a session using the `ldap3` client.
    pub fn with_settings(settings: SessionSettings) -> Result<Self> {
        Self::with_connector(Ldap3Connector, settings)
    }
}

impl<C: Connector> LdapSession<C> {
    pub fn with_connector(connector: C, settings: SessionSettings) -> Result<Self> {
        let rt = runtime::Builder::new_current_thread().enable_all().build()?;
        Ok(LdapSession {
            session: DirectorySession::with_settings(connector, settings),
            rt,
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        self.session.settings()
    }

    pub fn identity(&self) -> Option<&ConnectionIdentity> {
        self.session.identity()
    }

    pub fn is_connected(&mut self) -> bool {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.is_connected().await })
    }

    pub fn connect(&mut self, host: &str, port: u16, bind_dn: &str, credential: &str) -> Result<()> {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.connect(host, port, bind_dn, credential).await })
    }

    pub fn disconnect(&mut self) {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.disconnect().await })
    }

    pub fn search(&mut self, request: SearchRequest) -> Result<SearchResult> {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.search(request).await })
    }

    pub fn require_single_entry(&mut self, request: SearchRequest) -> Result<()> {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.require_single_entry(request).await })
    }

    pub fn require_some_entries(&mut self, request: SearchRequest) -> Result<()> {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.require_some_entries(request).await })
    }

    pub fn require_no_entries(&mut self, request: SearchRequest) -> Result<()> {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.require_no_entries(request).await })
    }

    pub fn entry_as_mapping(
        &mut self,
        request: SearchRequest,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.entry_as_mapping(request).await })
    }

    pub fn single_attribute_value(&mut self, request: SearchRequest, attr: &str) -> Result<String> {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.single_attribute_value(request, attr).await })
    }

    pub fn attribute_values(&mut self, request: SearchRequest, attr: &str) -> Result<Vec<String>> {
        let rt = &self.rt;
        let session = &mut self.session;
        rt.block_on(async move { session.attribute_values(request, attr).await })
    }
}

impl<C: Connector> Drop for LdapSession<C> {
    fn drop(&mut self) {
        if self.session.identity().is_some() {
            let rt = &self.rt;
            let session = &mut self.session;
            rt.block_on(async move { session.disconnect().await });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockDirectory;
    use crate::search::{Entry, SearchScope};

    #[test]
    fn blocking_round() {
        let dir = MockDirectory::with_entries(vec![Entry::new("uid=john,o=mydomain,c=com")
            .attr("mail", &["a@x.com", "b@x.com"])]);
        let mut session = LdapSession::with_connector(dir.clone(), SessionSettings::new()).unwrap();
        session.connect("localhost", 2389, "cn=admin", "secret").unwrap();
        assert!(session.is_connected());
        let req = SearchRequest::new("o=mydomain,c=com", SearchScope::Subtree, "(uid=john)");
        session.require_single_entry(req.clone()).unwrap();
        assert_eq!(session.single_attribute_value(req, "mail").unwrap(), "a@x.com");
        session.disconnect();
        assert!(!session.is_connected());
        assert_eq!(dir.state().closed.len(), 1);
    }

    #[test]
    fn drop_disconnects() {
        let dir = MockDirectory::default();
        {
            let mut session = LdapSession::with_connector(dir.clone(), SessionSettings::new()).unwrap();
            session.connect("localhost", 2389, "cn=admin", "secret").unwrap();
        }
        assert_eq!(dir.state().closed, vec!["ldap://localhost:2389"]);
    }
}
