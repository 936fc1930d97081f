use std::time::Duration;

use crate::client::{Connector, DirectoryClient};
use crate::conn::{ConnectionIdentity, Scheme, SessionSettings, TlsTrust};
use crate::result::ClientError;
use crate::search::{Entry, SearchRequest};

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, SearchEntry};

const DRIVER_TURNS: usize = 8;

/// Connector backed by the `ldap3` client.
///
/// Each connection is driven by a task spawned on the current Tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ldap3Connector;

/// Open `ldap3` connection handle.
pub struct Ldap3Client {
    ldap: Ldap,
    op_timeout: Option<Duration>,
}

#[async_trait]
impl Connector for Ldap3Connector {
    type Client = Ldap3Client;

    async fn open(
        &self,
        identity: &ConnectionIdentity,
        settings: &SessionSettings,
    ) -> Result<Ldap3Client, ClientError> {
        let mut conn_settings = LdapConnSettings::new();
        if let Some(timeout) = settings.conn_timeout() {
            conn_settings = conn_settings.set_conn_timeout(timeout);
        }
        if identity.scheme() == Scheme::Tls {
            if settings.tls_trust() == TlsTrust::TrustAll {
                warn!(
                    "Server certificate of {} will not be verified",
                    identity.url()
                );
            }
            conn_settings = conn_settings.set_connector(settings.tls_trust().connector()?);
        }
        let (conn, ldap) = LdapConnAsync::with_settings(conn_settings, &identity.url()).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        });
        debug!("Opened {}", identity.url());
        Ok(Ldap3Client {
            ldap,
            op_timeout: settings.op_timeout(),
        })
    }
}

impl Ldap3Client {
    // ldap3 timeouts apply to the next operation only
    fn arm_timeout(&mut self) {
        if let Some(timeout) = self.op_timeout {
            self.ldap.with_timeout(timeout);
        }
    }
}

#[async_trait]
impl DirectoryClient for Ldap3Client {
    async fn bind(&mut self, bind_dn: &str, credential: &str) -> Result<(), ClientError> {
        self.arm_timeout();
        self.ldap.simple_bind(bind_dn, credential).await?.success()?;
        Ok(())
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<Entry>, ClientError> {
        self.arm_timeout();
        let attrs: Vec<&str> = request.attrs.iter().map(String::as_str).collect();
        let (rs, res) = self
            .ldap
            .search(&request.base, request.scope.into(), &request.filter, attrs)
            .await?
            .success()?;
        debug!("Search finished: {:?}", res);
        Ok(rs
            .into_iter()
            .map(|re| into_entry(SearchEntry::construct(re)))
            .collect())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.ldap.unbind().await?;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        !self.ldap.is_closed()
    }

    // A server-side close is seen only once the driver task gets to run,
    // which on a current-thread runtime means yielding to it first.
    async fn check_connected(&mut self) -> bool {
        for _ in 0..DRIVER_TURNS {
            if self.ldap.is_closed() {
                return false;
            }
            tokio::task::yield_now().await;
        }
        !self.ldap.is_closed()
    }
}

// Attribute maps arrive unordered, so sort by name for stable output.
// Values which aren't valid UTF-8 are converted lossily rather than dropped.
fn into_entry(se: SearchEntry) -> Entry {
    let mut attrs: Vec<(String, Vec<String>)> = se.attrs.into_iter().collect();
    attrs.extend(se.bin_attrs.into_iter().map(|(name, values)| {
        let values = values
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect();
        (name, values)
    }));
    attrs.sort_by(|a, b| a.0.cmp(&b.0));
    Entry { dn: se.dn, attrs }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::result::LdapKeywordError;
    use crate::search::SearchScope;
    use crate::sync::LdapSession;

    const BIND_REQUEST: u8 = 0x60;
    const SEARCH_REQUEST: u8 = 0x63;
    const BIND_RESPONSE: u8 = 0x61;
    const SEARCH_ENTRY: u8 = 0x64;
    const SEARCH_DONE: u8 = 0x65;
    const INVALID_CREDENTIALS: u8 = 49;

    #[derive(Clone, Copy)]
    struct Script {
        bind_rc: u8,
        hang_up_first: bool,
    }

    // Plain-TCP directory which answers Bind and Search, and stops talking
    // on Unbind or anything else. If hang_up_first is set, the first
    // connection is closed right after its Bind response.
    fn serve(script: Script) -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => break,
                };
                let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
                thread::spawn(move || answer(stream, script, first));
            }
        });
        (port, accepted)
    }

    fn answer(mut stream: TcpStream, script: Script, first: bool) {
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        while let Some((id, op)) = read_message(&mut stream) {
            let reply = match op {
                BIND_REQUEST => message(&id, &tlv(BIND_RESPONSE, &ldap_result(script.bind_rc))),
                SEARCH_REQUEST => {
                    let entry = [
                        tlv(0x04, b"uid=john,o=mydomain,c=com"),
                        tlv(0x30, &attribute("mail", &["a@x.com", "b@x.com"])),
                    ]
                    .concat();
                    [
                        message(&id, &tlv(SEARCH_ENTRY, &entry)),
                        message(&id, &tlv(SEARCH_DONE, &ldap_result(0))),
                    ]
                    .concat()
                }
                _ => return,
            };
            if stream.write_all(&reply).is_err() {
                return;
            }
            if op == BIND_REQUEST && script.hang_up_first && first {
                return;
            }
        }
    }

    // Message ID bytes and protocol op tag of the next request.
    fn read_message(stream: &mut TcpStream) -> Option<(Vec<u8>, u8)> {
        let mut head = [0u8; 2];
        stream.read_exact(&mut head).ok()?;
        let len = if head[1] & 0x80 == 0 {
            head[1] as usize
        } else {
            let mut octets = vec![0u8; (head[1] & 0x7f) as usize];
            stream.read_exact(&mut octets).ok()?;
            octets.iter().fold(0, |acc, b| acc << 8 | *b as usize)
        };
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).ok()?;
        let id_len = *body.get(1)? as usize;
        let op = *body.get(2 + id_len)?;
        Some((body[2..2 + id_len].to_vec(), op))
    }

    fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        if content.len() >= 0x80 {
            out.push(0x81);
        }
        out.push(content.len() as u8);
        out.extend_from_slice(content);
        out
    }

    fn message(id: &[u8], op: &[u8]) -> Vec<u8> {
        tlv(0x30, &[tlv(0x02, id), op.to_vec()].concat())
    }

    fn ldap_result(rc: u8) -> Vec<u8> {
        [tlv(0x0a, &[rc]), tlv(0x04, b""), tlv(0x04, b"")].concat()
    }

    fn attribute(name: &str, values: &[&str]) -> Vec<u8> {
        let values: Vec<u8> = values
            .iter()
            .flat_map(|v| tlv(0x04, v.as_bytes()))
            .collect();
        tlv(0x30, &[tlv(0x04, name.as_bytes()), tlv(0x31, &values)].concat())
    }

    fn session() -> LdapSession {
        let settings = SessionSettings::new()
            .set_conn_timeout(Duration::from_secs(5))
            .set_op_timeout(Duration::from_secs(5));
        LdapSession::with_connector(Ldap3Connector, settings).unwrap()
    }

    fn request() -> SearchRequest {
        SearchRequest::new("o=mydomain,c=com", SearchScope::Subtree, "(uid=john)")
    }

    #[test]
    fn bind_and_search() {
        let (port, accepted) = serve(Script {
            bind_rc: 0,
            hang_up_first: false,
        });
        let mut session = session();
        session.connect("127.0.0.1", port, "cn=admin", "secret").unwrap();
        assert!(session.is_connected());
        session.require_single_entry(request()).unwrap();
        assert_eq!(
            session.single_attribute_value(request(), "mail").unwrap(),
            "a@x.com"
        );
        session.connect("127.0.0.1", port, "cn=admin", "secret").unwrap();
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        session.disconnect();
        assert!(!session.is_connected());
    }

    #[test]
    fn rejected_bind_is_connection_error() {
        let (port, _) = serve(Script {
            bind_rc: INVALID_CREDENTIALS,
            hang_up_first: false,
        });
        let mut session = session();
        match session.connect("127.0.0.1", port, "cn=admin", "wrong") {
            Err(LdapKeywordError::Connection { identity, .. }) => {
                assert_eq!(identity, format!("ldap://127.0.0.1:{} as cn=admin", port))
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(session.identity().is_none());
    }

    #[test]
    fn server_hangup_is_noticed_on_reconnect() {
        let (port, accepted) = serve(Script {
            bind_rc: 0,
            hang_up_first: true,
        });
        let mut session = session();
        session.connect("127.0.0.1", port, "cn=admin", "secret").unwrap();
        thread::sleep(Duration::from_millis(300));
        assert!(!session.is_connected());
        session.connect("127.0.0.1", port, "cn=admin", "secret").unwrap();
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
        session.require_single_entry(request()).unwrap();
    }

    #[test]
    fn search_entry_conversion() {
        let mut attrs = HashMap::new();
        attrs.insert("uid".to_owned(), vec!["john".to_owned()]);
        attrs.insert(
            "mail".to_owned(),
            vec!["a@x.com".to_owned(), "b@x.com".to_owned()],
        );
        let mut bin_attrs = HashMap::new();
        bin_attrs.insert("jpegPhoto".to_owned(), vec![vec![0xff, 0xd8]]);
        let entry = into_entry(SearchEntry {
            dn: "uid=john,o=mydomain,c=com".to_owned(),
            attrs,
            bin_attrs,
        });
        assert_eq!(entry.dn, "uid=john,o=mydomain,c=com");
        let names: Vec<&str> = entry.attrs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["jpegPhoto", "mail", "uid"]);
        assert_eq!(entry.values("mail").unwrap(), vec!["a@x.com", "b@x.com"]);
        assert_eq!(entry.values("jpegphoto").unwrap().len(), 1);
    }
}
