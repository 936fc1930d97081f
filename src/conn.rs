//! Connection targets and session settings.
//!
//! The host given to the connect keyword may carry a scheme prefix:
//! `ldaps://` selects TLS from the start of the connection, `ldap://` or no
//! prefix a plain TCP connection. Together with the port and the bind DN,
//! the normalized host makes up the [`ConnectionIdentity`], which decides
//! whether an open connection can be reused.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use crate::result::{LdapKeywordError, Result};

use native_tls::TlsConnector;
use url::Host;

/// Transport used for the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain TCP, `ldap://`.
    Plain,
    /// TLS from the start of the connection, `ldaps://`.
    Tls,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Plain => "ldap",
            Scheme::Tls => "ldaps",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that distinguishes one directory connection from another.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionIdentity {
    scheme: Scheme,
    host: Host<String>,
    port: u16,
    bind_dn: String,
}

impl ConnectionIdentity {
    /// Normalize the host argument and build the identity.
    ///
    /// IPv6 literals may be given with or without brackets.
    pub fn new(host: &str, port: u16, bind_dn: &str) -> Result<Self> {
        let invalid = |reason: &str| LdapKeywordError::InvalidHost {
            host: host.to_owned(),
            reason: reason.to_owned(),
        };
        let trimmed = host.trim();
        let (scheme, rest) = match trimmed.find("://") {
            Some(pos) => {
                let scheme = match trimmed[..pos].to_ascii_lowercase().as_str() {
                    "ldap" => Scheme::Plain,
                    "ldaps" => Scheme::Tls,
                    _ => return Err(invalid("scheme should be ldap:// or ldaps://")),
                };
                (scheme, &trimmed[pos + 3..])
            }
            None => (Scheme::Plain, trimmed),
        };
        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return Err(invalid("host name is empty"));
        }
        if rest.contains('/') {
            return Err(invalid("unexpected path after host name"));
        }
        let host = match rest.parse::<Ipv6Addr>() {
            Ok(v6) => Host::Ipv6(v6),
            Err(_) => Host::parse(rest).map_err(|e| invalid(&e.to_string()))?,
        };
        // Host::parse also accepts shorthand like "1234" or "0x7f.1" as IPv4
        if let Host::Ipv4(_) = host {
            if rest.parse::<Ipv4Addr>().is_err() {
                return Err(invalid("IPv4 address should be in dotted-quad form"));
            }
        }
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }
        Ok(ConnectionIdentity {
            scheme,
            host,
            port,
            bind_dn: bind_dn.to_owned(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> String {
        self.host.to_string()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// LDAP URL of the server, without the bind DN.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} as {}", self.url(), self.bind_dn)
    }
}

/// Server certificate checking for `ldaps://` connections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsTrust {
    /// Verify the certificate chain and the host name.
    Verify,
    /// Accept any certificate for any host name.
    ///
    /// __Note__: this disables server authentication entirely. It exists for
    /// test directories with self-signed or expired certificates.
    TrustAll,
}

impl Default for TlsTrust {
    fn default() -> Self {
        TlsTrust::Verify
    }
}

impl TlsTrust {
    /// Build a TLS connector applying this policy.
    pub fn connector(&self) -> std::result::Result<TlsConnector, native_tls::Error> {
        let mut builder = TlsConnector::builder();
        if *self == TlsTrust::TrustAll {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        builder.build()
    }
}

/// Additional parameters for opening a directory session.
#[derive(Clone, Debug, Default)]
pub struct SessionSettings {
    conn_timeout: Option<Duration>,
    op_timeout: Option<Duration>,
    tls_trust: TlsTrust,
}

impl SessionSettings {
    /// Create an instance of the structure with default values.
    pub fn new() -> Self {
        SessionSettings {
            ..Default::default()
        }
    }

    /// Set the connection timeout. By default, the client library's is used.
    pub fn set_conn_timeout(mut self, timeout: Duration) -> Self {
        self.conn_timeout = Some(timeout);
        self
    }

    /// Set the timeout applied to every Bind and Search.
    pub fn set_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    /// Set the certificate checking policy for TLS connections.
    pub fn set_tls_trust(mut self, trust: TlsTrust) -> Self {
        self.tls_trust = trust;
        self
    }

    pub fn conn_timeout(&self) -> Option<Duration> {
        self.conn_timeout
    }

    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout
    }

    pub fn tls_trust(&self) -> TlsTrust {
        self.tls_trust
    }

    /// Apply a single `key`/`value` option, as given in library import arguments.
    ///
    /// Recognized keys are `conn_timeout` and `op_timeout` (seconds), and
    /// `tls_trust` (`verify` or `trust_all`).
    pub fn set_option(self, key: &str, value: &str) -> Result<Self> {
        let invalid = |reason: String| LdapKeywordError::InvalidSetting {
            key: key.to_owned(),
            reason,
        };
        let secs = || match value.trim().parse::<u64>() {
            Ok(0) => Err(invalid("timeout must be at least one second".to_owned())),
            Ok(n) => Ok(Duration::from_secs(n)),
            Err(e) => Err(invalid(format!("'{}' is not a number of seconds: {}", value, e))),
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "conn_timeout" => Ok(self.set_conn_timeout(secs()?)),
            "op_timeout" => Ok(self.set_op_timeout(secs()?)),
            "tls_trust" => {
                let trust = match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
                    "verify" => TlsTrust::Verify,
                    "trust_all" => TlsTrust::TrustAll,
                    _ => return Err(invalid(format!("'{}' should be verify or trust_all", value))),
                };
                Ok(self.set_tls_trust(trust))
            }
            _ => Err(invalid("unknown setting".to_owned())),
        }
    }
}
