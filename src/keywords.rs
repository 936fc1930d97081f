//! Keyword dispatcher for the host test framework.
//!
//! The framework knows keywords only by name and calls them with string
//! arguments. [`LdapLibrary`](struct.LdapLibrary.html) lists the available
//! keywords with their argument names and documentation, converts the string
//! arguments into typed session calls, and hands back a
//! [`KeywordValue`](enum.KeywordValue.html).
//!
//! Keyword names are matched the way the framework matches them: case
//! doesn't matter, and spaces and underscores are ignored, so
//! `Connect To Ldap` and `connect_to_ldap` name the same keyword.
//!
//! ```rust,no_run
//! # use ldap_keywords::{LdapLibrary, KeywordValue};
//! # fn main() -> ldap_keywords::result::Result<()> {
//! let mut lib = LdapLibrary::new()?;
//! lib.run_keyword("Connect To Ldap", &["localhost", "2389", "cn=admin,o=mydomain,c=com", "secret"])?;
//! let mail = lib.run_keyword(
//!     "Get Single Attribute Value From Ldap Entry",
//!     &["o=mydomain,c=com", "SUB", "(uid=john)", "mail"],
//! )?;
//! assert_eq!(mail, KeywordValue::String("john@mydomain.com".to_owned()));
//! lib.run_keyword::<&str>("Disconnect From Ldap", &[])?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use crate::client::Connector;
use crate::conn::SessionSettings;
use crate::ldap::Ldap3Connector;
use crate::result::{LdapKeywordError, Result};
use crate::search::{SearchRequest, SearchScope};
use crate::sync::LdapSession;

/// Library version reported to the framework.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

const INTRO: &str = "\
Library for verifying the contents of an LDAP directory.

Open a connection with `Connect To Ldap`, then use the search keywords to \
check that entries exist or to read their attributes. Every search takes a \
base DN, a scope (`BASE`, `ONE` or `SUB`) and a filter. A single connection \
is kept open until `Disconnect From Ldap`, or until `Connect To Ldap` is \
called for a different server or bind DN.";

const INIT: &str = "\
Library import arguments are `name=value` pairs:

| conn_timeout | Seconds to wait for the connection to be established. |
| op_timeout   | Seconds to wait for each bind or search. |
| tls_trust    | `verify` (default) or `trust_all`. With `trust_all`, any server certificate is accepted on `ldaps://` connections. |";

/// Value returned by a keyword.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeywordValue {
    None,
    String(String),
    List(Vec<String>),
    Map(BTreeMap<String, Vec<String>>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Keyword {
    Connect,
    Disconnect,
    SingleEntry,
    Entries,
    NoEntries,
    GetEntry,
    SingleValue,
    Values,
}

struct KeywordSpec {
    keyword: Keyword,
    name: &'static str,
    args: &'static [&'static str],
    doc: &'static str,
}

const SEARCH_ARGS: &[&str] = &["baseDn", "scope", "filter"];
const ATTRIBUTE_ARGS: &[&str] = &["baseDn", "scope", "filter", "attribute"];

const KEYWORDS: &[KeywordSpec] = &[
    KeywordSpec {
        keyword: Keyword::Connect,
        name: "Connect To Ldap",
        args: &["host", "port", "bindDN", "password"],
        doc: "Makes a connection to the specified LDAP server and binds as `bindDN`. \
              Prefix `host` with `ldaps://` to make a TLS connection.\n\n\
              If a connection to the same server with the same bind DN is already open, nothing is done.",
    },
    KeywordSpec {
        keyword: Keyword::Disconnect,
        name: "Disconnect From Ldap",
        args: &[],
        doc: "Disconnects from the LDAP server.",
    },
    KeywordSpec {
        keyword: Keyword::SingleEntry,
        name: "Ldap Search Should Return Single Entry",
        args: SEARCH_ARGS,
        doc: "Fails if the LDAP search does not return exactly one entry.",
    },
    KeywordSpec {
        keyword: Keyword::Entries,
        name: "Ldap Search Should Return Entries",
        args: SEARCH_ARGS,
        doc: "Fails if the LDAP search does not return any entries.",
    },
    KeywordSpec {
        keyword: Keyword::NoEntries,
        name: "Ldap Search Should Not Return Entries",
        args: SEARCH_ARGS,
        doc: "Fails if the LDAP search returns any entries.",
    },
    KeywordSpec {
        keyword: Keyword::GetEntry,
        name: "Get Ldap Entry",
        args: &["baseDn", "scope", "filter", "*attributes"],
        doc: "Returns the attributes of a single LDAP entry as a dictionary of value lists.\n\n\
              If attribute names are given, only those attributes are returned, otherwise all of them.\n\n\
              Example:\n\
              | ${entry}= | Get Ldap Entry | o=mydomain,c=com | SUB | uid=john | uid | mailAlternateAddress |\n\
              | @{uid}= | Get From Dictionary | ${entry} | uid |\n\
              | Should Be Equal | @{uid}[0] | john |\n\
              | @{alias}= | Get From Dictionary | ${entry} | mailAlternateAddress |\n\
              | Length Should Be | ${alias} | 3 |",
    },
    KeywordSpec {
        keyword: Keyword::SingleValue,
        name: "Get Single Attribute Value From Ldap Entry",
        args: ATTRIBUTE_ARGS,
        doc: "Returns the first value of `attribute` in the entry found by the search. \
              The search must return a single entry, and the entry must have the attribute.",
    },
    KeywordSpec {
        keyword: Keyword::Values,
        name: "Get Attribute Values From Ldap Entry",
        args: ATTRIBUTE_ARGS,
        doc: "Returns all values of `attribute` in the entry found by the search, as a list. \
              The search must return a single entry, and the entry must have the attribute.",
    },
];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != ' ' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn find(name: &str) -> Option<&'static KeywordSpec> {
    let wanted = normalize(name);
    KEYWORDS.iter().find(|spec| normalize(spec.name) == wanted)
}

/// Build session settings from `name=value` import arguments.
pub fn settings_from_args<S: AsRef<str>>(args: &[S]) -> Result<SessionSettings> {
    args.iter()
        .try_fold(SessionSettings::new(), |settings, arg| {
            let arg = arg.as_ref();
            match arg.split_once('=') {
                Some((key, value)) => settings.set_option(key, value),
                None => Err(LdapKeywordError::InvalidSetting {
                    key: arg.to_owned(),
                    reason: "expected name=value".to_owned(),
                }),
            }
        })
}

/// Keyword library handle.
pub struct LdapLibrary<C: Connector = Ldap3Connector> {
    session: LdapSession<C>,
}

impl LdapLibrary<Ldap3Connector> {
    /// Library using the `ldap3` client and default settings.
    pub fn new() -> Result<Self> {
        Ok(LdapLibrary {
            session: LdapSession::new()?,
        })
    }

    /// Library using the `ldap3` client, configured from import arguments.
    pub fn with_import_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        Ok(LdapLibrary {
            session: LdapSession::with_settings(settings_from_args(args)?)?,
        })
    }
}

impl<C: Connector> LdapLibrary<C> {
    pub fn with_session(session: LdapSession<C>) -> Self {
        LdapLibrary { session }
    }

    pub fn session(&mut self) -> &mut LdapSession<C> {
        &mut self.session
    }

    /// Names of all keywords, in documentation order.
    pub fn keyword_names(&self) -> Vec<&'static str> {
        KEYWORDS.iter().map(|spec| spec.name).collect()
    }

    /// Argument names of a keyword. A leading `*` marks a variable-length tail.
    pub fn keyword_arguments(&self, name: &str) -> Option<&'static [&'static str]> {
        find(name).map(|spec| spec.args)
    }

    /// Documentation of a keyword, or of the library itself for `__intro__`
    /// and `__init__`.
    pub fn keyword_documentation(&self, name: &str) -> Option<&'static str> {
        match name {
            "__intro__" => Some(INTRO),
            "__init__" => Some(INIT),
            _ => find(name).map(|spec| spec.doc),
        }
    }

    /// Run a keyword by name.
    pub fn run_keyword<S: AsRef<str>>(&mut self, name: &str, args: &[S]) -> Result<KeywordValue> {
        let spec = find(name).ok_or_else(|| LdapKeywordError::UnknownKeyword(name.to_owned()))?;
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        check_arity(spec, &args)?;
        let session = &mut self.session;
        match spec.keyword {
            Keyword::Connect => {
                let port = args[1].trim().parse::<u16>().map_err(|_| {
                    LdapKeywordError::KeywordArguments {
                        keyword: spec.name.to_owned(),
                        reason: format!("got '{}' for port, expected a number from 1 to 65535", args[1]),
                    }
                })?;
                session.connect(args[0], port, args[2], args[3])?;
                Ok(KeywordValue::None)
            }
            Keyword::Disconnect => {
                session.disconnect();
                Ok(KeywordValue::None)
            }
            Keyword::SingleEntry => {
                session.require_single_entry(search_request(&args)?)?;
                Ok(KeywordValue::None)
            }
            Keyword::Entries => {
                session.require_some_entries(search_request(&args)?)?;
                Ok(KeywordValue::None)
            }
            Keyword::NoEntries => {
                session.require_no_entries(search_request(&args)?)?;
                Ok(KeywordValue::None)
            }
            Keyword::GetEntry => {
                let request = search_request(&args)?.attrs(&args[3..]);
                Ok(KeywordValue::Map(session.entry_as_mapping(request)?))
            }
            Keyword::SingleValue => {
                let value = session.single_attribute_value(search_request(&args)?, args[3])?;
                Ok(KeywordValue::String(value))
            }
            Keyword::Values => {
                let values = session.attribute_values(search_request(&args)?, args[3])?;
                Ok(KeywordValue::List(values))
            }
        }
    }
}

fn check_arity(spec: &KeywordSpec, args: &[&str]) -> Result<()> {
    let varargs = spec.args.last().map(|a| a.starts_with('*')).unwrap_or(false);
    let fixed = if varargs { spec.args.len() - 1 } else { spec.args.len() };
    let ok = if varargs { args.len() >= fixed } else { args.len() == fixed };
    if ok {
        return Ok(());
    }
    let reason = if varargs {
        format!("expected {} or more arguments, got {}", fixed, args.len())
    } else {
        format!("expected {} arguments, got {}", fixed, args.len())
    };
    Err(LdapKeywordError::KeywordArguments {
        keyword: spec.name.to_owned(),
        reason,
    })
}

// Scope is parsed first, so a bad scope is reported before the session is consulted.
fn search_request(args: &[&str]) -> Result<SearchRequest> {
    let scope = args[1].parse::<SearchScope>()?;
    Ok(SearchRequest::new(args[0], scope, args[2]))
}
