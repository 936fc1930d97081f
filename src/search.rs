use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::result::{LdapKeywordError, Result};

/// Possible values for search scope.
///
/// Parsing is case-insensitive and accepts both the short names used in
/// test data (`BASE`, `ONE`, `SUB`) and the long ones (`ONELEVEL`,
/// `ONE_LEVEL`, `ONE-LEVEL`, `SUBTREE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object; search only the object named in the base DN.
    Base,
    /// Search the objects immediately below the base DN.
    OneLevel,
    /// Search the object named in the base DN and the whole subtree below it.
    Subtree,
}

impl FromStr for SearchScope {
    type Err = LdapKeywordError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASE" => Ok(SearchScope::Base),
            "ONE" | "ONELEVEL" | "ONE_LEVEL" | "ONE-LEVEL" => Ok(SearchScope::OneLevel),
            "SUB" | "SUBTREE" => Ok(SearchScope::Subtree),
            _ => Err(LdapKeywordError::InvalidScope(s.to_owned())),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            SearchScope::Base => "BASE",
            SearchScope::OneLevel => "ONE",
            SearchScope::Subtree => "SUB",
        })
    }
}

impl From<SearchScope> for ldap3::Scope {
    fn from(scope: SearchScope) -> ldap3::Scope {
        match scope {
            SearchScope::Base => ldap3::Scope::Base,
            SearchScope::OneLevel => ldap3::Scope::OneLevel,
            SearchScope::Subtree => ldap3::Scope::Subtree,
        }
    }
}

/// Parameters of a single Search operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: SearchScope,
    pub filter: String,
    /// Requested attribute names. Empty means all user attributes.
    pub attrs: Vec<String>,
}

impl SearchRequest {
    /// Create a request for all attributes.
    pub fn new(base: &str, scope: SearchScope, filter: &str) -> Self {
        SearchRequest {
            base: base.to_owned(),
            scope,
            filter: filter.to_owned(),
            attrs: vec![],
        }
    }

    /// Restrict the returned attributes to the given names.
    pub fn attrs<S: AsRef<str>>(mut self, attrs: &[S]) -> Self {
        self.attrs = attrs.iter().map(|a| a.as_ref().to_owned()).collect();
        self
    }
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "base '{}', scope '{}', filter '{}' and attributes '",
            self.base, self.scope, self.filter
        )?;
        if self.attrs.is_empty() {
            f.write_str("all")?;
        } else {
            f.write_str(&self.attrs.join(", "))?;
        }
        f.write_str("'")
    }
}

/// Expected number of entries returned by a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryCount {
    Exactly(usize),
    AtLeastOne,
    Zero,
}

impl EntryCount {
    pub fn matches(&self, n: usize) -> bool {
        match *self {
            EntryCount::Exactly(want) => n == want,
            EntryCount::AtLeastOne => n > 0,
            EntryCount::Zero => n == 0,
        }
    }
}

impl fmt::Display for EntryCount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EntryCount::Exactly(n) => write!(f, "exactly {}", n),
            EntryCount::AtLeastOne => f.write_str("at least one"),
            EntryCount::Zero => f.write_str("none"),
        }
    }
}

/// Directory entry returned by a search.
///
/// Attributes are kept in the order the client delivered them, with the
/// names exactly as the server sent them, options included. Values of a
/// multi-valued attribute keep their order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entry {
    pub dn: String,
    pub attrs: Vec<(String, Vec<String>)>,
}

/// Attribute name without its options: `cn;lang-en` becomes `cn`.
pub fn base_name(attr: &str) -> &str {
    attr.split(';').next().unwrap_or(attr)
}

impl Entry {
    pub fn new(dn: &str) -> Self {
        Entry {
            dn: dn.to_owned(),
            attrs: vec![],
        }
    }

    /// Append an attribute with its values.
    pub fn attr<S: AsRef<str>>(mut self, name: &str, values: &[S]) -> Self {
        self.attrs.push((
            name.to_owned(),
            values.iter().map(|v| v.as_ref().to_owned()).collect(),
        ));
        self
    }

    /// Map attribute base names to their values.
    ///
    /// Attributes which differ only in options are merged under the base
    /// name, values concatenated in delivery order.
    pub fn to_mapping(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, values) in &self.attrs {
            map.entry(base_name(name).to_owned())
                .or_default()
                .extend(values.iter().cloned());
        }
        map
    }

    /// All values of the attribute, matched by base name case-insensitively.
    ///
    /// Returns `None` if the entry has no such attribute.
    pub fn values(&self, attr: &str) -> Option<Vec<String>> {
        let wanted = base_name(attr);
        let mut found = None;
        for (name, values) in &self.attrs {
            if base_name(name).eq_ignore_ascii_case(wanted) {
                found
                    .get_or_insert_with(Vec::new)
                    .extend(values.iter().cloned());
            }
        }
        found
    }

    /// First value of the attribute, or a `MissingAttribute` error.
    pub fn first_value(&self, attr: &str) -> Result<String> {
        self.values(attr)
            .and_then(|values| values.into_iter().next())
            .ok_or_else(|| LdapKeywordError::MissingAttribute {
                attribute: attr.to_owned(),
                dn: self.dn.clone(),
            })
    }
}

/// Entries returned by a Search, together with the request which produced them.
#[derive(Clone, Debug)]
pub struct SearchResult {
    pub request: SearchRequest,
    pub entries: Vec<Entry>,
}

impl SearchResult {
    /// Check the number of entries against the expectation, returning the
    /// entries on success.
    pub fn expect_count(self, expected: EntryCount) -> Result<Vec<Entry>> {
        let actual = self.entries.len();
        if expected.matches(actual) {
            Ok(self.entries)
        } else {
            Err(LdapKeywordError::UnexpectedEntryCount {
                expected,
                actual,
                request: self.request,
            })
        }
    }

    /// Return the only entry, failing unless there's exactly one.
    pub fn single(self) -> Result<Entry> {
        let mut entries = self.expect_count(EntryCount::Exactly(1))?;
        Ok(entries.remove(0))
    }
}
