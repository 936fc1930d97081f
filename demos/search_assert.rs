use std::time::Duration;

use ldap_keywords::{LdapSession, SearchRequest, SearchScope, SessionSettings};

fn main() {
    env_logger::init();
    let settings = SessionSettings::new().set_op_timeout(Duration::from_secs(10));
    let mut session = LdapSession::with_settings(settings).expect("session");
    session
        .connect("localhost", 2389, "", "")
        .expect("anonymous connection");
    let places = SearchRequest::new(
        "ou=Places,dc=example,dc=org",
        SearchScope::Subtree,
        "(&(objectClass=locality)(l=ma*))",
    );
    match session.require_some_entries(places) {
        Ok(()) => println!("found some places"),
        Err(e) => println!("{}", e),
    }
    session.disconnect();
}
