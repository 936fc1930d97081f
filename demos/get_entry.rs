// Demonstrates:
//
// 1. Driving the library through keyword names, as a test framework would;
// 2. Reading a whole entry as a map of value lists;
// 3. Accepting any certificate on an ldaps:// connection (test servers only).

use ldap_keywords::result::Result;
use ldap_keywords::{KeywordValue, LdapLibrary};

fn main() -> Result<()> {
    env_logger::init();
    let mut lib = LdapLibrary::with_import_args(&["tls_trust=trust_all", "conn_timeout=5"])?;
    lib.run_keyword(
        "Connect To Ldap",
        &["ldaps://localhost", "2636", "cn=admin,dc=example,dc=org", "secret"],
    )?;
    let entry = lib.run_keyword(
        "Get Ldap Entry",
        &["ou=People,dc=example,dc=org", "SUB", "(uid=john)", "uid", "mail"],
    )?;
    if let KeywordValue::Map(attrs) = entry {
        for (name, values) in attrs {
            println!("{}: {:?}", name, values);
        }
    }
    lib.run_keyword::<&str>("Disconnect From Ldap", &[])?;
    Ok(())
}
