//! Property tests for domain name and backend parsing.

use proptest::prelude::*;
use sitekeeper::domain::value_objects::{BackendAddress, BackendPort, DomainName};

fn label() -> impl Strategy<Value = String> {
    "[a-z0-9]([a-z0-9-]{0,20}[a-z0-9])?"
}

fn hostname() -> impl Strategy<Value = String> {
    prop::collection::vec(label(), 2..5).prop_map(|labels| labels.join("."))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Parsing never panics on arbitrary input
    #[test]
    fn property_domain_parse_never_panics(raw in any::<String>()) {
        let _ = DomainName::parse(&raw);
        let _ = BackendAddress::parse(&raw);
    }

    /// PROPERTY: Well-formed hostnames parse and come back lowercased
    #[test]
    fn property_valid_hostnames_parse(name in hostname()) {
        let parsed = DomainName::parse(&name.to_uppercase()).unwrap();
        prop_assert_eq!(parsed.as_str(), name.as_str());
        prop_assert!(!parsed.is_wildcard());
        prop_assert_eq!(parsed.base(), name.as_str());
    }

    /// PROPERTY: Parsing is idempotent
    #[test]
    fn property_parse_is_idempotent(raw in "[A-Za-z0-9.*_-]{0,40}") {
        if let Ok(once) = DomainName::parse(&raw) {
            let twice = DomainName::parse(once.as_str()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }

    /// PROPERTY: Wildcards keep their base name and get a file-safe stem
    #[test]
    fn property_wildcard_base_and_stem(name in hostname()) {
        let wildcard = DomainName::parse(&format!("*.{}", name)).unwrap();
        prop_assert!(wildcard.is_wildcard());
        prop_assert_eq!(wildcard.base(), name.as_str());
        prop_assert!(!wildcard.file_stem().contains('*'));
        prop_assert!(!wildcard.file_stem().contains('/'));
    }

    /// PROPERTY: Ports outside 1..=65535 are rejected, everything inside accepted
    #[test]
    fn property_port_range(port in any::<u32>()) {
        let parsed = BackendPort::new(port);
        prop_assert_eq!(parsed.is_ok(), (1..=65535).contains(&port));
        if let Ok(p) = parsed {
            prop_assert_eq!(u32::from(p.get()), port);
        }
    }
}
