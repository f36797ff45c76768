#![no_main]

use libfuzzer_sys::fuzz_target;
use sitekeeper::domain::value_objects::{BackendAddress, DomainName};

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        if let Ok(name) = DomainName::parse(raw) {
            // Accepted names must re-parse to themselves
            assert_eq!(DomainName::parse(name.as_str()).ok(), Some(name.clone()));
            assert!(!name.file_stem().contains('/'));
        }
        let _ = BackendAddress::parse(raw);
    }
});
