#![no_main]

use libfuzzer_sys::fuzz_target;
use sitekeeper::domain::ports::RegistryStore;
use sitekeeper::infrastructure::JsonRegistryStore;

fuzz_target!(|data: &[u8]| {
    // Decoding an untrusted registry document (e.g. from a backup) should never panic
    let store = JsonRegistryStore::with_path("/nonexistent/registry.json");
    let _ = store.import(data);
});
