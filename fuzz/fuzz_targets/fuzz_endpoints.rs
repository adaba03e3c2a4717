//! Fuzz testing for endpoint configuration parsing and path lookup.
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_endpoints -- -max_total_time=60
//! ```
//!
//! Checks that arbitrary YAML never panics the loader, that normalization
//! is idempotent, and that every key of a successfully loaded table can be
//! looked up again with or without a trailing slash.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use get_to_post::endpoints::{EndpointStore, normalize_path};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    yaml: &'a str,
    path: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let once = normalize_path(input.path);
    assert_eq!(normalize_path(once), once);
    assert!(!once.ends_with('/'));

    if let Ok(store) = EndpointStore::from_yaml_str(input.yaml) {
        let _ = store.lookup(input.path);
        for path in store.paths() {
            assert!(store.lookup(path).is_some());
            assert!(store.lookup(&format!("{path}/")).is_some());
        }
    }
});
