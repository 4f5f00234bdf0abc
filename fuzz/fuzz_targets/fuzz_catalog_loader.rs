#![no_main]

use libfuzzer_sys::fuzz_target;
use phasegate::catalog::RuleCatalog;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the catalog loader; malformed input
    // is a parse or validation error, nothing more.
    if let Ok(yaml) = std::str::from_utf8(data) {
        let _ = RuleCatalog::from_yaml(yaml);
    }
});
