//! Fuzz target for `$batch` response parsing.
//!
//! Arbitrary bodies must decode or fail with an error, never panic.

#![no_main]

use floodgate_sync::store::parse_batch_response;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(items) = parse_batch_response(data) {
        for item in items {
            // Ids are opaque strings; parsing them must be total too.
            let _ = item.id.trim().parse::<usize>();
        }
    }
});
