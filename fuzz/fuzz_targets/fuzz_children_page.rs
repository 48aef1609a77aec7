//! Fuzz target for children listing pages.

#![no_main]

use floodgate_sync::store::parse_children_page;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(page) = parse_children_page(data) {
        for entry in &page.entries {
            if entry.is_folder() {
                assert!(entry.mime_type().is_none());
            }
        }
    }
});
