//! Fuzz target for page URL to document path mapping.
//!
//! Mapping must never panic, and the child path must keep the file name.

#![no_main]

use floodgate_sync::project::{child_doc_path, doc_path_from_url, split_path};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (&str, &str)| {
    let (url, folder) = data;

    let doc = doc_path_from_url(url);
    assert!(doc.ends_with(".docx") || doc.ends_with(".xlsx"));

    let child = child_doc_path(&doc, folder);
    assert_eq!(split_path(&doc).1, split_path(&child).1);
});
