#![no_main]

use libfuzzer_sys::fuzz_target;
use shaper::config::{flatten_json, parse_setting};
use std::collections::HashMap;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Typed reads must fail cleanly on arbitrary text
    let _ = parse_setting::<i64>(text);
    let _ = parse_setting::<f64>(text);
    let _ = parse_setting::<bool>(text);
    let _ = parse_setting::<Option<u32>>(text);
    let _ = parse_setting::<Vec<String>>(text);
    let _ = parse_setting::<HashMap<String, i32>>(text);
    assert_eq!(parse_setting::<String>(text).ok().as_deref(), Some(text));

    if let Ok(serde_json::Value::Object(root)) = serde_json::from_str::<serde_json::Value>(text) {
        let flat = flatten_json(&root);
        // Only a root-level empty key can flatten to an empty path
        for key in flat.keys() {
            assert!(!key.is_empty() || root.contains_key(""));
        }
    }
});
