#![no_main]

use libfuzzer_sys::fuzz_target;
use vigil_debug::{parse_comparison, validate_condition};

fn utf8_prefix(data: &[u8]) -> Option<&str> {
    let capped = &data[..data.len().min(4096)];
    std::str::from_utf8(capped).ok()
}

// The goal is simply "never panic / never hang" on malformed input, and
// a parse that succeeds must produce a usable comparison.
fuzz_target!(|data: &[u8]| {
    let Some(text) = utf8_prefix(data) else {
        return;
    };

    if let Ok(parsed) = parse_comparison(text) {
        assert!(!parsed.lhs.is_empty());
        assert!(
            parsed
                .lhs
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_'),
            "accepted lhs {:?}",
            parsed.lhs
        );
        // Anything the parser accepts, set-time validation accepts too.
        validate_condition(text).unwrap();
    }

    let _ = validate_condition(text);
});
