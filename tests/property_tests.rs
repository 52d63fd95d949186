// Property tests for SSE framing and cache key derivation
// Author: kelexine (https://github.com/kelexine)

use gemflow::cache::CacheKey;
use gemflow::streaming::{SseDecoder, SseEvent};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn decode_whole(bytes: &[u8]) -> Vec<SseEvent> {
    let mut decoder = SseDecoder::new();
    let mut events = decoder.push(bytes);
    events.extend(decoder.finish());
    events
}

fn decode_split(bytes: &[u8], cuts: &[usize]) -> Vec<SseEvent> {
    let mut decoder = SseDecoder::new();
    let mut events = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        let cut = cut.min(bytes.len()).max(start);
        events.extend(decoder.push(&bytes[start..cut]));
        start = cut;
    }
    events.extend(decoder.push(&bytes[start..]));
    events.extend(decoder.finish());
    events
}

fn event_strategy() -> impl Strategy<Value = String> {
    let data = prop::collection::vec("[a-zA-Z0-9 {}\":,é漢]{0,20}", 1..3);
    (prop::option::of("[a-z]{1,8}"), data, any::<bool>()).prop_map(|(kind, lines, crlf)| {
        let eol = if crlf { "\r\n" } else { "\n" };
        let mut event = String::new();
        if let Some(kind) = kind {
            event.push_str(&format!("event: {}{}", kind, eol));
        }
        for line in lines {
            event.push_str(&format!("data: {}{}", line, eol));
        }
        event.push_str(eol);
        event
    })
}

proptest! {
    #[test]
    fn sse_decoding_ignores_read_boundaries(
        events in prop::collection::vec(event_strategy(), 1..6),
        mut cuts in prop::collection::vec(0usize..400, 0..12),
    ) {
        let body: String = events.concat();
        let bytes = body.as_bytes();
        cuts.sort_unstable();

        prop_assert_eq!(decode_whole(bytes), decode_split(bytes, &cuts));
    }

    #[test]
    fn sse_decoding_byte_at_a_time(events in prop::collection::vec(event_strategy(), 1..4)) {
        let body: String = events.concat();
        let bytes = body.as_bytes();
        let cuts: Vec<usize> = (1..bytes.len()).collect();

        prop_assert_eq!(decode_whole(bytes), decode_split(bytes, &cuts));
    }

    #[test]
    fn cache_key_ignores_object_field_order(
        fields in prop::collection::btree_map("[a-z]{1,6}", any::<i32>(), 1..8),
    ) {
        let forward: Map<String, Value> = fields.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
        let backward: Map<String, Value> = fields.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();

        let a = json!({"model": "gemini-2.5-flash", "generationConfig": Value::Object(forward)});
        let b = json!({"generationConfig": Value::Object(backward), "model": "gemini-2.5-flash"});
        prop_assert_eq!(CacheKey::from_json(&a), CacheKey::from_json(&b));
    }

    #[test]
    fn cache_key_sensitive_to_temperature(t1 in 0u32..200, t2 in 0u32..200) {
        prop_assume!(t1 != t2);
        let key = |t: u32| CacheKey::from_json(&json!({
            "model": "gemini-2.5-flash",
            "generationConfig": {"temperature": t as f64 / 100.0}
        }));
        prop_assert_ne!(key(t1), key(t2));
    }
}
