//! Idempotency hash for semantic events
//!
//! `sha256("{event_type}|{workspace_id}|{sorted ids, comma joined}|{sha256(canonical payload)}")`
//!
//! The payload is digested separately so the outer input stays small and
//! fixed in shape no matter how large the payload is.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Compute the unique hash identifying a semantic event.
///
/// Contribution order does not matter (ids are sorted), and neither does
/// the key order of any object inside `payload`.
pub fn unique_hash(event_type: &str, workspace_id: i64, raw_event_ids: &[i64], payload: &Value) -> String {
    let mut ids = raw_event_ids.to_vec();
    ids.sort_unstable();
    let ids = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");

    let payload_digest = hex::encode(Sha256::digest(canonical_json(payload).as_bytes()));
    let combined = format!("{}|{}|{}|{}", event_type, workspace_id, ids, payload_digest);

    hex::encode(Sha256::digest(combined.as_bytes()))
}

/// Serialize `value` with object keys sorted and no insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Null, Bool and Number serialize identically in every key order
        scalar => {
            let _ = write!(out, "{}", scalar);
        }
    }
}

/// JSON string with everything outside printable ASCII escaped as `\uXXXX`
/// (UTF-16 units, lowercase hex), matching hashes already stored by
/// producers that write ASCII-only JSON.
fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_event_id_order_does_not_matter() {
        let payload = json!({ "a": 1 });
        assert_eq!(
            unique_hash("note_version.created", 4, &[2, 1], &payload),
            unique_hash("note_version.created", 4, &[1, 2], &payload),
        );
    }

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b": 2, "a": {"y": [1, 2], "x": null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": null, "y": [1, 2]}, "b": 2}"#).unwrap();
        assert_eq!(unique_hash("t", 1, &[9], &a), unique_hash("t", 1, &[9], &b));
    }

    #[test]
    fn every_component_changes_the_hash() {
        let payload = json!({ "text": "x" });
        let base = unique_hash("t", 1, &[1], &payload);

        assert_ne!(base, unique_hash("u", 1, &[1], &payload));
        assert_ne!(base, unique_hash("t", 2, &[1], &payload));
        assert_ne!(base, unique_hash("t", 1, &[1, 2], &payload));
        assert_ne!(base, unique_hash("t", 1, &[1], &json!({ "text": "y" })));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = unique_hash("t", 1, &[1], &json!({}));
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn canonical_form_is_compact_and_sorted() {
        let value = json!({ "z": "q\"uote", "a": [true, null, 1.5], "m": { "k": 1 } });
        assert_eq!(
            canonical_json(&value),
            r#"{"a":[true,null,1.5],"m":{"k":1},"z":"q\"uote"}"#
        );
    }

    #[test]
    fn non_ascii_text_is_escaped() {
        let value = json!({ "text": "café ☕ 😀", "n": 1 });
        assert_eq!(
            canonical_json(&value),
            r#"{"n":1,"text":"caf\u00e9 \u2615 \ud83d\ude00"}"#
        );
        assert_eq!(canonical_json(&json!("a\u{7f}\u{01}\u{08}\u{0c}\\/")), r#""a\u007f\u0001\b\f\\/""#);

        // Digest of the same payload as written by an ASCII-only JSON producer
        assert_eq!(
            unique_hash("note_version.created", 7, &[2, 1], &value),
            "a4266ab1ef9f7cdd1a8e14a5b52047a0bd855c80acfd83f940d0e79d719596ae"
        );
    }

    #[test]
    fn known_digest_is_stable() {
        // sha256("t|1|1|" + sha256("{}")) pinned so accidental format changes show up
        let inner = hex::encode(Sha256::digest(b"{}"));
        let expected = hex::encode(Sha256::digest(format!("t|1|1|{}", inner).as_bytes()));
        assert_eq!(unique_hash("t", 1, &[1], &json!({})), expected);
    }
}
