//! lexecon-codec
//!
//! Canonical serialization: the total, deterministic function
//! `canonical(value) → bytes` that every hash and signature in the
//! gateway operates over. Two structurally equal values always produce
//! identical bytes regardless of how their objects were assembled.
//!
//! Canonical form is RFC 8259 JSON with:
//!   - object keys sorted lexicographically by Unicode code point
//!   - no insignificant whitespace
//!   - integers in minimal decimal form; non-integer numbers in the
//!     shortest round-trippable decimal form
//!   - only the escapes RFC 8259 requires (`"`, `\`, controls < 0x20),
//!     with the short forms \b \f \n \r \t where they exist
//!   - arrays in declared order
//!
//! Binary values never appear directly; the data model represents them
//! as lowercase hex strings before they reach the codec.

use serde::Serialize;
use serde_json::Value;

/// Serialize any value to canonical bytes via its JSON representation.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let v = serde_json::to_value(value)?;
    Ok(canonical(&v))
}

/// Produce the canonical byte encoding of a JSON value.
pub fn canonical(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    write_value(value, &mut out);
    out
}

/// Parse bytes back into a JSON value. Accepts any valid JSON; for bytes
/// this codec emitted, `canonical(parse(bytes)) == bytes`.
pub fn parse(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(bytes)
}

fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        // serde_json prints u64/i64 in minimal decimal form and f64 in the
        // shortest form that round-trips (ryu), both deterministic.
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            // String comparison is byte-wise over UTF-8, which orders keys
            // by Unicode code point.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_value(&map[key.as_str()], out);
            }
            out.push(b'}');
        }
    }
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0c}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted() {
        let v = json!({"zebra": 1, "alpha": 2, "mid": {"b": 1, "a": 2}});
        assert_eq!(
            canonical(&v),
            br#"{"alpha":2,"mid":{"a":2,"b":1},"zebra":1}"#
        );
    }

    #[test]
    fn no_whitespace_and_declared_array_order() {
        let v = json!({"list": [3, 1, 2]});
        assert_eq!(canonical(&v), br#"{"list":[3,1,2]}"#);
    }

    #[test]
    fn integers_are_minimal() {
        assert_eq!(canonical(&json!(0)), b"0");
        assert_eq!(canonical(&json!(-7)), b"-7");
        assert_eq!(canonical(&json!(18446744073709551615u64)), b"18446744073709551615");
    }

    #[test]
    fn floats_use_shortest_form() {
        assert_eq!(canonical(&json!(25.0001)), b"25.0001");
        assert_eq!(canonical(&json!(0.5)), b"0.5");
    }

    #[test]
    fn string_escapes_are_exactly_rfc8259() {
        let v = json!("a\"b\\c\nd\te\u{01}f");
        assert_eq!(canonical(&v), b"\"a\\\"b\\\\c\\nd\\te\\u0001f\"");
    }

    #[test]
    fn non_ascii_is_raw_utf8() {
        let v = json!("héllo ✓");
        assert_eq!(canonical(&v), "\"héllo ✓\"".as_bytes());
    }

    #[test]
    fn parse_round_trips_emitted_bytes() {
        let v = json!({"b": [1, {"y": null, "x": true}], "a": "s"});
        let bytes = canonical(&v);
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed, v);
        assert_eq!(canonical(&parsed), bytes);
    }

    #[test]
    fn struct_field_order_does_not_matter() {
        #[derive(Serialize)]
        struct Forward {
            alpha: u32,
            beta: &'static str,
        }
        #[derive(Serialize)]
        struct Backward {
            beta: &'static str,
            alpha: u32,
        }
        let f = canonical_bytes(&Forward { alpha: 1, beta: "x" }).unwrap();
        let b = canonical_bytes(&Backward { beta: "x", alpha: 1 }).unwrap();
        assert_eq!(f, b);
    }
}
