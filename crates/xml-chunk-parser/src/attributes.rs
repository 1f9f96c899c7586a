//! Attribute-region scanning for an opening tag's byte range.
//!
//! Delimiters considered here (whitespace, `=`, `"`, `'`, `/`, `>`) are all
//! single-byte ASCII, so slicing at the offsets `strspn!`/`strcspn!` report
//! never lands inside a multi-byte UTF-8 sequence: a continuation byte is
//! always `0x80..=0xBF`, which none of those delimiters are.

use crate::macros::{strcspn, strspn};
use crate::tree::{primitive_to_value, Value};
use xml_entities::{decode_xml_entities, try_parse_primitive};

fn is_name_boundary(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'=' | b'/' | b'>')
}

/// Scans the raw attribute region of an opening tag — everything after the
/// tag name and before its closing `>` (or self-closing `/>`) — into ordered
/// `(name, value)` pairs.
///
/// A bare name with no `=value` is recorded as the boolean `true`, matching
/// XML's permissive real-world use for minimized attributes even though the
/// XML spec proper has no such construct. Quoted values (`"`/`'`) are
/// unescaped and, when `parse_primitives` is set, coerced the same way a
/// text node would be.
pub(crate) fn parse_attributes(region: &str, parse_primitives: bool) -> Vec<(Box<str>, Value)> {
    let bytes = region.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    let mut out = Vec::new();

    while pos < len {
        pos += strspn!(bytes, b' ' | b'\t' | b'\n' | b'\r', pos);
        if pos >= len {
            break;
        }

        let name_len = strcspn!(bytes, b if is_name_boundary(b), pos);
        if name_len == 0 {
            // Stray delimiter (e.g. a lone `/`); skip it and keep scanning.
            pos += 1;
            continue;
        }
        let name = &region[pos..pos + name_len];
        pos += name_len;

        pos += strspn!(bytes, b' ' | b'\t' | b'\n' | b'\r', pos);

        if pos < len && bytes[pos] == b'=' {
            pos += 1;
            pos += strspn!(bytes, b' ' | b'\t' | b'\n' | b'\r', pos);

            let raw_value = if pos < len && (bytes[pos] == b'"' || bytes[pos] == b'\'') {
                let quote = bytes[pos];
                pos += 1;
                let value_len = strcspn!(bytes, b if b == quote, pos);
                let value = &region[pos..pos + value_len];
                pos += value_len;
                if pos < len && bytes[pos] == quote {
                    pos += 1;
                }
                value
            } else {
                let value_len = strcspn!(bytes, b' ' | b'\t' | b'\n' | b'\r' | b'>', pos);
                let value = &region[pos..pos + value_len];
                pos += value_len;
                value
            };

            let decoded = decode_xml_entities(raw_value);
            let value = if parse_primitives {
                primitive_to_value(try_parse_primitive(&decoded))
            } else {
                Value::String(decoded)
            };
            out.push((name.into(), value));
        } else {
            out.push((name.into(), Value::Bool(true)));
        }
    }

    out
}
