//! Deterministic JSON encoding used as the input to block hashes.
//!
//! The output matches Python's `json.dumps(value, sort_keys=True)` byte for
//! byte: keys sorted at every level, `", "` and `": "` separators, and every
//! character outside printable ASCII written as a `\uXXXX` escape (UTF-16
//! surrogate pairs above the BMP). Chains produced by either implementation
//! therefore hash identically.
//!
//! Floats are written by `serde_json`, which differs from Python's `repr` for
//! some exponents (`1e16` vs `1e+16`). Integers outside the `i64`/`u64` range
//! are parsed by `serde_json` as floats, so they hash differently from Python,
//! which keeps them exact. In-range integer, string, bool and null payloads
//! are unaffected.

use crate::error::Result;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use std::io;

/// Encode `value` canonically.
pub fn to_canonical_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let value = sort_keys(serde_json::to_value(value)?);
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PythonFormatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

/// Rebuild objects with their keys in lexicographic order, recursively.
///
/// `serde_json::Map` is already sorted unless the `preserve_order` feature is
/// switched on somewhere in the dependency graph; sorting here keeps the
/// encoding stable either way.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

struct PythonFormatter;

impl Formatter for PythonFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    // serde_json has already escaped quotes, backslashes and C0 controls.
    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}
