//! In-memory hash-join over opaque, encoded rows (spec §6, §4.7).
//!
//! This is the one collaborator spec.md treats as "straightforward and not
//! part of the hard core" — no WAL, no transactions, no durability. It
//! consumes a build side ("inner") and a probe side ("outer"), equi-joins
//! them on two named fields, and emits the field-wise merge (outer
//! overrides inner on collision) for every matching pair.
//!
//! Row encoding is pinned per `SPEC_FULL.md` §4.7, grounded in
//! `original_source/src/c/hashjoin.c` (which round-trips rows through
//! Python's `json.loads`/`json.dumps` and concatenates the results with a
//! NUL terminator): a [`Row`] is a `serde_json::Map`, encoded with
//! `serde_json::to_vec` followed by a single `0x00` byte.

use ledgerstore_error::Result;
use serde_json::{Map, Value};

/// An opaque row: a mapping from field name to JSON value. Insertion order
/// is preserved (`serde_json`'s `preserve_order` feature), matching the
/// workspace-wide choice in `Cargo.toml`.
pub type Row = Map<String, Value>;

/// Extract the string form of a row's key field.
///
/// Returns `None` — "missing" per spec §6 — when the field is absent, or
/// when it holds a non-scalar value (array/object): the original's
/// `PyObject_Str` coercion only ever makes sense for scalars, and pinning
/// that here keeps equality well-defined.
fn key_string(row: &Row, field: &str) -> Option<String> {
    match row.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::Array(_) | Value::Object(_)) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Merge `inner` then `outer` into a fresh row, with `outer`'s fields
/// overriding `inner`'s on a name collision (spec §6).
fn merge_rows(inner: &Row, outer: &Row) -> Row {
    let mut merged = inner.clone();
    for (k, v) in outer {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Build an in-memory map from key string to the list of inner rows
/// carrying it. Rows missing the key field are dropped (spec §6:
/// "missing key field → row skipped").
fn build_table<'a>(
    inner_rows: &'a [Row],
    inner_key: &str,
) -> std::collections::HashMap<String, Vec<&'a Row>> {
    let mut table: std::collections::HashMap<String, Vec<&Row>> =
        std::collections::HashMap::new();
    for row in inner_rows {
        match key_string(row, inner_key) {
            Some(key) => table.entry(key).or_default().push(row),
            None => tracing::trace!(field = inner_key, "hash_join: inner row missing key field"),
        }
    }
    table
}

/// Run the join and append encoded output rows to `sink`, stopping a given
/// row's encoding (but not the whole join) if it would push `sink` past
/// `max_output_size` — the original's `out_pos + len <= output_buf_size`
/// check, skip-and-continue rather than abort.
///
/// Returns the number of rows actually emitted.
///
/// # Errors
/// Never returns `Err` today — row-level problems (missing key, oversized
/// output) are skip-and-continue per spec §7, not propagated. The `Result`
/// return keeps this call-compatible with the rest of the engine's API
/// surface if a future version wants to make a class of row failure fatal.
pub fn hash_join(
    inner_rows: &[Row],
    outer_rows: &[Row],
    inner_key: &str,
    outer_key: &str,
    sink: &mut Vec<u8>,
    max_output_size: usize,
) -> Result<usize> {
    let table = build_table(inner_rows, inner_key);
    let mut emitted = 0usize;

    for outer in outer_rows {
        let Some(key) = key_string(outer, outer_key) else {
            tracing::trace!(field = outer_key, "hash_join: outer row missing key field");
            continue;
        };
        let Some(matches) = table.get(&key) else {
            continue;
        };
        for inner in matches {
            let merged = merge_rows(inner, outer);
            let mut encoded = match serde_json::to_vec(&merged) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(%err, "hash_join: failed to encode merged row");
                    continue;
                }
            };
            encoded.push(0u8);

            if sink.len() + encoded.len() > max_output_size {
                tracing::trace!(
                    key = %key,
                    "hash_join: row would overflow output cap, skipped"
                );
                continue;
            }

            sink.extend_from_slice(&encoded);
            emitted += 1;
        }
    }

    Ok(emitted)
}

/// Split a join's encoded output back into individual rows, for tests and
/// callers that want to inspect what `hash_join` produced. Not part of the
/// spec's contract (the sink is opaque to the engine) — a convenience for
/// round-tripping the pinned encoding.
#[must_use]
pub fn decode_rows(encoded: &[u8]) -> Vec<Row> {
    encoded
        .split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .filter_map(|chunk| serde_json::from_slice::<Row>(chunk).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn scenario_s6_matches_two_rows() {
        let inner = vec![
            row(json!({"id": 1, "n": "A"})),
            row(json!({"id": 2, "n": "B"})),
        ];
        let outer = vec![
            row(json!({"id": 1, "v": 10})),
            row(json!({"id": 2, "v": 20})),
            row(json!({"id": 3, "v": 30})),
        ];

        let mut sink = Vec::new();
        let count = hash_join(&inner, &outer, "id", "id", &mut sink, usize::MAX).unwrap();
        assert_eq!(count, 2);

        let rows = decode_rows(&sink);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("n").unwrap(), "A");
        assert_eq!(rows[0].get("v").unwrap(), 10);
        assert_eq!(rows[1].get("n").unwrap(), "B");
        assert_eq!(rows[1].get("v").unwrap(), 20);
    }

    #[test]
    fn outer_overrides_inner_on_field_collision() {
        let inner = vec![row(json!({"id": 1, "n": "stale"}))];
        let outer = vec![row(json!({"id": 1, "n": "fresh"}))];

        let mut sink = Vec::new();
        hash_join(&inner, &outer, "id", "id", &mut sink, usize::MAX).unwrap();

        let rows = decode_rows(&sink);
        assert_eq!(rows[0].get("n").unwrap(), "fresh");
    }

    #[test]
    fn row_missing_key_field_is_skipped() {
        let inner = vec![row(json!({"id": 1}))];
        let outer = vec![row(json!({"v": 10}))];

        let mut sink = Vec::new();
        let count = hash_join(&inner, &outer, "id", "id", &mut sink, usize::MAX).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn one_inner_key_fans_out_to_many_inner_rows() {
        let inner = vec![
            row(json!({"id": 1, "tag": "x"})),
            row(json!({"id": 1, "tag": "y"})),
        ];
        let outer = vec![row(json!({"id": 1, "v": 5}))];

        let mut sink = Vec::new();
        let count = hash_join(&inner, &outer, "id", "id", &mut sink, usize::MAX).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn oversized_row_is_skipped_without_aborting_the_join() {
        let inner = vec![row(json!({"id": 1, "n": "A"})), row(json!({"id": 2, "n": "B"}))];
        let outer = vec![row(json!({"id": 1, "v": 1})), row(json!({"id": 2, "v": 2}))];

        let mut sink = Vec::new();
        // Cap tiny enough that the first merged row cannot fit at all;
        // the join must still attempt and emit the second.
        let count = hash_join(&inner, &outer, "id", "id", &mut sink, 1).unwrap();
        assert_eq!(count, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn non_scalar_key_field_is_treated_as_missing() {
        let inner = vec![row(json!({"id": [1, 2], "n": "A"}))];
        let outer = vec![row(json!({"id": [1, 2], "v": 1}))];

        let mut sink = Vec::new();
        let count = hash_join(&inner, &outer, "id", "id", &mut sink, usize::MAX).unwrap();
        assert_eq!(count, 0);
    }
}
