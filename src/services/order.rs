use std::cmp::Ordering;

use serde_json::{json, Value};

use crate::models::DriveFile;

/// Three-way comparison of two records under an `orderBy` specification:
/// a comma-separated list of `<key> [asc|desc]`, default ascending.
///
/// Keys are consulted in listed order; the first key whose values differ
/// decides. The virtual `folder` key orders folders before plain files
/// (ascending). A key missing on either record ends the whole multi-key
/// comparison as equal rather than attempting a partial order.
pub fn compare(order_by: &str, a: &DriveFile, b: &DriveFile) -> Ordering {
    for clause in order_by.split(',') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        let mut parts = clause.split_whitespace();
        let key = match parts.next() {
            Some(key) => key,
            None => continue,
        };
        let descending = matches!(parts.next(), Some("desc"));

        if key == "folder" {
            // Equal folder-ness falls through to the next key without
            // consuming a comparison result.
            let ordering = b.is_folder().cmp(&a.is_folder());
            if ordering != Ordering::Equal {
                return apply_direction(ordering, descending);
            }
            continue;
        }

        match (sort_value(a, key), sort_value(b, key)) {
            (Some(left), Some(right)) => {
                let ordering = compare_values(&left, &right);
                if ordering != Ordering::Equal {
                    return apply_direction(ordering, descending);
                }
            }
            _ => return Ordering::Equal,
        }
    }
    Ordering::Equal
}

/// Project a record field to a comparable JSON value. Timestamps keep
/// their RFC 3339 string form; generic keys are never date-parsed.
fn sort_value(file: &DriveFile, key: &str) -> Option<Value> {
    let value = match key {
        "id" => json!(file.id),
        "name" | "title" => json!(file.name),
        "mimeType" => json!(file.mime_type),
        "trashed" => json!(file.trashed),
        "version" => json!(file.version),
        "createdTime" => json!(file.created_time.to_rfc3339()),
        "modifiedTime" => json!(file.modified_time.to_rfc3339()),
        "size" => file.size.map(|size| json!(size))?,
        "md5Checksum" => file.md5_checksum.as_ref().map(|sum| json!(sum))?,
        other => file.extra.get(other).cloned()?,
    };
    if value.is_null() {
        return None;
    }
    Some(value)
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Number(l), Value::Number(r)) => l
            .as_f64()
            .partial_cmp(&r.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

fn apply_direction(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}
