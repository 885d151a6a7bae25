use std::collections::BTreeMap;

use super::super::domain::FieldValue;

/// Walks a dotted path through nested records.
///
/// Yields `None` as soon as a segment is missing or an intermediate value is
/// not a record (including `Null`). A terminal `Null` is returned as-is.
pub fn resolve_field<'a>(
    fields: &'a BTreeMap<String, FieldValue>,
    path: &str,
) -> Option<&'a FieldValue> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            FieldValue::Record(children) => children.get(segment)?,
            _ => return None,
        };
    }

    Some(current)
}
