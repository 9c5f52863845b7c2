// 🔀 Field Diff - reconcile an existing record with an incoming one
//
// One routine for every entity: each entity publishes a table of Field
// accessors, and reconcile() walks the table, copying incoming values that
// differ and reporting which fields changed.

/// A single mutable attribute of `T`.
pub struct Field<T> {
    pub name: &'static str,

    /// Copy the incoming value into the target when they differ.
    /// Returns true if the target changed.
    pub sync: fn(&mut T, &T) -> bool,
}

/// Overwrite `target` with `incoming` if they differ.
pub fn sync_value<V: PartialEq + Clone>(target: &mut V, incoming: &V) -> bool {
    if target == incoming {
        return false;
    }
    *target = incoming.clone();
    true
}

/// Apply every field in `fields` and return the names of those that changed.
///
/// An empty result means `target` already agreed with `incoming` on every
/// listed field and was left untouched.
pub fn reconcile<T>(target: &mut T, incoming: &T, fields: &[Field<T>]) -> Vec<&'static str> {
    fields
        .iter()
        .filter_map(|field| (field.sync)(target, incoming).then_some(field.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        label: Option<String>,
        x: Option<f64>,
        y: Option<f64>,
    }

    const POINT_FIELDS: [Field<Point>; 3] = [
        Field {
            name: "label",
            sync: |t: &mut Point, i: &Point| sync_value(&mut t.label, &i.label),
        },
        Field {
            name: "x",
            sync: |t: &mut Point, i: &Point| sync_value(&mut t.x, &i.x),
        },
        Field {
            name: "y",
            sync: |t: &mut Point, i: &Point| sync_value(&mut t.y, &i.y),
        },
    ];

    #[test]
    fn test_reconcile_no_changes() {
        let mut existing = Point { label: Some("a".into()), x: Some(1.0), y: None };
        let incoming = existing.clone();

        let changed = reconcile(&mut existing, &incoming, &POINT_FIELDS);

        assert!(changed.is_empty());
        assert_eq!(existing, incoming);
    }

    #[test]
    fn test_reconcile_unions_changed_fields() {
        let mut existing = Point { label: Some("a".into()), x: Some(1.0), y: Some(2.0) };
        let incoming = Point { label: Some("b".into()), x: Some(1.0), y: None };

        let changed = reconcile(&mut existing, &incoming, &POINT_FIELDS);

        assert_eq!(changed, vec!["label", "y"]);
        assert_eq!(existing, incoming);
    }
}
