// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::HashMap;

/// Fields produced by window averaging; always accepted by the compiler.
pub const SYNTHETIC_FIELDS: [&str; 3] = ["count", "weight", "rate"];

/// Name to row-slot mapping that compiled expressions read from.
///
/// Rows are plain `&[f64]` slices: table columns first, in storage order, followed by the
/// synthetic fields when the rows come out of the window averager.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    slots: HashMap<String, usize>,
    width: usize,
}

impl FieldSchema {
    /// Schema for raw table rows. Synthetic names that are not real columns map past the
    /// end of the row and fail at evaluation time if referenced.
    pub fn for_columns<S: AsRef<str>>(columns: &[S]) -> Self {
        let mut schema = Self::default();
        for (idx, name) in columns.iter().enumerate() {
            schema.slots.insert(name.as_ref().to_string(), idx);
        }
        schema.width = columns.len();
        let mut next = columns.len();
        for name in SYNTHETIC_FIELDS {
            if !schema.slots.contains_key(name) {
                schema.slots.insert(name.to_string(), next);
                next += 1;
            }
        }
        schema
    }

    /// Schema for averaged rows: columns, then `count`, `weight`, `rate`. The synthetic
    /// fields shadow columns of the same name.
    pub fn for_averaged<S: AsRef<str>>(columns: &[S]) -> Self {
        let mut schema = Self::default();
        for (idx, name) in columns.iter().enumerate() {
            schema.slots.insert(name.as_ref().to_string(), idx);
        }
        for (offset, name) in SYNTHETIC_FIELDS.iter().enumerate() {
            schema
                .slots
                .insert((*name).to_string(), columns.len() + offset);
        }
        schema.width = columns.len() + SYNTHETIC_FIELDS.len();
        schema
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Number of slots a row supplies for this schema.
    pub fn width(&self) -> usize {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_schema_appends_missing_synthetic_fields() {
        let schema = FieldSchema::for_columns(&["time", "rate"]);
        assert_eq!(schema.slot("time"), Some(0));
        assert_eq!(schema.slot("rate"), Some(1));
        assert_eq!(schema.slot("count"), Some(2));
        assert_eq!(schema.slot("weight"), Some(3));
        assert_eq!(schema.width(), 2);
    }

    #[test]
    fn averaged_schema_shadows_columns() {
        let schema = FieldSchema::for_averaged(&["time", "rate"]);
        assert_eq!(schema.slot("rate"), Some(4));
        assert_eq!(schema.slot("count"), Some(2));
        assert_eq!(schema.width(), 5);
    }
}
