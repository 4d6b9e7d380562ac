//! Product records and the ordered corpus table that defines the matrix index space.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::normalizer::{combine_features, ProductFields};

/// One product as seen by the recommender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Unique product identifier.
    pub id: String,
    /// Product display name.
    pub title: String,
    /// Long-form description (empty when missing).
    pub description: String,
    /// Category label (empty when missing).
    pub category: String,
    /// Space-joined review comments.
    pub comments: String,
    /// Normalized feature string consumed by the vectorizer.
    pub combined_features: String,
}

impl ProductRecord {
    /// Builds a record from raw fields, deriving the combined feature string.
    pub fn from_fields(id: impl Into<String>, fields: ProductFields) -> Self {
        let combined_features = combine_features(&fields);
        Self {
            id: id.into(),
            title: fields.title,
            description: fields.description.unwrap_or_default(),
            category: fields.category.unwrap_or_default(),
            comments: fields.comments,
            combined_features,
        }
    }
}

/// Ordered product table; row `i` corresponds to row `i` of both matrices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ProductRecord>", into = "Vec<ProductRecord>")]
pub struct CorpusTable {
    rows: Vec<ProductRecord>,
    index: HashMap<String, usize>,
}

impl CorpusTable {
    /// Builds a table, keeping the first occurrence of every identifier.
    pub fn from_records(records: Vec<ProductRecord>) -> Self {
        let mut table = Self::default();
        for record in records {
            if table.index.contains_key(&record.id) {
                warn!(product_id = %record.id, "skipping duplicate product identifier");
                continue;
            }
            table.push(record);
        }
        table
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row index of the given identifier.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Record stored at `row`.
    pub fn get(&self, row: usize) -> Option<&ProductRecord> {
        self.rows.get(row)
    }

    /// Iterates rows in index order.
    pub fn iter(&self) -> impl Iterator<Item = &ProductRecord> {
        self.rows.iter()
    }

    /// Feature strings in row order.
    pub fn documents(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|record| record.combined_features.as_str())
            .collect()
    }

    /// Overwrites the row holding `record.id`, returning its index.
    ///
    /// Returns `None` (and leaves the table untouched) when the id is unknown.
    pub fn replace(&mut self, record: ProductRecord) -> Option<usize> {
        let row = self.position(&record.id)?;
        self.rows[row] = record;
        Some(row)
    }

    /// Appends a record with a new identifier, returning its index.
    pub(crate) fn push(&mut self, record: ProductRecord) -> usize {
        let row = self.rows.len();
        self.index.insert(record.id.clone(), row);
        self.rows.push(record);
        row
    }
}

impl From<Vec<ProductRecord>> for CorpusTable {
    fn from(records: Vec<ProductRecord>) -> Self {
        Self::from_records(records)
    }
}

impl From<CorpusTable> for Vec<ProductRecord> {
    fn from(table: CorpusTable) -> Self {
        table.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str) -> ProductRecord {
        ProductRecord::from_fields(
            id,
            ProductFields {
                title: title.into(),
                ..ProductFields::default()
            },
        )
    }

    #[test]
    fn derives_combined_features() {
        let rec = ProductRecord::from_fields(
            "p1",
            ProductFields {
                title: "Air Fryer".into(),
                description: Some("5.5 QT, black".into()),
                category: Some("kitchen".into()),
                comments: "Crispy!".into(),
            },
        );
        assert_eq!(rec.combined_features, "air fryer 55 qt black kitchen crispy");
        assert_eq!(rec.description, "5.5 QT, black");
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let table = CorpusTable::from_records(vec![
            record("a", "first"),
            record("b", "second"),
            record("a", "shadow"),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.position("a"), Some(0));
        assert_eq!(table.get(0).map(|r| r.title.as_str()), Some("first"));
    }

    #[test]
    fn replace_keeps_row_count() {
        let mut table = CorpusTable::from_records(vec![record("a", "one"), record("b", "two")]);
        assert_eq!(table.replace(record("b", "three")), Some(1));
        assert_eq!(table.replace(record("zzz", "nope")), None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).map(|r| r.title.as_str()), Some("three"));
    }

    #[test]
    fn index_survives_serde() {
        let table = CorpusTable::from_records(vec![record("a", "one"), record("b", "two")]);
        let json = serde_json::to_string(&table).expect("serialize");
        let back: CorpusTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.position("b"), Some(1));
        assert_eq!(back.documents(), table.documents());
    }
}
