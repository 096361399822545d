//! Tabular directory mapping records to their placements.
//!
//! Every row carries the four reserved placement columns
//! ([`CHUNK_NAME_COL`], [`OFFSET_BYTES_COL`], [`SIZE_BYTES_COL`],
//! [`SHAPE_COL`]) followed by the run's metadata columns. The global index is
//! persisted as CSV; worker-local tables written during ingestion use parquet.

mod batch;
mod csv;
mod table;

use std::{
    collections::{BTreeSet, HashSet},
    path::Path,
};

pub(crate) use self::{
    batch::{from_record_batches, to_record_batch},
    table::{read_worker_table, write_worker_table},
};
use crate::{
    chunk::Placement,
    error::{Error, Result},
    record::{Metadata, MetadataValue, Shape},
};

/// Chunk file name, relative to the chunk root.
pub const CHUNK_NAME_COL: &str = "chunk_name";
/// Byte offset of the record within its chunk.
pub const OFFSET_BYTES_COL: &str = "offset_bytes";
/// Byte length of the record.
pub const SIZE_BYTES_COL: &str = "size_bytes";
/// Textual tuple literal of the record's shape.
pub const SHAPE_COL: &str = "shape";

/// Reserved placement columns, in file order.
pub const RESERVED_COLUMNS: [&str; 4] =
    [CHUNK_NAME_COL, OFFSET_BYTES_COL, SIZE_BYTES_COL, SHAPE_COL];

/// Whether `name` is one of the reserved placement columns.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name)
}

/// Durable descriptor of one record.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRow {
    /// Where the record's bytes live.
    pub placement: Placement,
    /// Declared shape of the record.
    pub shape: Shape,
    /// Metadata cells aligned with [`Index::columns`].
    pub values: Vec<MetadataValue>,
}

/// Immutable index of one ingestion run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Index {
    columns: Vec<String>,
    rows: Vec<IndexRow>,
}

impl Index {
    /// Assemble an index from metadata column names and rows.
    ///
    /// Rejects reserved or duplicate column names and rows whose width differs
    /// from the column count.
    pub fn new(columns: Vec<String>, rows: Vec<IndexRow>) -> Result<Self> {
        validate_columns(&columns)?;
        if let Some((pos, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.values.len() != columns.len())
        {
            return Err(Error::SchemaMismatch(format!(
                "row {pos} carries {} metadata values for {} columns",
                row.values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Load an index from a CSV file.
    ///
    /// Metadata values are re-typed from the CSV text: each column becomes
    /// bool, int64, float64 or string by inference over its cells, so a string
    /// such as `"1"` or `"true"` saved earlier loads back as an integer or a
    /// bool, and an empty string loads as [`MetadataValue::Null`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let (schema, batches) = csv::read_index_csv(path.as_ref())?;
        from_record_batches(&schema, &batches)
    }

    /// Persist the index as a CSV file with a header row.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let batch = to_record_batch(self)?;
        csv::write_index_csv(path.as_ref(), &batch)
    }

    /// Metadata column names, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows, in order.
    pub fn rows(&self) -> &[IndexRow] {
        &self.rows
    }

    /// Row at `row`, if present.
    pub fn row(&self, row: usize) -> Option<&IndexRow> {
        self.rows.get(row)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the index holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Metadata mapping of `row`, nulls included.
    pub fn metadata(&self, row: usize) -> Option<Metadata> {
        self.rows.get(row).map(|row| {
            self.columns
                .iter()
                .cloned()
                .zip(row.values.iter().cloned())
                .collect()
        })
    }

    /// Distinct chunk names referenced by the index.
    pub fn chunk_names(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .map(|row| row.placement.chunk_name.as_str())
            .collect()
    }

    /// Concatenate tables that share one metadata column set.
    ///
    /// Tables without rows carry no schema and are skipped. Columns of the
    /// remaining tables are reordered to match the first one; any difference
    /// in the column sets fails with [`Error::SchemaMismatch`].
    pub fn concat(tables: impl IntoIterator<Item = Index>) -> Result<Self> {
        let mut merged: Option<Index> = None;
        for table in tables {
            if table.is_empty() {
                continue;
            }
            let Some(acc) = merged.as_mut() else {
                merged = Some(table);
                continue;
            };
            let order = column_order(&acc.columns, &table.columns)?;
            acc.rows.extend(table.rows.into_iter().map(|mut row| {
                let mut values = std::mem::take(&mut row.values);
                row.values = order
                    .iter()
                    .map(|&src| std::mem::replace(&mut values[src], MetadataValue::Null))
                    .collect();
                row
            }));
        }
        Ok(merged.unwrap_or_default())
    }
}

/// Position of each `expected` column inside `actual`.
fn column_order(expected: &[String], actual: &[String]) -> Result<Vec<usize>> {
    let expected_set: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
    let actual_set: BTreeSet<&str> = actual.iter().map(String::as_str).collect();
    if expected_set != actual_set {
        let missing: Vec<_> = expected_set.difference(&actual_set).collect();
        let extra: Vec<_> = actual_set.difference(&expected_set).collect();
        return Err(Error::SchemaMismatch(format!(
            "metadata columns differ: missing {missing:?}, unexpected {extra:?}"
        )));
    }
    Ok(expected
        .iter()
        .filter_map(|name| actual.iter().position(|col| col == name))
        .collect())
}

fn validate_columns(columns: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for column in columns {
        if is_reserved(column) {
            return Err(Error::SchemaMismatch(format!(
                "metadata column {column:?} collides with a reserved placement column"
            )));
        }
        if !seen.insert(column.as_str()) {
            return Err(Error::SchemaMismatch(format!(
                "metadata column {column:?} appears twice"
            )));
        }
    }
    Ok(())
}

/// Accumulates the rows one worker produces.
///
/// Without a fixed schema the column set grows as new metadata keys appear,
/// and rows that predate a column read it as null.
#[derive(Debug, Default)]
pub(crate) struct IndexBuilder {
    columns: Vec<String>,
    fixed: bool,
    rows: Vec<IndexRow>,
}

impl IndexBuilder {
    pub(crate) fn new(schema: Option<&[String]>) -> Result<Self> {
        match schema {
            Some(columns) => {
                validate_columns(columns)?;
                Ok(Self {
                    columns: columns.to_vec(),
                    fixed: true,
                    rows: Vec::new(),
                })
            }
            None => Ok(Self::default()),
        }
    }

    pub(crate) fn push(
        &mut self,
        placement: Placement,
        shape: Shape,
        metadata: &Metadata,
    ) -> Result<()> {
        let mut values = vec![MetadataValue::Null; self.columns.len()];
        for (key, value) in metadata {
            let pos = match self.columns.iter().position(|col| col == key) {
                Some(pos) => pos,
                None if self.fixed => {
                    return Err(Error::SchemaMismatch(format!(
                        "metadata key {key:?} is not part of the declared schema"
                    )));
                }
                None => {
                    if is_reserved(key) {
                        return Err(Error::SchemaMismatch(format!(
                            "metadata key {key:?} collides with a reserved placement column"
                        )));
                    }
                    self.columns.push(key.clone());
                    values.push(MetadataValue::Null);
                    self.columns.len() - 1
                }
            };
            values[pos] = value.clone();
        }
        self.rows.push(IndexRow {
            placement,
            shape,
            values,
        });
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn finish(self) -> Index {
        let width = self.columns.len();
        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                row.values.resize(width, MetadataValue::Null);
                row
            })
            .collect();
        Index {
            columns: self.columns,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(chunk: u64, offset: u64) -> Placement {
        Placement {
            chunk_name: crate::chunk::chunk_file_name(chunk),
            offset_bytes: offset,
            size_bytes: 16,
        }
    }

    fn meta(pairs: &[(&str, MetadataValue)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn builder_pads_columns_seen_late() {
        let mut builder = IndexBuilder::new(None).unwrap();
        builder
            .push(placement(0, 0), Shape::from([2, 2]), &meta(&[("a", 1i64.into())]))
            .unwrap();
        builder
            .push(
                placement(0, 16),
                Shape::from([2, 2]),
                &meta(&[("a", 2i64.into()), ("b", "x".into())]),
            )
            .unwrap();
        let index = builder.finish();

        assert_eq!(index.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(index.rows()[0].values, vec![MetadataValue::Int(1), MetadataValue::Null]);
        assert_eq!(index.metadata(1).unwrap()["b"], MetadataValue::Str("x".into()));
    }

    #[test]
    fn fixed_schema_rejects_unknown_keys() {
        let schema = vec!["label".to_string()];
        let mut builder = IndexBuilder::new(Some(&schema)).unwrap();
        builder
            .push(placement(0, 0), Shape::from([4]), &Metadata::new())
            .unwrap();
        let err = builder
            .push(placement(0, 16), Shape::from([4]), &meta(&[("other", 1i64.into())]))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn reserved_keys_cannot_be_metadata() {
        let mut builder = IndexBuilder::new(None).unwrap();
        let err = builder
            .push(placement(0, 0), Shape::from([4]), &meta(&[("shape", "oops".into())]))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        assert!(IndexBuilder::new(Some(&["size_bytes".to_string()])).is_err());
    }

    #[test]
    fn concat_reorders_columns_and_skips_empty_tables() {
        let first = Index::new(
            vec!["a".into(), "b".into()],
            vec![IndexRow {
                placement: placement(0, 0),
                shape: Shape::from([4]),
                values: vec![1i64.into(), "x".into()],
            }],
        )
        .unwrap();
        let second = Index::new(
            vec!["b".into(), "a".into()],
            vec![IndexRow {
                placement: placement(1, 0),
                shape: Shape::from([4]),
                values: vec!["y".into(), 2i64.into()],
            }],
        )
        .unwrap();

        let merged = Index::concat([Index::default(), first, second]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(merged.rows()[1].values, vec![MetadataValue::Int(2), "y".into()]);
    }

    #[test]
    fn concat_rejects_differing_column_sets() {
        let row = |values: Vec<MetadataValue>| IndexRow {
            placement: placement(0, 0),
            shape: Shape::from([4]),
            values,
        };
        let first = Index::new(vec!["a".into()], vec![row(vec![1i64.into()])]).unwrap();
        let second = Index::new(vec!["c".into()], vec![row(vec![1i64.into()])]).unwrap();
        assert!(matches!(
            Index::concat([first, second]),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = Index::new(
            vec!["a".into()],
            vec![IndexRow {
                placement: placement(0, 0),
                shape: Shape::from([4]),
                values: vec![],
            }],
        )
        .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }
}
