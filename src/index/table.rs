//! Worker-local index tables, persisted as parquet between ingestion and merge.

use std::{fs::File, path::Path};

use arrow_schema::ArrowError;
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter};

use super::{from_record_batches, to_record_batch, Index};
use crate::error::{IoResultExt, Result};

/// Write one worker's rows to `path`.
pub(crate) fn write_worker_table(path: &Path, index: &Index) -> Result<()> {
    let batch = to_record_batch(index)?;
    let file = File::create(path).at(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Read a table written by [`write_worker_table`].
pub(crate) fn read_worker_table(path: &Path) -> Result<Index> {
    let file = File::open(path).at(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    from_record_batches(&schema, &batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chunk::Placement,
        index::IndexRow,
        record::{MetadataValue, Shape},
    };

    #[test]
    fn worker_table_preserves_rows_and_types() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("worker.parquet");
        let index = Index::new(
            vec!["label".into(), "step".into()],
            (0..5u64)
                .map(|i| IndexRow {
                    placement: Placement {
                        chunk_name: format!("chunk_{}.chnk", i / 2),
                        offset_bytes: (i % 2) * 8,
                        size_bytes: 8,
                    },
                    shape: Shape::from([2]),
                    values: vec![format!("item-{i}").into(), MetadataValue::Int(i as i64)],
                })
                .collect(),
        )
        .unwrap();

        write_worker_table(&path, &index).unwrap();
        assert_eq!(read_worker_table(&path).unwrap(), index);
    }

    #[test]
    fn empty_worker_table_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("empty.parquet");

        write_worker_table(&path, &Index::default()).unwrap();
        let loaded = read_worker_table(&path).unwrap();
        assert!(loaded.is_empty());
    }
}
