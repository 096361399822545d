//! CSV persistence of the global index.

use std::{
    fs::File,
    io::{BufWriter, Seek, Write},
    path::Path,
    sync::Arc,
};

use arrow_array::RecordBatch;
use arrow_csv::{reader::Format, ReaderBuilder, WriterBuilder};
use arrow_schema::{ArrowError, SchemaRef};

use crate::error::{IoResultExt, Result};

pub(super) fn write_index_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path).at(path)?;
    let mut out = BufWriter::new(file);
    {
        let mut writer = WriterBuilder::new().with_header(true).build(&mut out);
        writer.write(batch)?;
    }
    out.flush().at(path)?;
    out.get_ref().sync_all().at(path)?;
    Ok(())
}

/// Read the whole index, inferring metadata column types from the cells.
pub(super) fn read_index_csv(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let mut file = File::open(path).at(path)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, None)?;
    file.rewind().at(path)?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    Ok((schema, batches))
}
