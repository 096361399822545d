//! Conversion between [`Index`] and Arrow record batches.

use std::sync::Arc;

use arrow_array::{
    cast::AsArray,
    types::{Float64Type, Int64Type, UInt64Type},
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray, UInt64Array,
};
use arrow_cast::cast;
use arrow_schema::{DataType, Field, Schema};

use super::{Index, IndexRow, CHUNK_NAME_COL, OFFSET_BYTES_COL, SHAPE_COL, SIZE_BYTES_COL};
use crate::{
    chunk::Placement,
    error::{Error, Result},
    index::is_reserved,
    record::{MetadataValue, Shape, ValueKind},
};

/// Encode the index as one batch: reserved columns first, then metadata.
pub(crate) fn to_record_batch(index: &Index) -> Result<RecordBatch> {
    let rows = index.rows();
    let mut fields = vec![
        Field::new(CHUNK_NAME_COL, DataType::Utf8, false),
        Field::new(OFFSET_BYTES_COL, DataType::UInt64, false),
        Field::new(SIZE_BYTES_COL, DataType::UInt64, false),
        Field::new(SHAPE_COL, DataType::Utf8, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|row| row.placement.chunk_name.as_str()),
        )),
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|row| row.placement.offset_bytes),
        )),
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|row| row.placement.size_bytes),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|row| row.shape.to_string()),
        )),
    ];

    for (col, name) in index.columns().iter().enumerate() {
        let cells = || rows.iter().map(move |row| &row.values[col]);
        let array: ArrayRef = match column_kind(name, cells())? {
            Some(ValueKind::Bool) => {
                Arc::new(cells().map(MetadataValue::as_bool).collect::<BooleanArray>())
            }
            Some(ValueKind::Int) => {
                Arc::new(cells().map(MetadataValue::as_i64).collect::<Int64Array>())
            }
            Some(ValueKind::Float) => {
                Arc::new(cells().map(MetadataValue::as_f64).collect::<Float64Array>())
            }
            Some(ValueKind::Str) | None => {
                Arc::new(cells().map(MetadataValue::as_str).collect::<StringArray>())
            }
        };
        fields.push(Field::new(name, array.data_type().clone(), true));
        columns.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Storage class shared by every non-null cell of a column.
///
/// Integers widen to floats when both appear; any other mix is a schema error.
fn column_kind<'a>(
    name: &str,
    cells: impl Iterator<Item = &'a MetadataValue>,
) -> Result<Option<ValueKind>> {
    let mut kind = None;
    for cell in cells {
        kind = match (kind, cell.kind()) {
            (current, None) => current,
            (None, next) => next,
            (Some(a), Some(b)) if a == b => Some(a),
            (Some(ValueKind::Int), Some(ValueKind::Float))
            | (Some(ValueKind::Float), Some(ValueKind::Int)) => Some(ValueKind::Float),
            (Some(a), Some(b)) => {
                return Err(Error::SchemaMismatch(format!(
                    "metadata column {name:?} mixes {a:?} and {b:?} values"
                )));
            }
        };
    }
    Ok(kind)
}

/// Decode batches sharing `schema` into an [`Index`].
pub(crate) fn from_record_batches(schema: &Schema, batches: &[RecordBatch]) -> Result<Index> {
    for reserved in super::RESERVED_COLUMNS {
        if schema.column_with_name(reserved).is_none() {
            return Err(Error::IndexFormat(format!(
                "index is missing reserved column {reserved:?}"
            )));
        }
    }
    let metadata_columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .filter(|name| !is_reserved(name))
        .collect();

    let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());
    for batch in batches {
        let column = |name: &str| {
            batch
                .column_by_name(name)
                .ok_or_else(|| Error::IndexFormat(format!("batch is missing column {name:?}")))
        };

        let chunk_names = cast(column(CHUNK_NAME_COL)?.as_ref(), &DataType::Utf8)?;
        let chunk_names = chunk_names.as_string::<i32>();
        let offsets = cast(column(OFFSET_BYTES_COL)?.as_ref(), &DataType::UInt64)?;
        let offsets = offsets.as_primitive::<UInt64Type>();
        let sizes = cast(column(SIZE_BYTES_COL)?.as_ref(), &DataType::UInt64)?;
        let sizes = sizes.as_primitive::<UInt64Type>();
        let shapes = cast(column(SHAPE_COL)?.as_ref(), &DataType::Utf8)?;
        let shapes = shapes.as_string::<i32>();

        let metadata = metadata_columns
            .iter()
            .map(|name| column_values(column(name)?.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        for i in 0..batch.num_rows() {
            let cell_missing = |name: &str| {
                Error::IndexFormat(format!(
                    "row {} has no valid {name:?} value",
                    rows.len()
                ))
            };
            if chunk_names.is_null(i) {
                return Err(cell_missing(CHUNK_NAME_COL));
            }
            if offsets.is_null(i) {
                return Err(cell_missing(OFFSET_BYTES_COL));
            }
            if sizes.is_null(i) {
                return Err(cell_missing(SIZE_BYTES_COL));
            }
            if shapes.is_null(i) {
                return Err(cell_missing(SHAPE_COL));
            }
            rows.push(IndexRow {
                placement: Placement {
                    chunk_name: chunk_names.value(i).to_string(),
                    offset_bytes: offsets.value(i),
                    size_bytes: sizes.value(i),
                },
                shape: shapes.value(i).parse::<Shape>()?,
                values: metadata.iter().map(|values| values[i].clone()).collect(),
            });
        }
    }

    Index::new(metadata_columns, rows)
}

/// Metadata cells of one column, taken verbatim from the array.
fn column_values(array: &dyn Array) -> Result<Vec<MetadataValue>> {
    let len = array.len();
    let values = match array.data_type() {
        DataType::Null => vec![MetadataValue::Null; len],
        DataType::Boolean => {
            let array = array.as_boolean();
            (0..len)
                .map(|i| {
                    if array.is_null(i) {
                        MetadataValue::Null
                    } else {
                        MetadataValue::Bool(array.value(i))
                    }
                })
                .collect()
        }
        dt if dt.is_integer() => {
            let array = cast(array, &DataType::Int64)?;
            let array = array.as_primitive::<Int64Type>();
            (0..len)
                .map(|i| {
                    if array.is_null(i) {
                        MetadataValue::Null
                    } else {
                        MetadataValue::Int(array.value(i))
                    }
                })
                .collect()
        }
        dt if dt.is_floating() => {
            let array = cast(array, &DataType::Float64)?;
            let array = array.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| {
                    if array.is_null(i) {
                        MetadataValue::Null
                    } else {
                        MetadataValue::Float(array.value(i))
                    }
                })
                .collect()
        }
        _ => {
            let array = cast(array, &DataType::Utf8)?;
            let array = array.as_string::<i32>();
            (0..len)
                .map(|i| {
                    if array.is_null(i) {
                        MetadataValue::Null
                    } else {
                        MetadataValue::Str(array.value(i).to_string())
                    }
                })
                .collect()
        }
    };
    Ok(values)
}
