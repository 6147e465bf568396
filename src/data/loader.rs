use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, Int8Array, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::{
    DataType, Field, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, Schema,
    UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::model::{ArrayData, AttributeMatrix, AttributeMatrixType, DataArray, DataArrayPath};
use super::store::DataContainerArray;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Persist the store. Dispatch by extension.
///
/// * `.json`    – the whole store
/// * `.csv`     – the matrix named by `matrix` only
/// * `.parquet` – the matrix named by `matrix` only
pub fn write_file(
    path: &Path,
    store: &DataContainerArray,
    matrix: Option<&DataArrayPath>,
) -> Result<()> {
    match extension(path).as_str() {
        "json" => save_store(path, store),
        "csv" | "parquet" | "pq" => {
            let scope = matrix.context("tabular output needs an attribute matrix path")?;
            let am = store
                .attribute_matrix(scope)
                .with_context(|| format!("exporting '{}'", scope.matrix_path()))?;
            write_matrix(path, am)
        }
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Read one attribute matrix from a `.csv` or `.parquet` file. Every column
/// becomes a single-component array.
pub fn load_matrix(path: &Path, name: &str) -> Result<AttributeMatrix> {
    let arrays = match extension(path).as_str() {
        "csv" => load_csv(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let num_tuples = arrays.first().map(|a| a.len()).unwrap_or(0);
    let mut am = AttributeMatrix::new(name, AttributeMatrixType::Generic, vec![num_tuples]);
    for array in arrays {
        am.arrays.insert(array.name.clone(), Arc::new(array));
    }
    log::info!(
        "loaded {} arrays × {num_tuples} tuples from {}",
        am.arrays.len(),
        path.display()
    );
    Ok(am)
}

/// Write one attribute matrix as `.csv` or `.parquet`.
pub fn write_matrix(path: &Path, matrix: &AttributeMatrix) -> Result<()> {
    match extension(path).as_str() {
        "csv" => write_csv(path, matrix),
        "parquet" | "pq" => write_parquet(path, matrix),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// JSON store
// ---------------------------------------------------------------------------

pub fn save_store(path: &Path, store: &DataContainerArray) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), store).context("serializing store")?;
    log::info!("wrote store with {} containers to {}", store.containers.len(), path.display());
    Ok(())
}

pub fn load_store(path: &Path) -> Result<DataContainerArray> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let store: DataContainerArray =
        serde_json::from_reader(BufReader::new(file)).context("parsing store JSON")?;
    for dc in store.containers.values() {
        for am in dc.matrices.values() {
            for (name, array) in &am.arrays {
                if !array.is_well_formed() {
                    bail!(
                        "array '{}/{}/{name}' has {} elements for {} components",
                        dc.name,
                        am.name,
                        array.len(),
                        array.num_components
                    );
                }
            }
        }
    }
    Ok(store)
}

// ---------------------------------------------------------------------------
// Tabular layout shared by CSV and Parquet
// ---------------------------------------------------------------------------

/// One exported column: a single component of one array.
struct ColumnRef<'a> {
    header: String,
    array: &'a DataArray,
    component: usize,
}

/// Flatten a matrix into per-component columns (`Name`, or `Name_0`,
/// `Name_1`, … for multi-component arrays). All arrays must share a tuple
/// count.
fn matrix_columns(matrix: &AttributeMatrix) -> Result<(Vec<ColumnRef<'_>>, usize)> {
    let mut columns = Vec::new();
    let mut num_tuples = None;
    for (name, array) in &matrix.arrays {
        match num_tuples {
            None => num_tuples = Some(array.num_tuples()),
            Some(n) if n != array.num_tuples() => bail!(
                "array '{name}' has {} tuples, expected {n}",
                array.num_tuples()
            ),
            _ => {}
        }
        for component in 0..array.num_components {
            let header = if array.num_components == 1 {
                name.clone()
            } else {
                format!("{name}_{component}")
            };
            columns.push(ColumnRef {
                header,
                array,
                component,
            });
        }
    }
    Ok((columns, num_tuples.unwrap_or(0)))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn write_csv(path: &Path, matrix: &AttributeMatrix) -> Result<()> {
    let (columns, num_tuples) = matrix_columns(matrix)?;
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer
        .write_record(columns.iter().map(|c| c.header.as_str()))
        .context("writing CSV header")?;
    for tuple in 0..num_tuples {
        let row = columns.iter().map(|c| {
            c.array
                .data
                .display_value(tuple * c.array.num_components + c.component)
        });
        writer
            .write_record(row)
            .with_context(|| format!("writing CSV row {tuple}"))?;
    }
    writer.flush().context("flushing CSV")?;
    log::info!("wrote {num_tuples} rows to {}", path.display());
    Ok(())
}

/// Column types are inferred from the whole column: all integers → Int64,
/// all `true`/`false` → Bool, otherwise numbers → Double (empty cells are
/// NaN). Non-numeric columns are skipped.
fn load_csv(path: &Path) -> Result<Vec<DataArray>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col, cell) in cells.iter_mut().enumerate() {
            cell.push(record.get(col).unwrap_or("").trim().to_string());
        }
    }

    let mut arrays = Vec::new();
    for (name, column) in headers.into_iter().zip(cells) {
        match infer_column(&column) {
            Some(data) => arrays.push(DataArray::new(name, 1, data)),
            None => log::warn!("skipping non-numeric CSV column '{name}'"),
        }
    }
    Ok(arrays)
}

fn infer_column(cells: &[String]) -> Option<ArrayData> {
    if let Some(ints) = cells
        .iter()
        .map(|s| s.parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()
    {
        return Some(ArrayData::Int64(ints));
    }
    if let Some(bools) = cells
        .iter()
        .map(|s| match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
    {
        return Some(ArrayData::Bool(bools));
    }
    cells
        .iter()
        .map(|s| {
            if s.is_empty() {
                Some(f64::NAN)
            } else {
                s.parse::<f64>().ok()
            }
        })
        .collect::<Option<Vec<_>>>()
        .map(ArrayData::Double)
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Arrow view of one component of an array.
fn component_to_arrow(array: &DataArray, component: usize) -> ArrayRef {
    let stride = array.num_components;
    macro_rules! pick {
        ($values:expr, $arrow:ty) => {
            Arc::new(<$arrow>::from(
                $values
                    .iter()
                    .skip(component)
                    .step_by(stride)
                    .copied()
                    .collect::<Vec<_>>(),
            )) as ArrayRef
        };
    }
    match &array.data {
        ArrayData::Int8(v) => pick!(v, Int8Array),
        ArrayData::UInt8(v) => pick!(v, UInt8Array),
        ArrayData::Int16(v) => pick!(v, Int16Array),
        ArrayData::UInt16(v) => pick!(v, UInt16Array),
        ArrayData::Int32(v) => pick!(v, Int32Array),
        ArrayData::UInt32(v) => pick!(v, UInt32Array),
        ArrayData::Int64(v) => pick!(v, Int64Array),
        ArrayData::UInt64(v) => pick!(v, UInt64Array),
        ArrayData::Float(v) => pick!(v, Float32Array),
        ArrayData::Double(v) => pick!(v, Float64Array),
        ArrayData::Bool(v) => pick!(v, BooleanArray),
    }
}

/// Convert a matrix to an Arrow record batch, one column per component.
pub fn matrix_to_record_batch(matrix: &AttributeMatrix) -> Result<RecordBatch> {
    let (columns, _) = matrix_columns(matrix)?;
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|c| component_to_arrow(c.array, c.component))
        .collect();
    let fields: Vec<Field> = columns
        .iter()
        .zip(&arrays)
        .map(|(c, a)| Field::new(c.header.as_str(), a.data_type().clone(), false))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).context("building record batch")
}

fn write_parquet(path: &Path, matrix: &AttributeMatrix) -> Result<()> {
    let batch = matrix_to_record_batch(matrix)?;
    let file = File::create(path).context("creating parquet file")?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    log::info!("wrote {} rows to {}", batch.num_rows(), path.display());
    Ok(())
}

fn load_parquet(path: &Path) -> Result<Vec<DataArray>> {
    let file = File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut arrays: Vec<Option<DataArray>> = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        if arrays.is_empty() {
            arrays = vec![None; schema.fields().len()];
        }
        for (idx, field) in schema.fields().iter().enumerate() {
            let Some(data) = arrow_to_data(batch.column(idx)) else {
                log::warn!(
                    "skipping parquet column '{}' of type {:?}",
                    field.name(),
                    field.data_type()
                );
                continue;
            };
            match &mut arrays[idx] {
                Some(existing) => {
                    if !existing.data.append(data) {
                        bail!("column '{}' changes type between batches", field.name());
                    }
                }
                slot => *slot = Some(DataArray::new(field.name().clone(), 1, data)),
            }
        }
    }
    Ok(arrays.into_iter().flatten().collect())
}

/// Map an Arrow column to typed storage; nulls become 0 (NaN for floats).
fn arrow_to_data(col: &ArrayRef) -> Option<ArrayData> {
    macro_rules! ints {
        ($arrow:ty, $variant:ident) => {
            ArrayData::$variant(
                col.as_primitive::<$arrow>()
                    .iter()
                    .map(|v| v.unwrap_or_default())
                    .collect(),
            )
        };
    }
    let data = match col.data_type() {
        DataType::Int8 => ints!(Int8Type, Int8),
        DataType::UInt8 => ints!(UInt8Type, UInt8),
        DataType::Int16 => ints!(Int16Type, Int16),
        DataType::UInt16 => ints!(UInt16Type, UInt16),
        DataType::Int32 => ints!(Int32Type, Int32),
        DataType::UInt32 => ints!(UInt32Type, UInt32),
        DataType::Int64 => ints!(Int64Type, Int64),
        DataType::UInt64 => ints!(UInt64Type, UInt64),
        DataType::Float32 => ArrayData::Float(
            col.as_primitive::<Float32Type>()
                .iter()
                .map(|v| v.unwrap_or(f32::NAN))
                .collect(),
        ),
        DataType::Float64 => ArrayData::Double(
            col.as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect(),
        ),
        DataType::Boolean => ArrayData::Bool(
            col.as_boolean()
                .iter()
                .map(|v| v.unwrap_or(false))
                .collect(),
        ),
        _ => return None,
    };
    Some(data)
}
