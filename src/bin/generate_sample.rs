//! Writes `sample_store.json` (and the cell matrix as `sample_cells.parquet`):
//! an `ImageDataContainer` with a 4×5×6 `CellAttributeMatrix` holding
//! `Int32Data` (all 37), a three-component `EulerAngles` array and a random
//! `Confidence` array.

use std::path::Path;

use anyhow::{Context, Result};

use array_calc::data::loader::{save_store, write_matrix};
use array_calc::{
    AttributeMatrixType, DataArrayPath, DataContainerArray, Initialization, ScalarType,
};

fn main() -> Result<()> {
    env_logger::init();

    let mut dca = DataContainerArray::new();
    dca.create_data_container("ImageDataContainer")?;

    let cells = DataArrayPath::new("ImageDataContainer", "CellAttributeMatrix", "");
    dca.create_attribute_matrix(&cells, AttributeMatrixType::Cell, vec![4, 5, 6])?;

    dca.create_data_array(
        &cells.with_array("Int32Data"),
        ScalarType::Int32,
        1,
        &Initialization::Manual("37".into()),
    )?;
    dca.create_data_array(
        &cells.with_array("EulerAngles"),
        ScalarType::Float,
        3,
        &Initialization::RandomRange {
            min: 0.0,
            max: 360.0,
            seed: 42,
        },
    )?;
    dca.create_data_array(
        &cells.with_array("Confidence"),
        ScalarType::Double,
        1,
        &Initialization::RandomRange {
            min: 0.0,
            max: 1.0,
            seed: 7,
        },
    )?;

    let store_path = Path::new("sample_store.json");
    save_store(store_path, &dca).context("writing sample store")?;

    let matrix_path = Path::new("sample_cells.parquet");
    write_matrix(matrix_path, dca.attribute_matrix(&cells)?).context("writing sample matrix")?;

    let am = dca.attribute_matrix(&cells)?;
    println!(
        "Wrote {} arrays × {} tuples to {} and {}",
        am.arrays.len(),
        am.num_tuples(),
        store_path.display(),
        matrix_path.display()
    );
    Ok(())
}
