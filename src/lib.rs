//! array-calc: typed attribute-array store with an element-wise expression
//! calculator.

pub mod calc;
pub mod data;

pub use calc::{array_calculator, AngleUnit, ArrayCalculator, CalcError, FilterStatus};
pub use data::init::Initialization;
pub use data::model::{AttributeMatrixType, DataArray, DataArrayPath, ScalarType};
pub use data::store::{DataContainerArray, StoreError};
