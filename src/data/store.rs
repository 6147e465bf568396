use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::init::{initialize, Initialization};
use super::model::{
    AttributeMatrix, AttributeMatrixType, DataArray, DataArrayPath, DataContainer, ScalarType,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("no data found at '{0}'")]
    NotFound(DataArrayPath),
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: DataArrayPath, reason: String },
    #[error("'{0}' already exists")]
    Duplicate(DataArrayPath),
    #[error("'{text}' is not a valid {ty} value")]
    InvalidInitValue { text: String, ty: ScalarType },
    #[error("array '{path}' has {len} elements, not a multiple of {components} components")]
    InvalidShape {
        path: DataArrayPath,
        len: usize,
        components: usize,
    },
}

impl StoreError {
    /// Negative status code reported through the filter entry points.
    pub fn code(&self) -> i32 {
        match self {
            StoreError::NotFound(_) => -4020,
            StoreError::InvalidPath { .. } => -4021,
            StoreError::Duplicate(_) => -4022,
            StoreError::InvalidInitValue { .. } => -4023,
            StoreError::InvalidShape { .. } => -4024,
        }
    }

    fn invalid(path: &DataArrayPath, reason: impl Into<String>) -> Self {
        StoreError::InvalidPath {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// DataContainerArray – the typed array store
// ---------------------------------------------------------------------------

/// Root of the store: named data containers, each holding attribute matrices
/// of named arrays.
///
/// Arrays are shared behind `Arc`. Replacing an array swaps the pointer, so a
/// reader that resolved the old array keeps a complete copy of it and never
/// sees a partially written replacement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataContainerArray {
    pub containers: BTreeMap<String, DataContainer>,
}

impl DataContainerArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_data_container(&mut self, name: &str) -> Result<(), StoreError> {
        let path = DataArrayPath::new(name, "", "");
        if name.is_empty() {
            return Err(StoreError::invalid(&path, "container name is empty"));
        }
        if self.containers.contains_key(name) {
            return Err(StoreError::Duplicate(path));
        }
        self.containers
            .insert(name.to_string(), DataContainer::new(name));
        log::debug!("created data container '{name}'");
        Ok(())
    }

    /// Add an attribute matrix at `path` (array segment ignored).
    pub fn create_attribute_matrix(
        &mut self,
        path: &DataArrayPath,
        matrix_type: AttributeMatrixType,
        tuple_dims: Vec<usize>,
    ) -> Result<(), StoreError> {
        if path.matrix.is_empty() {
            return Err(StoreError::invalid(path, "attribute matrix name is empty"));
        }
        let container = self
            .containers
            .get_mut(&path.container)
            .ok_or_else(|| StoreError::invalid(path, "data container does not exist"))?;
        if container.matrices.contains_key(&path.matrix) {
            return Err(StoreError::Duplicate(path.matrix_path()));
        }
        log::debug!("created attribute matrix '{}' with dims {tuple_dims:?}", path.matrix_path());
        container.matrices.insert(
            path.matrix.clone(),
            AttributeMatrix::new(path.matrix.clone(), matrix_type, tuple_dims),
        );
        Ok(())
    }

    /// Insert a matrix built elsewhere (e.g. by a loader), replacing any
    /// matrix of the same name.
    pub fn insert_attribute_matrix(
        &mut self,
        container: &str,
        matrix: AttributeMatrix,
    ) -> Result<(), StoreError> {
        let path = DataArrayPath::new(container, matrix.name.clone(), "");
        let dc = self
            .containers
            .get_mut(container)
            .ok_or_else(|| StoreError::invalid(&path, "data container does not exist"))?;
        dc.matrices.insert(matrix.name.clone(), matrix);
        Ok(())
    }

    pub fn attribute_matrix(&self, path: &DataArrayPath) -> Result<&AttributeMatrix, StoreError> {
        let container = self
            .containers
            .get(&path.container)
            .ok_or_else(|| StoreError::invalid(path, "data container does not exist"))?;
        container
            .matrices
            .get(&path.matrix)
            .ok_or_else(|| StoreError::invalid(path, "attribute matrix does not exist"))
    }

    fn attribute_matrix_mut(
        &mut self,
        path: &DataArrayPath,
    ) -> Result<&mut AttributeMatrix, StoreError> {
        let container = self
            .containers
            .get_mut(&path.container)
            .ok_or_else(|| StoreError::invalid(path, "data container does not exist"))?;
        container
            .matrices
            .get_mut(&path.matrix)
            .ok_or_else(|| StoreError::invalid(path, "attribute matrix does not exist"))
    }

    /// Fails unless the container and matrix of `path` exist and the array
    /// segment is non-empty.
    pub fn check_array_parent(&self, path: &DataArrayPath) -> Result<(), StoreError> {
        if !path.has_array() {
            return Err(StoreError::invalid(path, "array name is empty"));
        }
        self.attribute_matrix(path).map(|_| ())
    }

    /// Names of the arrays in the matrix addressed by `scope`, sorted.
    pub fn list_array_names(&self, scope: &DataArrayPath) -> Result<Vec<String>, StoreError> {
        Ok(self.attribute_matrix(scope)?.array_names())
    }

    /// Look up the array at `path`.
    pub fn resolve(&self, path: &DataArrayPath) -> Result<Arc<DataArray>, StoreError> {
        self.attribute_matrix(path)
            .ok()
            .and_then(|am| am.array(&path.array))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.clone()))
    }

    /// Allocate a zero-filled array at `path`, replacing any existing one.
    pub fn create_or_replace(
        &mut self,
        path: &DataArrayPath,
        ty: ScalarType,
        num_tuples: usize,
        num_components: usize,
    ) -> Result<Arc<DataArray>, StoreError> {
        let array = DataArray::zeros(path.array.clone(), ty, num_tuples, num_components.max(1));
        self.insert_array(path, array)?;
        self.resolve(path)
    }

    /// Place a fully built array at `path` in a single swap. Returns the
    /// array it replaced, if any.
    pub fn insert_array(
        &mut self,
        path: &DataArrayPath,
        mut array: DataArray,
    ) -> Result<Option<Arc<DataArray>>, StoreError> {
        self.check_array_parent(path)?;
        if !array.is_well_formed() {
            return Err(StoreError::InvalidShape {
                path: path.clone(),
                len: array.len(),
                components: array.num_components,
            });
        }
        array.name = path.array.clone();
        let am = self.attribute_matrix_mut(path)?;
        let previous = am.arrays.insert(path.array.clone(), Arc::new(array));
        if previous.is_some() {
            log::debug!("replaced array '{path}'");
        }
        Ok(previous)
    }

    /// Create a new array sized to its matrix's tuple count.
    pub fn create_data_array(
        &mut self,
        path: &DataArrayPath,
        ty: ScalarType,
        num_components: usize,
        init: &Initialization,
    ) -> Result<Arc<DataArray>, StoreError> {
        self.check_array_parent(path)?;
        if num_components == 0 {
            return Err(StoreError::invalid(path, "component count must be at least 1"));
        }
        let am = self.attribute_matrix(path)?;
        if am.arrays.contains_key(&path.array) {
            return Err(StoreError::Duplicate(path.clone()));
        }
        let len = am.num_tuples() * num_components;
        let data = initialize(ty, len, init).ok_or_else(|| StoreError::InvalidInitValue {
            text: match init {
                Initialization::Manual(text) => text.clone(),
                Initialization::RandomRange { min, max, .. } => format!("{min}..{max}"),
            },
            ty,
        })?;
        self.insert_array(path, DataArray::new(path.array.clone(), num_components, data))?;
        self.resolve(path)
    }
}
