use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ScalarType – the closed set of element types an array can hold
// ---------------------------------------------------------------------------

/// Element type of a [`DataArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Bool,
}

impl ScalarType {
    pub const ALL: [ScalarType; 11] = [
        ScalarType::Int8,
        ScalarType::UInt8,
        ScalarType::Int16,
        ScalarType::UInt16,
        ScalarType::Int32,
        ScalarType::UInt32,
        ScalarType::Int64,
        ScalarType::UInt64,
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::Bool,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int8 => "int8",
            ScalarType::UInt8 => "uint8",
            ScalarType::Int16 => "int16",
            ScalarType::UInt16 => "uint16",
            ScalarType::Int32 => "int32",
            ScalarType::UInt32 => "uint32",
            ScalarType::Int64 => "int64",
            ScalarType::UInt64 => "uint64",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::Bool => "bool",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Error)]
#[error("unknown scalar type '{0}'")]
pub struct UnknownScalarType(pub String);

impl FromStr for ScalarType {
    type Err = UnknownScalarType;

    /// Accepts the canonical names (`uint32`) and the Rust spellings (`u32`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "int8" | "i8" => ScalarType::Int8,
            "uint8" | "u8" => ScalarType::UInt8,
            "int16" | "i16" => ScalarType::Int16,
            "uint16" | "u16" => ScalarType::UInt16,
            "int32" | "i32" => ScalarType::Int32,
            "uint32" | "u32" => ScalarType::UInt32,
            "int64" | "i64" => ScalarType::Int64,
            "uint64" | "u64" => ScalarType::UInt64,
            "float" | "float32" | "f32" => ScalarType::Float,
            "double" | "float64" | "f64" => ScalarType::Double,
            "bool" | "boolean" => ScalarType::Bool,
            _ => return Err(UnknownScalarType(s.to_string())),
        };
        Ok(ty)
    }
}

// ---------------------------------------------------------------------------
// Element – per-type conversion hooks used by generic code
// ---------------------------------------------------------------------------

/// Result of converting an `f64` into a concrete element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
    /// The value is representable (integers truncated toward zero).
    Exact(T),
    /// The value was outside the type's domain and was replaced by a bound
    /// (or zero for NaN).
    Clamped(T),
}

/// A Rust type that can be stored in an [`ArrayData`].
pub trait Element: Copy + Send + Sync + 'static {
    const SCALAR_TYPE: ScalarType;

    fn to_f64(self) -> f64;

    fn coerce(value: f64) -> Coerced<Self>;

    fn parse_text(text: &str) -> Option<Self>;

    fn wrap(values: Vec<Self>) -> ArrayData;
}

macro_rules! impl_int_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl Element for $ty {
            const SCALAR_TYPE: ScalarType = ScalarType::$variant;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn coerce(value: f64) -> Coerced<Self> {
                if value.is_nan() {
                    return Coerced::Clamped(0);
                }
                let truncated = value.trunc();
                // MIN is exact in f64; MAX + 1 is a power of two, exact as
                // well, while MAX itself rounds up for 64-bit types.
                if truncated < <$ty>::MIN as f64 {
                    Coerced::Clamped(<$ty>::MIN)
                } else if truncated >= <$ty>::MAX as f64 + 1.0 {
                    Coerced::Clamped(<$ty>::MAX)
                } else {
                    Coerced::Exact(truncated as $ty)
                }
            }

            fn parse_text(text: &str) -> Option<Self> {
                text.trim().parse::<$ty>().ok()
            }

            fn wrap(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }
        }
    )*};
}

impl_int_element!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
);

impl Element for f32 {
    const SCALAR_TYPE: ScalarType = ScalarType::Float;

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn coerce(value: f64) -> Coerced<Self> {
        if value.is_finite() && value.abs() > f32::MAX as f64 {
            Coerced::Clamped(if value > 0.0 { f32::MAX } else { f32::MIN })
        } else {
            Coerced::Exact(value as f32)
        }
    }

    fn parse_text(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }

    fn wrap(values: Vec<Self>) -> ArrayData {
        ArrayData::Float(values)
    }
}

impl Element for f64 {
    const SCALAR_TYPE: ScalarType = ScalarType::Double;

    fn to_f64(self) -> f64 {
        self
    }

    fn coerce(value: f64) -> Coerced<Self> {
        Coerced::Exact(value)
    }

    fn parse_text(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }

    fn wrap(values: Vec<Self>) -> ArrayData {
        ArrayData::Double(values)
    }
}

impl Element for bool {
    const SCALAR_TYPE: ScalarType = ScalarType::Bool;

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn coerce(value: f64) -> Coerced<Self> {
        if value.is_nan() {
            Coerced::Clamped(false)
        } else {
            Coerced::Exact(value != 0.0)
        }
    }

    fn parse_text(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    fn wrap(values: Vec<Self>) -> ArrayData {
        ArrayData::Bool(values)
    }
}

// ---------------------------------------------------------------------------
// ArrayData – homogeneously typed storage
// ---------------------------------------------------------------------------

/// Flat element storage, one variant per [`ScalarType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values")]
pub enum ArrayData {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
}

/// Run `$body` with `$values` bound to the typed vector inside `$data`.
macro_rules! with_values {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            ArrayData::Int8($values) => $body,
            ArrayData::UInt8($values) => $body,
            ArrayData::Int16($values) => $body,
            ArrayData::UInt16($values) => $body,
            ArrayData::Int32($values) => $body,
            ArrayData::UInt32($values) => $body,
            ArrayData::Int64($values) => $body,
            ArrayData::UInt64($values) => $body,
            ArrayData::Float($values) => $body,
            ArrayData::Double($values) => $body,
            ArrayData::Bool($values) => $body,
        }
    };
}

impl ArrayData {
    /// Zero-filled storage (`false` for booleans).
    pub fn zeros(ty: ScalarType, len: usize) -> Self {
        match ty {
            ScalarType::Int8 => ArrayData::Int8(vec![0; len]),
            ScalarType::UInt8 => ArrayData::UInt8(vec![0; len]),
            ScalarType::Int16 => ArrayData::Int16(vec![0; len]),
            ScalarType::UInt16 => ArrayData::UInt16(vec![0; len]),
            ScalarType::Int32 => ArrayData::Int32(vec![0; len]),
            ScalarType::UInt32 => ArrayData::UInt32(vec![0; len]),
            ScalarType::Int64 => ArrayData::Int64(vec![0; len]),
            ScalarType::UInt64 => ArrayData::UInt64(vec![0; len]),
            ScalarType::Float => ArrayData::Float(vec![0.0; len]),
            ScalarType::Double => ArrayData::Double(vec![0.0; len]),
            ScalarType::Bool => ArrayData::Bool(vec![false; len]),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ArrayData::Int8(_) => ScalarType::Int8,
            ArrayData::UInt8(_) => ScalarType::UInt8,
            ArrayData::Int16(_) => ScalarType::Int16,
            ArrayData::UInt16(_) => ScalarType::UInt16,
            ArrayData::Int32(_) => ScalarType::Int32,
            ArrayData::UInt32(_) => ScalarType::UInt32,
            ArrayData::Int64(_) => ScalarType::Int64,
            ArrayData::UInt64(_) => ScalarType::UInt64,
            ArrayData::Float(_) => ScalarType::Float,
            ArrayData::Double(_) => ScalarType::Double,
            ArrayData::Bool(_) => ScalarType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        with_values!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index` widened to `f64`. Panics when out of bounds, like slice
    /// indexing.
    pub fn value(&self, index: usize) -> f64 {
        with_values!(self, values => values[index].to_f64())
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_values!(self, values => values.iter().map(|v| v.to_f64()).collect())
    }

    /// Element `index` in its native textual form (`37`, `0.5`, `true`).
    pub fn display_value(&self, index: usize) -> String {
        with_values!(self, values => values[index].to_string())
    }

    /// Append `other` when both hold the same element type.
    pub fn append(&mut self, other: ArrayData) -> bool {
        macro_rules! append_same {
            ($($variant:ident),*) => {
                match (self, other) {
                    $((ArrayData::$variant(a), ArrayData::$variant(b)) => {
                        a.extend(b);
                        true
                    })*
                    _ => false,
                }
            };
        }
        append_same!(Int8, UInt8, Int16, UInt16, Int32, UInt32, Int64, UInt64, Float, Double, Bool)
    }
}

// ---------------------------------------------------------------------------
// DataArray – a named array with a component count
// ---------------------------------------------------------------------------

/// A named attribute array. Elements are stored tuple-major:
/// `data[tuple * num_components + component]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArray {
    pub name: String,
    pub num_components: usize,
    pub data: ArrayData,
}

impl DataArray {
    pub fn new(name: impl Into<String>, num_components: usize, data: ArrayData) -> Self {
        DataArray {
            name: name.into(),
            num_components,
            data,
        }
    }

    /// Zero-filled array of `num_tuples × num_components` elements.
    pub fn zeros(
        name: impl Into<String>,
        ty: ScalarType,
        num_tuples: usize,
        num_components: usize,
    ) -> Self {
        DataArray::new(
            name,
            num_components,
            ArrayData::zeros(ty, num_tuples * num_components),
        )
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.data.scalar_type()
    }

    /// Total number of elements (tuples × components).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn num_tuples(&self) -> usize {
        if self.num_components == 0 {
            0
        } else {
            self.data.len() / self.num_components
        }
    }

    /// Whether the storage length agrees with the component count.
    pub fn is_well_formed(&self) -> bool {
        self.num_components > 0 && self.data.len() % self.num_components == 0
    }

    pub fn value(&self, index: usize) -> f64 {
        self.data.value(index)
    }
}

// ---------------------------------------------------------------------------
// DataArrayPath – container / matrix / array addressing
// ---------------------------------------------------------------------------

/// Three-level address of an array. An empty `array` segment designates the
/// attribute matrix itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataArrayPath {
    pub container: String,
    pub matrix: String,
    #[serde(default)]
    pub array: String,
}

impl DataArrayPath {
    pub fn new(
        container: impl Into<String>,
        matrix: impl Into<String>,
        array: impl Into<String>,
    ) -> Self {
        DataArrayPath {
            container: container.into(),
            matrix: matrix.into(),
            array: array.into(),
        }
    }

    /// The same path with the array segment cleared.
    pub fn matrix_path(&self) -> DataArrayPath {
        DataArrayPath::new(self.container.clone(), self.matrix.clone(), "")
    }

    /// Replace the array segment.
    pub fn with_array(&self, array: impl Into<String>) -> DataArrayPath {
        DataArrayPath::new(self.container.clone(), self.matrix.clone(), array)
    }

    pub fn has_array(&self) -> bool {
        !self.array.is_empty()
    }
}

impl fmt::Display for DataArrayPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.container, self.matrix, self.array)
    }
}

#[derive(Debug, Clone, Error)]
#[error("invalid data array path '{0}': expected container/matrix[/array]")]
pub struct InvalidPathSyntax(pub String);

impl FromStr for DataArrayPath {
    type Err = InvalidPathSyntax;

    /// Parses `container/matrix`, `container/matrix/` or
    /// `container/matrix/array`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [container, matrix] | [container, matrix, ""]
                if !container.is_empty() && !matrix.is_empty() =>
            {
                Ok(DataArrayPath::new(*container, *matrix, ""))
            }
            [container, matrix, array] if !container.is_empty() && !matrix.is_empty() => {
                Ok(DataArrayPath::new(*container, *matrix, *array))
            }
            _ => Err(InvalidPathSyntax(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// AttributeMatrix / DataContainer – the store's scopes
// ---------------------------------------------------------------------------

/// What the tuples of an attribute matrix describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeMatrixType {
    Vertex,
    Edge,
    Face,
    Cell,
    Feature,
    Ensemble,
    Generic,
}

/// A group of arrays sharing a nominal tuple geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMatrix {
    pub name: String,
    pub matrix_type: AttributeMatrixType,
    /// Tuple dimensions, e.g. `[4, 5, 6]` for a 4×5×6 cell grid.
    pub tuple_dims: Vec<usize>,
    pub arrays: BTreeMap<String, Arc<DataArray>>,
}

impl AttributeMatrix {
    pub fn new(
        name: impl Into<String>,
        matrix_type: AttributeMatrixType,
        tuple_dims: Vec<usize>,
    ) -> Self {
        AttributeMatrix {
            name: name.into(),
            matrix_type,
            tuple_dims,
            arrays: BTreeMap::new(),
        }
    }

    /// Product of the tuple dimensions (0 when there are none).
    pub fn num_tuples(&self) -> usize {
        if self.tuple_dims.is_empty() {
            0
        } else {
            self.tuple_dims.iter().product()
        }
    }

    pub fn array(&self, name: &str) -> Option<&Arc<DataArray>> {
        self.arrays.get(name)
    }

    pub fn array_names(&self) -> Vec<String> {
        self.arrays.keys().cloned().collect()
    }
}

/// Top-level named scope holding attribute matrices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataContainer {
    pub name: String,
    pub matrices: BTreeMap<String, AttributeMatrix>,
}

impl DataContainer {
    pub fn new(name: impl Into<String>) -> Self {
        DataContainer {
            name: name.into(),
            matrices: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_type_names_parse_back() {
        for ty in ScalarType::ALL {
            assert_eq!(ty.name().parse::<ScalarType>().unwrap(), ty);
        }
        assert_eq!("U32".parse::<ScalarType>().unwrap(), ScalarType::UInt32);
        assert!("complex".parse::<ScalarType>().is_err());
    }

    #[test]
    fn integer_coercion_truncates_and_clamps() {
        assert_eq!(<u32 as Element>::coerce(11621.18), Coerced::Exact(11621));
        assert_eq!(<i32 as Element>::coerce(-3.9), Coerced::Exact(-3));
        assert_eq!(<u8 as Element>::coerce(300.0), Coerced::Clamped(255));
        assert_eq!(<u8 as Element>::coerce(-1.0), Coerced::Clamped(0));
        assert_eq!(<i16 as Element>::coerce(f64::NAN), Coerced::Clamped(0));
        assert_eq!(<u16 as Element>::coerce(-0.5), Coerced::Exact(0));
    }

    #[test]
    fn wide_integer_bounds() {
        let two_63 = 9_223_372_036_854_775_808.0;
        let two_64 = 18_446_744_073_709_551_616.0;
        assert_eq!(<i64 as Element>::coerce(two_63), Coerced::Clamped(i64::MAX));
        assert_eq!(<i64 as Element>::coerce(-two_63), Coerced::Exact(i64::MIN));
        assert_eq!(<u64 as Element>::coerce(two_64), Coerced::Clamped(u64::MAX));
        assert_eq!(<u64 as Element>::coerce(two_63), Coerced::Exact(1u64 << 63));
        assert_eq!(<i32 as Element>::coerce(2_147_483_647.9), Coerced::Exact(i32::MAX));
        assert_eq!(<i32 as Element>::coerce(2_147_483_648.0), Coerced::Clamped(i32::MAX));
    }

    #[test]
    fn float_and_bool_coercion() {
        assert_eq!(<f32 as Element>::coerce(1e300), Coerced::Clamped(f32::MAX));
        assert_eq!(<f32 as Element>::coerce(f64::INFINITY), Coerced::Exact(f32::INFINITY));
        assert_eq!(<bool as Element>::coerce(2.5), Coerced::Exact(true));
        assert_eq!(<bool as Element>::coerce(0.0), Coerced::Exact(false));
    }

    #[test]
    fn array_shape_helpers() {
        let arr = DataArray::new("Euler", 3, ArrayData::Float(vec![0.0; 12]));
        assert_eq!(arr.num_tuples(), 4);
        assert!(arr.is_well_formed());
        assert_eq!(arr.scalar_type(), ScalarType::Float);

        let ragged = DataArray::new("Bad", 3, ArrayData::Int8(vec![0; 4]));
        assert!(!ragged.is_well_formed());
    }

    #[test]
    fn path_parsing() {
        let p: DataArrayPath = "ImageDataContainer/CellAttributeMatrix/Output".parse().unwrap();
        assert_eq!(p, DataArrayPath::new("ImageDataContainer", "CellAttributeMatrix", "Output"));
        let scope: DataArrayPath = "A/B/".parse().unwrap();
        assert!(!scope.has_array());
        assert_eq!(scope, "A/B".parse().unwrap());
        assert!("A".parse::<DataArrayPath>().is_err());
        assert!("/B/C".parse::<DataArrayPath>().is_err());
        assert_eq!(p.to_string(), "ImageDataContainer/CellAttributeMatrix/Output");
    }

    #[test]
    fn matrix_tuple_count_is_dim_product() {
        let am = AttributeMatrix::new("Cell", AttributeMatrixType::Cell, vec![4, 5, 6]);
        assert_eq!(am.num_tuples(), 120);
        let empty = AttributeMatrix::new("Meta", AttributeMatrixType::Generic, vec![]);
        assert_eq!(empty.num_tuples(), 0);
    }
}
