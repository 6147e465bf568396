//! Narrowing of evaluated `f64` values to the requested output type.

use crate::data::model::{ArrayData, Coerced, Element, ScalarType};

use super::error::{CalcWarning, WarningKind};

/// Convert `values` to storage of type `ty`. Integer targets truncate toward
/// zero; values outside the target's range are clamped to its bounds (NaN
/// becomes 0) and reported.
pub fn coerce_values(values: &[f64], ty: ScalarType) -> (ArrayData, Vec<CalcWarning>) {
    match ty {
        ScalarType::Int8 => coerce_slice::<i8>(values),
        ScalarType::UInt8 => coerce_slice::<u8>(values),
        ScalarType::Int16 => coerce_slice::<i16>(values),
        ScalarType::UInt16 => coerce_slice::<u16>(values),
        ScalarType::Int32 => coerce_slice::<i32>(values),
        ScalarType::UInt32 => coerce_slice::<u32>(values),
        ScalarType::Int64 => coerce_slice::<i64>(values),
        ScalarType::UInt64 => coerce_slice::<u64>(values),
        ScalarType::Float => coerce_slice::<f32>(values),
        ScalarType::Double => coerce_slice::<f64>(values),
        ScalarType::Bool => coerce_slice::<bool>(values),
    }
}

fn coerce_slice<T: Element>(values: &[f64]) -> (ArrayData, Vec<CalcWarning>) {
    let mut warnings = Vec::new();
    let converted: Vec<T> = values
        .iter()
        .enumerate()
        .map(|(index, &v)| match T::coerce(v) {
            Coerced::Exact(x) => x,
            Coerced::Clamped(x) => {
                warnings.push(CalcWarning {
                    index,
                    kind: WarningKind::OutOfRange(T::SCALAR_TYPE),
                    substituted: x.to_f64(),
                });
                x
            }
        })
        .collect();
    (T::wrap(converted), warnings)
}
