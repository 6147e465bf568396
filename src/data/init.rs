use serde::{Deserialize, Serialize};

use super::model::{ArrayData, Coerced, Element, ScalarType};

// ---------------------------------------------------------------------------
// Initialization – how a freshly created array is filled
// ---------------------------------------------------------------------------

/// Fill policy for `create_data_array`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initialization {
    /// Every element is set to `text` parsed as the target type, e.g. `"37"`.
    Manual(String),
    /// Uniform values in `[min, max]`, truncated for integer types.
    RandomRange { min: f64, max: f64, seed: u64 },
}

/// Build `len` elements of type `ty` according to `init`.
/// Returns `None` when a manual value does not parse as `ty`.
pub fn initialize(ty: ScalarType, len: usize, init: &Initialization) -> Option<ArrayData> {
    match ty {
        ScalarType::Int8 => fill::<i8>(len, init),
        ScalarType::UInt8 => fill::<u8>(len, init),
        ScalarType::Int16 => fill::<i16>(len, init),
        ScalarType::UInt16 => fill::<u16>(len, init),
        ScalarType::Int32 => fill::<i32>(len, init),
        ScalarType::UInt32 => fill::<u32>(len, init),
        ScalarType::Int64 => fill::<i64>(len, init),
        ScalarType::UInt64 => fill::<u64>(len, init),
        ScalarType::Float => fill::<f32>(len, init),
        ScalarType::Double => fill::<f64>(len, init),
        ScalarType::Bool => fill::<bool>(len, init),
    }
}

fn fill<T: Element>(len: usize, init: &Initialization) -> Option<ArrayData> {
    let values = match init {
        Initialization::Manual(text) => vec![T::parse_text(text)?; len],
        Initialization::RandomRange { min, max, seed } => {
            let mut rng = RangeRng::new(*seed, *min, *max);
            (0..len)
                .map(|_| match T::coerce(rng.sample()) {
                    Coerced::Exact(x) | Coerced::Clamped(x) => x,
                })
                .collect()
        }
    };
    Some(T::wrap(values))
}

// ---------------------------------------------------------------------------
// RangeRng – seeded source for `RandomRange` fills
// ---------------------------------------------------------------------------

/// Uniform samples in `[lo, hi]` drawn from a xoshiro256** stream. The same
/// seed always reproduces the same array, so stores built from a random fill
/// can be regenerated exactly.
struct RangeRng {
    state: [u64; 4],
    lo: f64,
    span: f64,
}

impl RangeRng {
    fn new(seed: u64, min: f64, max: f64) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let mut x = seed;
        let state = [(); 4].map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            x
        });
        RangeRng {
            state,
            lo,
            span: hi - lo,
        }
    }

    fn next_bits(&mut self) -> u64 {
        let [s0, s1, s2, s3] = &mut self.state;
        let out = s1.wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = *s1 << 17;
        *s2 ^= *s0;
        *s3 ^= *s1;
        *s1 ^= *s2;
        *s0 ^= *s3;
        *s2 ^= t;
        *s3 = s3.rotate_left(45);
        out
    }

    fn sample(&mut self) -> f64 {
        let unit = (self.next_bits() >> 11) as f64 / (1u64 << 53) as f64;
        self.lo + unit * self.span
    }
}
