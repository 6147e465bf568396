//! Element-wise expression calculator over attribute arrays.
//!
//! ```text
//!   expression ──► lexer ──► parser ──► Expr + referenced names
//!                                           │
//!   store ──► Bindings (Arc<DataArray>) ────┤
//!                                           ▼
//!                                   eval::bind → Plan
//!                                           │  evaluate (f64, rayon above a threshold)
//!                                           ▼
//!                                   convert → ArrayData of the output type
//!                                           │
//!                                           ▼
//!                                store.insert_array(output_path)
//! ```

pub mod ast;
pub mod convert;
pub mod error;
pub mod eval;
pub mod filter;
pub mod lexer;
pub mod parser;

pub use error::{CalcError, CalcWarning, WarningKind};
pub use eval::{bind, AngleUnit, Bindings, Evaluation, Plan};
pub use filter::{array_calculator, ArrayCalculator, CalcReport, FilterStatus};
pub use parser::{parse, Parsed};
