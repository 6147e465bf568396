//! Binding and element-wise evaluation.
//!
//! Evaluation happens in two steps. [`bind`] checks the parsed tree against
//! the resolved arrays (existence, tuple counts, component counts) and lowers
//! it into a [`Plan`]. [`Plan::evaluate`] then computes every output element
//! in `f64`. Numeric faults at one element replace that element with 0 and
//! are reported as warnings; they never abort the evaluation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ast::{BinaryOp, Expr, Function, UnaryOp};
use super::error::{CalcError, CalcWarning, WarningKind};
use crate::data::model::{DataArray, DataArrayPath};
use crate::data::store::StoreError;

/// Element count from which evaluation is spread over the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 1 << 15;

const CHUNK_LEN: usize = 4096;

// ---------------------------------------------------------------------------
// AngleUnit
// ---------------------------------------------------------------------------

/// Unit of trigonometric arguments and inverse-trigonometric results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AngleUnit {
    Degrees,
    #[default]
    Radians,
}

impl AngleUnit {
    pub fn to_radians(self, angle: f64) -> f64 {
        match self {
            AngleUnit::Degrees => angle.to_radians(),
            AngleUnit::Radians => angle,
        }
    }

    pub fn from_radians(self, radians: f64) -> f64 {
        match self {
            AngleUnit::Degrees => radians.to_degrees(),
            AngleUnit::Radians => radians,
        }
    }
}

impl fmt::Display for AngleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AngleUnit::Degrees => f.write_str("degrees"),
            AngleUnit::Radians => f.write_str("radians"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("unknown angle unit '{0}': expected degrees or radians")]
pub struct UnknownAngleUnit(pub String);

impl FromStr for AngleUnit {
    type Err = UnknownAngleUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrees" | "degree" | "deg" => Ok(AngleUnit::Degrees),
            "radians" | "radian" | "rad" => Ok(AngleUnit::Radians),
            _ => Err(UnknownAngleUnit(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Bindings – arrays resolved for one invocation
// ---------------------------------------------------------------------------

/// The arrays an expression may read, keyed by name. Holds its own `Arc`s so
/// the store can be modified while a plan is alive.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    scope: DataArrayPath,
    arrays: BTreeMap<String, Arc<DataArray>>,
}

impl Bindings {
    pub fn new(scope: DataArrayPath) -> Self {
        Bindings {
            scope: scope.matrix_path(),
            arrays: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, array: Arc<DataArray>) {
        self.arrays.insert(name.into(), array);
    }

    pub fn get(&self, name: &str) -> Result<&DataArray, CalcError> {
        self.arrays
            .get(name)
            .map(|a| a.as_ref())
            .ok_or_else(|| StoreError::NotFound(self.scope.with_array(name)).into())
    }
}

// ---------------------------------------------------------------------------
// Plan – a bound, shape-checked expression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Access {
    /// Single-element array broadcast to every output element.
    Scalar,
    /// Same shape as the output: element `i` maps to `i`.
    Element,
    /// One component of a wider array.
    Component { component: usize, stride: usize },
}

#[derive(Debug)]
enum Node<'a> {
    Const(f64),
    Ref { array: &'a DataArray, access: Access },
    Neg(Box<Node<'a>>),
    Binary(BinaryOp, Box<Node<'a>>, Box<Node<'a>>),
    Call(Function, Vec<Node<'a>>),
}

/// Evaluable form of an expression with its output shape.
#[derive(Debug)]
pub struct Plan<'a> {
    root: Node<'a>,
    num_tuples: usize,
    num_components: usize,
}

/// Output of [`Plan::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub values: Vec<f64>,
    pub num_tuples: usize,
    pub num_components: usize,
    pub warnings: Vec<CalcWarning>,
}

/// Shape constraint recorded while walking the tree: the first array that
/// fixed the value, and the value.
type Pin = Option<(String, usize)>;

/// Check `expr` against `bindings` and lower it.
///
/// Non-scalar operands must agree on tuple count and on the number of
/// components they contribute (1 for `Name[k]`). An expression with no
/// non-scalar operand produces `default_tuples` single-component tuples.
pub fn bind<'a>(
    expr: &Expr,
    bindings: &'a Bindings,
    default_tuples: usize,
) -> Result<Plan<'a>, CalcError> {
    let mut tuples: Pin = None;
    let mut components: Pin = None;
    let root = lower(expr, bindings, &mut tuples, &mut components)?;
    let plan = Plan {
        root,
        num_tuples: tuples.map(|(_, n)| n).unwrap_or(default_tuples),
        num_components: components.map(|(_, n)| n).unwrap_or(1),
    };
    log::debug!(
        "bound expression: {} tuples × {} components",
        plan.num_tuples,
        plan.num_components
    );
    Ok(plan)
}

fn lower<'a>(
    expr: &Expr,
    bindings: &'a Bindings,
    tuples: &mut Pin,
    components: &mut Pin,
) -> Result<Node<'a>, CalcError> {
    let node = match expr {
        Expr::Number(v) => Node::Const(*v),
        Expr::Array { name, component } => {
            let array = bindings.get(name)?;
            if let Some(k) = *component {
                if k >= array.num_components {
                    return Err(CalcError::ComponentOutOfRange {
                        name: name.clone(),
                        component: k,
                        num_components: array.num_components,
                    });
                }
            }
            let access = if array.len() == 1 {
                Access::Scalar
            } else {
                pin(tuples, name, array.num_tuples()).map_err(|(reference, expected)| {
                    CalcError::LengthMismatch {
                        reference,
                        expected,
                        name: name.clone(),
                        found: array.num_tuples(),
                    }
                })?;
                let contributed = if component.is_some() { 1 } else { array.num_components };
                pin(components, name, contributed).map_err(|(reference, expected)| {
                    CalcError::ComponentMismatch {
                        reference,
                        expected,
                        name: name.clone(),
                        found: contributed,
                    }
                })?;
                match component {
                    Some(k) => Access::Component {
                        component: *k,
                        stride: array.num_components,
                    },
                    None => Access::Element,
                }
            };
            Node::Ref { array, access }
        }
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Node::Neg(Box::new(lower(operand, bindings, tuples, components)?)),
        Expr::Binary { op, lhs, rhs } => Node::Binary(
            *op,
            Box::new(lower(lhs, bindings, tuples, components)?),
            Box::new(lower(rhs, bindings, tuples, components)?),
        ),
        Expr::Call { function, args } => Node::Call(
            *function,
            args.iter()
                .map(|arg| lower(arg, bindings, tuples, components))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(node)
}

/// Record `value` in an unset slot, or check it against the pinned one.
/// On mismatch returns the array that pinned the slot and its value.
fn pin(slot: &mut Pin, name: &str, value: usize) -> Result<(), (String, usize)> {
    match *slot {
        Some((ref reference, expected)) if expected != value => Err((reference.clone(), expected)),
        Some(_) => Ok(()),
        None => {
            *slot = Some((name.to_string(), value));
            Ok(())
        }
    }
}

impl Plan<'_> {
    pub fn num_tuples(&self) -> usize {
        self.num_tuples
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// Number of output elements.
    pub fn len(&self) -> usize {
        self.num_tuples * self.num_components
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute every output element. Results and warnings are identical
    /// whether or not the work is split across threads.
    pub fn evaluate(&self, unit: AngleUnit) -> Evaluation {
        let mut values = vec![0.0; self.len()];
        let warnings = if values.len() >= PARALLEL_THRESHOLD {
            let per_chunk: Vec<Vec<CalcWarning>> = values
                .par_chunks_mut(CHUNK_LEN)
                .enumerate()
                .map(|(n, chunk)| self.fill(n * CHUNK_LEN, chunk, unit))
                .collect();
            per_chunk.into_iter().flatten().collect()
        } else {
            self.fill(0, &mut values, unit)
        };
        Evaluation {
            values,
            num_tuples: self.num_tuples,
            num_components: self.num_components,
            warnings,
        }
    }

    fn fill(&self, start: usize, out: &mut [f64], unit: AngleUnit) -> Vec<CalcWarning> {
        let mut warnings = Vec::new();
        for (offset, slot) in out.iter_mut().enumerate() {
            let index = start + offset;
            match self.eval_at(&self.root, index, unit) {
                Ok(v) => *slot = v,
                Err(kind) => {
                    *slot = 0.0;
                    warnings.push(CalcWarning {
                        index,
                        kind,
                        substituted: 0.0,
                    });
                }
            }
        }
        warnings
    }

    fn eval_at(&self, node: &Node<'_>, index: usize, unit: AngleUnit) -> Result<f64, WarningKind> {
        match node {
            Node::Const(v) => Ok(*v),
            Node::Ref { array, access } => Ok(match *access {
                Access::Scalar => array.value(0),
                Access::Element => array.value(index),
                Access::Component { component, stride } => {
                    array.value((index / self.num_components) * stride + component)
                }
            }),
            Node::Neg(operand) => Ok(-self.eval_at(operand, index, unit)?),
            Node::Binary(op, lhs, rhs) => {
                let a = self.eval_at(lhs, index, unit)?;
                let b = self.eval_at(rhs, index, unit)?;
                binary(*op, a, b)
            }
            Node::Call(function, args) => {
                let mut values = [0.0; 2];
                for (slot, arg) in values.iter_mut().zip(args) {
                    *slot = self.eval_at(arg, index, unit)?;
                }
                apply(*function, &values[..args.len()], unit)
            }
        }
    }
}

fn binary(op: BinaryOp, a: f64, b: f64) -> Result<f64, WarningKind> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div => {
            if b == 0.0 {
                Err(WarningKind::DivideByZero)
            } else {
                Ok(a / b)
            }
        }
        BinaryOp::Pow => power(a, b, "^"),
    }
}

fn power(a: f64, b: f64, name: &'static str) -> Result<f64, WarningKind> {
    let r = a.powf(b);
    if r.is_nan() && !a.is_nan() && !b.is_nan() {
        Err(WarningKind::InvalidDomain(name))
    } else {
        Ok(r)
    }
}

/// Apply a library function. NaN arguments propagate without a warning.
fn apply(function: Function, args: &[f64], unit: AngleUnit) -> Result<f64, WarningKind> {
    let domain = Err(WarningKind::InvalidDomain(function.name()));
    let a = args[0];
    let b = args.get(1).copied().unwrap_or(0.0);
    let value = match function {
        Function::Abs => a.abs(),
        Function::Sin => unit.to_radians(a).sin(),
        Function::Cos => unit.to_radians(a).cos(),
        Function::Tan => unit.to_radians(a).tan(),
        Function::Asin | Function::Acos if a.abs() > 1.0 => return domain,
        Function::Asin => unit.from_radians(a.asin()),
        Function::Acos => unit.from_radians(a.acos()),
        Function::Atan => unit.from_radians(a.atan()),
        Function::Atan2 => unit.from_radians(a.atan2(b)),
        Function::Sqrt if a < 0.0 => return domain,
        Function::Sqrt => a.sqrt(),
        Function::Ln | Function::Log10 if a <= 0.0 => return domain,
        Function::Ln => a.ln(),
        Function::Log10 => a.log10(),
        Function::Log if a <= 0.0 || b <= 0.0 || b == 1.0 => return domain,
        Function::Log => a.ln() / b.ln(),
        Function::Exp => a.exp(),
        Function::Floor => a.floor(),
        Function::Ceil => a.ceil(),
        Function::Pow => return power(a, b, "pow"),
        Function::Root => return root(a, b),
        Function::Min => a.min(b),
        Function::Max => a.max(b),
    };
    Ok(value)
}

/// `n`-th root of `x`; odd integer roots of negative numbers are real.
fn root(x: f64, n: f64) -> Result<f64, WarningKind> {
    if n == 0.0 {
        return Err(WarningKind::DivideByZero);
    }
    if x < 0.0 {
        let odd_integer = n.fract() == 0.0 && n.rem_euclid(2.0) == 1.0;
        if !odd_integer {
            return Err(WarningKind::InvalidDomain("root"));
        }
        return Ok(-(-x).powf(1.0 / n));
    }
    Ok(x.powf(1.0 / n))
}
