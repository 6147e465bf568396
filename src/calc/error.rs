//! Fatal calculator errors and per-element warnings.

use std::fmt;

use thiserror::Error;

use crate::data::model::ScalarType;
use crate::data::store::StoreError;

/// A failure that aborts the calculator before the store is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("the expression is empty")]
    EmptyExpression,
    #[error("syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("'{name}' at position {position} is neither an array name nor a number")]
    UnknownIdentifier { name: String, position: usize },
    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },
    #[error("function '{name}' at position {position} takes {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        position: usize,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("array '{name}' has {found} tuples but '{reference}' has {expected}")]
    LengthMismatch {
        reference: String,
        expected: usize,
        name: String,
        found: usize,
    },
    #[error("'{name}' contributes {found} components but '{reference}' contributes {expected}")]
    ComponentMismatch {
        reference: String,
        expected: usize,
        name: String,
        found: usize,
    },
    #[error("component {component} of '{name}' is out of range ({num_components} components)")]
    ComponentOutOfRange {
        name: String,
        component: usize,
        num_components: usize,
    },
}

impl CalcError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        CalcError::Syntax {
            position,
            message: message.into(),
        }
    }

    /// Negative status code; store errors keep their own codes.
    pub fn code(&self) -> i32 {
        match self {
            CalcError::EmptyExpression => -4009,
            CalcError::Syntax { .. } => -4010,
            CalcError::UnknownIdentifier { .. } => -4011,
            CalcError::UnknownFunction { .. } => -4012,
            CalcError::ArityMismatch { .. } => -4013,
            CalcError::Store(e) => e.code(),
            CalcError::LengthMismatch { .. } => -4030,
            CalcError::ComponentMismatch { .. } => -4031,
            CalcError::ComponentOutOfRange { .. } => -4032,
        }
    }
}

/// Why an element did not receive its computed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WarningKind {
    DivideByZero,
    /// A function was applied outside its domain.
    InvalidDomain(&'static str),
    /// The computed value does not fit the output type.
    OutOfRange(ScalarType),
}

/// A non-fatal fault at one output element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalcWarning {
    /// Flat element index (`tuple * components + component`).
    pub index: usize,
    pub kind: WarningKind,
    /// Value stored in place of the computed one.
    pub substituted: f64,
}

impl fmt::Display for CalcWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            WarningKind::DivideByZero => write!(f, "element {}: division by zero", self.index)?,
            WarningKind::InvalidDomain(function) => {
                write!(f, "element {}: argument outside the domain of {function}", self.index)?
            }
            WarningKind::OutOfRange(ty) => {
                write!(f, "element {}: value not representable as {ty}", self.index)?
            }
        }
        write!(f, "; stored {}", self.substituted)
    }
}
