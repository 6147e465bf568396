//! Expression syntax tree.

use std::fmt;

/// Parsed calculator expression. Built once per invocation and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Reference to an array in the input scope, optionally narrowed to one
    /// component (`Name[k]`).
    Array {
        name: String,
        component: Option<usize>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

/// The built-in function library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sqrt,
    Ln,
    Log10,
    Exp,
    Floor,
    Ceil,
    Pow,
    /// `log(x, base)`
    Log,
    /// `root(x, n)`: the n-th root of x.
    Root,
    Min,
    Max,
    /// `atan2(y, x)`
    Atan2,
}

impl Function {
    pub const ALL: [Function; 19] = [
        Function::Abs,
        Function::Sin,
        Function::Cos,
        Function::Tan,
        Function::Asin,
        Function::Acos,
        Function::Atan,
        Function::Sqrt,
        Function::Ln,
        Function::Log10,
        Function::Exp,
        Function::Floor,
        Function::Ceil,
        Function::Pow,
        Function::Log,
        Function::Root,
        Function::Min,
        Function::Max,
        Function::Atan2,
    ];

    pub fn lookup(name: &str) -> Option<Function> {
        Function::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Sqrt => "sqrt",
            Function::Ln => "ln",
            Function::Log10 => "log10",
            Function::Exp => "exp",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Pow => "pow",
            Function::Log => "log",
            Function::Root => "root",
            Function::Min => "min",
            Function::Max => "max",
            Function::Atan2 => "atan2",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Function::Pow
            | Function::Log
            | Function::Root
            | Function::Min
            | Function::Max
            | Function::Atan2 => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Expr {
    /// Fully parenthesized form, useful for checking how an expression
    /// was grouped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{v}"),
            Expr::Array { name, component: None } => write!(f, "{name}"),
            Expr::Array { name, component: Some(k) } => write!(f, "{name}[{k}]"),
            Expr::Unary { op: UnaryOp::Neg, operand } => write!(f, "(-{operand})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
