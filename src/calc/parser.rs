//! Recursive-descent parser for calculator expressions.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?
//! primary := NUMBER
//!          | IDENT '(' expr (',' expr)* ')'
//!          | (IDENT | QUOTED) ('[' NUMBER ']')?
//!          | '(' expr ')'
//! ```

use std::collections::BTreeSet;
use std::f64::consts;

use super::ast::{BinaryOp, Expr, Function, UnaryOp};
use super::error::CalcError;
use super::lexer::{tokenize, Spanned, Token};

/// Deepest tree the parser will build. Counts nested parentheses, calls and
/// signs, plus operators chained at one level, since each adds a level to
/// the tree that evaluation walks recursively.
pub const MAX_DEPTH: usize = 256;

/// Result of parsing: the tree plus the arrays it references, in order of
/// first appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub expr: Expr,
    pub arrays: Vec<String>,
}

/// Parse `src`. `array_names` are the arrays visible in the input scope; they
/// take priority over constants and numeric readings of the same word.
/// References to names outside that set are kept and fail later, when they
/// are bound against the store.
pub fn parse(src: &str, array_names: &BTreeSet<String>) -> Result<Parsed, CalcError> {
    if src.trim().is_empty() {
        return Err(CalcError::EmptyExpression);
    }
    let tokens = tokenize(src, array_names)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
        depth: 0,
        names: array_names,
        arrays: Vec::new(),
    };
    let expr = parser.expr()?;
    if let Some(tok) = parser.peek() {
        let message = match tok.token {
            Token::RParen => "unmatched ')'".to_string(),
            ref other => format!("unexpected {}", other.describe()),
        };
        return Err(CalcError::syntax(tok.position, message));
    }
    log::debug!("parsed '{src}' as {expr}");
    Ok(Parsed {
        expr,
        arrays: parser.arrays,
    })
}

struct Parser<'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
    names: &'a BTreeSet<String>,
    arrays: Vec<String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Position of the next token, or the end of the source.
    fn here(&self) -> usize {
        self.peek().map(|s| s.position).unwrap_or(self.end)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Go one level deeper, failing past [`MAX_DEPTH`].
    fn enter(&mut self) -> Result<(), CalcError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::syntax(self.here(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, CalcError> {
        let depth = self.depth;
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => {
                    self.depth = depth;
                    return Ok(lhs);
                }
            };
            self.enter()?;
            self.pos += 1;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, CalcError> {
        let depth = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => {
                    self.depth = depth;
                    return Ok(lhs);
                }
            };
            self.enter()?;
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, CalcError> {
        self.enter()?;
        let expr = self.signed();
        self.depth -= 1;
        expr
    }

    fn signed(&mut self) -> Result<Expr, CalcError> {
        if self.eat(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, CalcError> {
        let base = self.primary()?;
        if self.eat(&Token::Caret) {
            // Right operand goes back through `unary`, so `2^-1` and
            // `2^3^2 == 2^(3^2)` both parse.
            let exponent = self.unary()?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, CalcError> {
        let position = self.here();
        let Some(Spanned { token, .. }) = self.next() else {
            return Err(CalcError::syntax(position, "expected an operand, found end of expression"));
        };
        match token {
            Token::Number(v) => Ok(Expr::Number(v)),
            Token::LParen => {
                let inner = self.expr()?;
                if !self.eat(&Token::RParen) {
                    return Err(CalcError::syntax(
                        self.here(),
                        format!("missing ')' for '(' at position {position}"),
                    ));
                }
                Ok(inner)
            }
            Token::Quoted(name) => self.array_ref(name),
            Token::Ident(name) => {
                if self.peek_token() == Some(&Token::LParen) {
                    return self.call(name, position);
                }
                if self.names.contains(&name) {
                    return self.array_ref(name);
                }
                match name.as_str() {
                    "pi" => Ok(Expr::Number(consts::PI)),
                    "e" => Ok(Expr::Number(consts::E)),
                    _ => self.array_ref(name),
                }
            }
            other => Err(CalcError::syntax(
                position,
                format!("expected an operand, found {}", other.describe()),
            )),
        }
    }

    fn array_ref(&mut self, name: String) -> Result<Expr, CalcError> {
        let component = if self.eat(&Token::LBracket) {
            let position = self.here();
            let index = match self.next().map(|s| s.token) {
                Some(Token::Number(v)) if v >= 0.0 && v.fract() == 0.0 => v as usize,
                _ => {
                    return Err(CalcError::syntax(
                        position,
                        "component index must be a non-negative integer",
                    ))
                }
            };
            if !self.eat(&Token::RBracket) {
                return Err(CalcError::syntax(self.here(), "missing ']'"));
            }
            Some(index)
        } else {
            None
        };
        if !self.arrays.contains(&name) {
            self.arrays.push(name.clone());
        }
        Ok(Expr::Array { name, component })
    }

    fn call(&mut self, name: String, position: usize) -> Result<Expr, CalcError> {
        let function = Function::lookup(&name).ok_or_else(|| CalcError::UnknownFunction {
            name: name.clone(),
            position,
        })?;
        let open = self.here();
        self.pos += 1; // '('
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expr()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                if self.eat(&Token::RParen) {
                    break;
                }
                return Err(CalcError::syntax(
                    self.here(),
                    format!("missing ')' for '(' at position {open}"),
                ));
            }
        }
        if args.len() != function.arity() {
            return Err(CalcError::ArityMismatch {
                name,
                position,
                expected: function.arity(),
                found: args.len(),
            });
        }
        Ok(Expr::Call { function, args })
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn shape(src: &str, known: &[&str]) -> String {
        parse(src, &names(known)).unwrap().expr.to_string()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(shape("1+2*3", &[]), "(1 + (2 * 3))");
        assert_eq!(shape("8/4/2", &[]), "((8 / 4) / 2)");
        assert_eq!(shape("1-2-3", &[]), "((1 - 2) - 3)");
        assert_eq!(shape("2^3^2", &[]), "(2 ^ (3 ^ 2))");
        assert_eq!(shape("-2^2", &[]), "(-(2 ^ 2))");
        assert_eq!(shape("2^-1", &[]), "(2 ^ (-1))");
        assert_eq!(shape("(1+2)*3", &[]), "((1 + 2) * 3)");
        assert_eq!(shape("+4", &[]), "4");
    }

    #[test]
    fn collects_referenced_arrays_once_in_order() {
        let parsed = parse("b*a + b[1] + sin(\"c d\")", &names(&["a", "b"])).unwrap();
        assert_eq!(parsed.arrays, vec!["b", "a", "c d"]);
    }

    #[test]
    fn functions_and_constants() {
        assert_eq!(shape("pow(x, 2)", &["x"]), "pow(x, 2)");
        assert_eq!(
            parse("pi", &names(&[])).unwrap().expr,
            Expr::Number(std::f64::consts::PI)
        );
        // An array named like a constant shadows it.
        assert_eq!(
            parse("pi", &names(&["pi"])).unwrap().expr,
            Expr::Array { name: "pi".into(), component: None }
        );
    }

    #[test]
    fn unknown_bare_names_stay_unresolved() {
        let parsed = parse("Missing*2", &names(&["Other"])).unwrap();
        assert_eq!(parsed.arrays, vec!["Missing"]);
    }

    #[test]
    fn component_index() {
        assert_eq!(
            parse("Euler[2]", &names(&["Euler"])).unwrap().expr,
            Expr::Array { name: "Euler".into(), component: Some(2) }
        );
        assert!(matches!(
            parse("Euler[1.5]", &names(&["Euler"])),
            Err(CalcError::Syntax { position: 6, .. })
        ));
        assert!(matches!(
            parse("Euler[1", &names(&["Euler"])),
            Err(CalcError::Syntax { .. })
        ));
    }

    #[test]
    fn syntax_errors_carry_positions() {
        assert_eq!(
            parse("3*", &names(&[])).unwrap_err(),
            CalcError::syntax(2, "expected an operand, found end of expression")
        );
        assert_eq!(
            parse("(1+2", &names(&[])).unwrap_err(),
            CalcError::syntax(4, "missing ')' for '(' at position 0")
        );
        assert_eq!(parse("1+2)", &names(&[])).unwrap_err(), CalcError::syntax(3, "unmatched ')'"));
        assert!(matches!(parse("2 3", &names(&[])), Err(CalcError::Syntax { position: 2, .. })));
        assert!(matches!(parse("*3", &names(&[])), Err(CalcError::Syntax { position: 0, .. })));
        assert!(matches!(parse("1.2.3", &names(&[])), Err(CalcError::Syntax { .. })));
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(shape(&deep(100), &[]), "1");
        assert!(matches!(
            parse(&deep(2000), &names(&[])),
            Err(CalcError::Syntax { ref message, .. }) if message == "expression nested too deeply"
        ));

        let signs = format!("{}1", "-".repeat(5000));
        assert!(matches!(parse(&signs, &names(&[])), Err(CalcError::Syntax { .. })));

        let calls = format!("{}x{}", "abs(".repeat(1000), ")".repeat(1000));
        assert!(matches!(parse(&calls, &names(&["x"])), Err(CalcError::Syntax { .. })));
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let sum = |n: usize| vec!["x"; n].join(" + ");
        assert!(parse(&sum(100), &names(&["x"])).is_ok());
        assert!(matches!(
            parse(&sum(MAX_DEPTH * 4), &names(&["x"])),
            Err(CalcError::Syntax { .. })
        ));
        // Depth is released between sibling groups.
        let groups = vec![format!("({})", sum(200)); 4].join(" * ");
        assert!(parse(&groups, &names(&["x"])).is_ok());
    }

    #[test]
    fn empty_expression() {
        assert_eq!(parse("   ", &names(&[])).unwrap_err(), CalcError::EmptyExpression);
    }

    #[test]
    fn function_errors() {
        assert_eq!(
            parse("frobnicate(1)", &names(&[])).unwrap_err(),
            CalcError::UnknownFunction { name: "frobnicate".into(), position: 0 }
        );
        assert_eq!(
            parse("1 + pow(2)", &names(&[])).unwrap_err(),
            CalcError::ArityMismatch { name: "pow".into(), position: 4, expected: 2, found: 1 }
        );
        assert!(matches!(
            parse("sin(1, 2)", &names(&[])),
            Err(CalcError::ArityMismatch { expected: 1, found: 2, .. })
        ));
        assert!(matches!(parse("sin(1", &names(&[])), Err(CalcError::Syntax { .. })));
    }
}
