//! Abstract Syntax Tree node types

use serde::{Deserialize, Serialize};

use crate::types::Operator;

/// Expression AST node
///
/// Numerals keep their source text; conversion to `f64` happens at
/// evaluation time so a bad numeral is a semantic error, not a syntax error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t")]
pub enum Expr {
    Number {
        literal: String,
    },
    /// Unary minus, evaluated as `0 - operand`
    Negate {
        operand: Box<Expr>,
    },
    Binary {
        op: Operator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn number(literal: impl Into<String>) -> Self {
        Expr::Number {
            literal: literal.into(),
        }
    }

    pub fn negate(operand: Expr) -> Self {
        Expr::Negate {
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: Operator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `true` if the expression contains a binary operator, i.e. there is
    /// something to compute. A negated numeral such as `-5` is just a value.
    pub fn has_operator(&self) -> bool {
        let mut expr = self;
        while let Expr::Negate { operand } = expr {
            expr = operand.as_ref();
        }
        matches!(expr, Expr::Binary { .. })
    }
}

/// Lexical token, as produced by [`super::tokenize`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Token {
    Number(String),
    Operator(Operator),
    /// A `-` in operand position
    Negate,
    LParen,
    RParen,
}
