//! PEST-based parser for arithmetic expressions
//!
//! Produces an [`Expr`] tree that the interpreter evaluates in one pass.
//! Precedence comes from the grammar levels (`additive_expr` over
//! `multiplicative_expr` over `unary_expr`); each level folds left to right.
//!
//! Input is bounded before and while building the tree: at most
//! [`MAX_NESTING`] levels of parentheses reach the grammar, and the finished
//! tree is at most [`MAX_DEPTH`] operators deep. Evaluation and drop are
//! recursive, so anything deeper is rejected as `ExpressionNotValid`.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::CalcError;
use crate::types::Operator;

pub mod ast;

pub use ast::{Expr, Token};


/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/calc.pest"]
struct CalcParser;

/* ===================== Error Types ===================== */

impl From<pest::error::Error<Rule>> for CalcError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        tracing::debug!(error = %err, "expression rejected by grammar");
        CalcError::ExpressionNotValid
    }
}

pub type ParseResult<T> = Result<T, CalcError>;

/// Maximum parenthesis nesting accepted by the grammar
pub const MAX_NESTING: usize = 64;

/// Maximum operator depth of a parsed tree
pub const MAX_DEPTH: usize = 1000;

/* ===================== Public API ===================== */

/// Strip every whitespace character from the input
pub fn clean(source: &str) -> String {
    source.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parse an expression into an AST
pub fn parse(source: &str) -> ParseResult<Expr> {
    let cleaned = clean(source);
    let mut pairs = parse_calculation(&cleaned)?;

    let calculation = pairs.next().ok_or(CalcError::ExpressionNotValid)?;

    // calculation = { SOI ~ expression ~ EOI }
    let expression = calculation
        .into_inner()
        .find(|p| p.as_rule() == Rule::expression)
        .ok_or(CalcError::ExpressionNotValid)?;

    let (expr, _depth) = build_expression(expression)?;
    Ok(expr)
}

/// Split an expression into its lexical tokens.
///
/// Shares the grammar with [`parse`], so anything that tokenizes is also
/// structurally valid. A `-` in operand position comes out as
/// [`Token::Negate`].
pub fn tokenize(source: &str) -> ParseResult<Vec<Token>> {
    let cleaned = clean(source);
    let pairs = parse_calculation(&cleaned)?;

    let tokens = pairs
        .flatten()
        .filter_map(|pair| match pair.as_rule() {
            Rule::number => Some(Token::Number(pair.as_str().to_string())),
            Rule::op_add => Some(Token::Operator(Operator::Add)),
            Rule::op_sub => Some(Token::Operator(Operator::Sub)),
            Rule::op_mul => Some(Token::Operator(Operator::Mul)),
            Rule::op_div => Some(Token::Operator(Operator::Div)),
            Rule::op_neg => Some(Token::Negate),
            Rule::lparen => Some(Token::LParen),
            Rule::rparen => Some(Token::RParen),
            _ => None,
        })
        .collect();

    Ok(tokens)
}

/* ===================== Nesting Guard ===================== */

/// Deepest parenthesis nesting in `source`, counting unmatched `(` too
fn nesting_depth(source: &str) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    for c in source.chars() {
        match c {
            '(' => {
                depth += 1;
                max = max.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

/// Run the grammar on cleaned input, refusing overly nested input first
fn parse_calculation(cleaned: &str) -> ParseResult<pest::iterators::Pairs<'_, Rule>> {
    let nesting = nesting_depth(cleaned);
    if nesting > MAX_NESTING {
        tracing::debug!(nesting, limit = MAX_NESTING, "expression nested too deeply");
        return Err(CalcError::ExpressionNotValid);
    }
    Ok(CalcParser::parse(Rule::calculation, cleaned)?)
}

/* ===================== AST Builder ===================== */

/// Built node and its operator depth (a numeral is depth 0)
type Built = (Expr, usize);

fn check_depth(depth: usize) -> ParseResult<usize> {
    if depth > MAX_DEPTH {
        tracing::debug!(depth, limit = MAX_DEPTH, "expression tree too deep");
        return Err(CalcError::ExpressionNotValid);
    }
    Ok(depth)
}

fn build_expression(pair: Pair<Rule>) -> ParseResult<Built> {
    match pair.as_rule() {
        Rule::expression => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or(CalcError::ExpressionNotValid)?;
            build_expression(inner)
        }
        Rule::additive_expr | Rule::multiplicative_expr => build_binary_expr(pair),
        Rule::unary_expr => build_unary_expr(pair),
        Rule::group => {
            // group = { lparen ~ expression ~ rparen }
            let inner = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::expression)
                .ok_or(CalcError::ExpressionNotValid)?;
            build_expression(inner)
        }
        Rule::number => Ok((Expr::number(pair.as_str()), 0)),
        _ => Err(CalcError::ExpressionNotValid),
    }
}

fn build_binary_expr(pair: Pair<Rule>) -> ParseResult<Built> {
    let inner_pairs: Vec<_> = pair.into_inner().collect();

    let first = inner_pairs
        .first()
        .cloned()
        .ok_or(CalcError::ExpressionNotValid)?;
    let (mut left, mut depth) = build_expression(first)?;

    let mut i = 1;
    while i < inner_pairs.len() {
        let op = match inner_pairs[i].as_rule() {
            Rule::op_add => Operator::Add,
            Rule::op_sub => Operator::Sub,
            Rule::op_mul => Operator::Mul,
            Rule::op_div => Operator::Div,
            _ => return Err(CalcError::ExpressionNotValid),
        };

        i += 1;
        let right_pair = inner_pairs
            .get(i)
            .cloned()
            .ok_or(CalcError::ExpressionNotValid)?;
        let (right, right_depth) = build_expression(right_pair)?;

        depth = check_depth(depth.max(right_depth) + 1)?;
        left = Expr::binary(op, left, right);
        i += 1;
    }

    Ok((left, depth))
}

/// Repeated minus signs collapse by parity: `--x` is `x`, `---x` is `-x`.
fn build_unary_expr(pair: Pair<Rule>) -> ParseResult<Built> {
    let mut negations = 0usize;
    let mut operand = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::op_neg => negations += 1,
            _ => operand = Some(build_expression(inner)?),
        }
    }

    let (expr, depth) = operand.ok_or(CalcError::ExpressionNotValid)?;
    if negations % 2 == 0 {
        return Ok((expr, depth));
    }
    Ok((Expr::negate(expr), check_depth(depth + 1)?))
}
