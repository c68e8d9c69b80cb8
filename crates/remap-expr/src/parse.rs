//! Parser for the textual index-expression form.
//!
//! ```text
//! "i0 % 3"            -> Binary(Rem, Idx(0), Const(3))
//! "i1 < i0 + 1 && !0" -> And(Cmp(Lt, ..), Not(Const(0)))
//! ```

use std::str::FromStr;

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use remap_core::{Error, Result};

use crate::expr::{BinOp, CmpOp, Expr};

#[derive(Parser)]
#[grammar = "index.pest"]
struct IndexParser;

type ParseResult<T> = std::result::Result<T, String>;

impl Expr {
    /// Parse one index expression or overflow condition.
    pub fn parse(src: &str) -> Result<Expr> {
        let mut pairs = IndexParser::parse(Rule::index_expr, src)
            .map_err(|err| Error::invalid_expression(src, describe_pest_error(&err)))?;
        let root = next(&mut pairs, "expression")
            .and_then(|p| next(&mut p.into_inner(), "expression"))
            .and_then(parse_or)
            .map_err(|reason| Error::invalid_expression(src, reason))?;
        Ok(root)
    }
}

impl FromStr for Expr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Expr::parse(s)
    }
}

fn describe_pest_error(err: &pest::error::Error<Rule>) -> String {
    let (line, column) = match err.line_col {
        pest::error::LineColLocation::Pos((l, c)) => (l, c),
        pest::error::LineColLocation::Span((l, c), _) => (l, c),
    };
    let message = err.variant.message();
    if line > 1 {
        format!("{message} at line {line}, column {column}")
    } else {
        format!("{message} at column {column}")
    }
}

fn next<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> ParseResult<Pair<'i, Rule>> {
    pairs.next().ok_or_else(|| format!("missing {what}"))
}

fn parse_or(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let mut result = parse_and(next(&mut inner, "operand")?)?;
    while let Some(op_pair) = inner.next() {
        if op_pair.as_rule() != Rule::or_op {
            continue;
        }
        let rhs = parse_and(next(&mut inner, "operand after `||`")?)?;
        result = result.or(rhs);
    }
    Ok(result)
}

fn parse_and(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let mut result = parse_comparison(next(&mut inner, "operand")?)?;
    while let Some(op_pair) = inner.next() {
        if op_pair.as_rule() != Rule::and_op {
            continue;
        }
        let rhs = parse_comparison(next(&mut inner, "operand after `&&`")?)?;
        result = result.and(rhs);
    }
    Ok(result)
}

fn parse_comparison(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let lhs = parse_additive(next(&mut inner, "operand")?)?;
    let Some(op_pair) = inner.next() else {
        return Ok(lhs);
    };
    let op = match op_pair.as_str() {
        "==" => CmpOp::Eq,
        "!=" => CmpOp::Ne,
        "<" => CmpOp::Lt,
        "<=" => CmpOp::Le,
        ">" => CmpOp::Gt,
        ">=" => CmpOp::Ge,
        other => return Err(format!("unknown comparison `{other}`")),
    };
    let rhs = parse_additive(next(&mut inner, "right operand of comparison")?)?;
    Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
}

fn parse_additive(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let mut result = parse_multiplicative(next(&mut inner, "operand")?)?;
    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            other => return Err(format!("unknown operator `{other}`")),
        };
        let rhs = parse_multiplicative(next(&mut inner, "right operand")?)?;
        result = Expr::Binary(op, Box::new(result), Box::new(rhs));
    }
    Ok(result)
}

fn parse_multiplicative(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let mut result = parse_unary(next(&mut inner, "operand")?)?;
    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Rem,
            other => return Err(format!("unknown operator `{other}`")),
        };
        let rhs = parse_unary(next(&mut inner, "right operand")?)?;
        result = Expr::Binary(op, Box::new(result), Box::new(rhs));
    }
    Ok(result)
}

fn parse_unary(pair: Pair<Rule>) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let first = next(&mut inner, "operand")?;
    match first.as_rule() {
        Rule::unary_op => {
            let operand = next(&mut inner, "operand of unary operator")?;
            match first.as_str() {
                // `-5` is the literal -5, not `0 - 5`.
                "-" => match literal_of(&operand) {
                    Some(digits) => parse_integer(digits, true),
                    None => Ok(-parse_unary(operand)?),
                },
                "!" => Ok(!parse_unary(operand)?),
                other => Err(format!("unknown unary operator `{other}`")),
            }
        }
        Rule::primary => parse_primary(first),
        other => Err(format!("unexpected {other:?}")),
    }
}

/// The digits of a `unary` that is a bare integer literal.
fn literal_of<'i>(unary: &Pair<'i, Rule>) -> Option<&'i str> {
    let primary = unary.clone().into_inner().next()?;
    if primary.as_rule() != Rule::primary {
        return None;
    }
    let atom = primary.into_inner().next()?;
    (atom.as_rule() == Rule::integer).then(|| atom.as_str())
}

fn parse_primary(pair: Pair<Rule>) -> ParseResult<Expr> {
    let atom = next(&mut pair.into_inner(), "operand")?;
    match atom.as_rule() {
        Rule::integer => parse_integer(atom.as_str(), false),
        Rule::index_var => {
            let digits = &atom.as_str()[1..];
            digits
                .parse::<usize>()
                .map(Expr::Idx)
                .map_err(|_| format!("variable `{}` is out of range", atom.as_str()))
        }
        Rule::expr => parse_or(atom),
        other => Err(format!("unexpected {other:?}")),
    }
}

fn parse_integer(digits: &str, negative: bool) -> ParseResult<Expr> {
    let magnitude: i128 = digits
        .parse()
        .map_err(|_| format!("integer literal `{digits}` is out of range"))?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value)
        .map(Expr::Const)
        .map_err(|_| format!("integer literal `{digits}` is out of range"))
}
