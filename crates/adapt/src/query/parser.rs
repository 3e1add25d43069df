// crates/adapt/src/query/parser.rs

use super::predicate::{member, BinaryOp, Expr};
use crate::{Error, Result};
use serde_json::Value as Json;

/// Parse a Mongo-style JSON filter into a predicate.
///
/// Several keys in one object are AND-ed; `$and` / `$or` arrays fold left.
pub fn parse_filter(json: &Json) -> Result<Expr> {
    match json {
        Json::Object(map) => {
            let mut clauses = Vec::with_capacity(map.len());
            for (key, value) in map {
                let clause = match key.as_str() {
                    "$and" => parse_logical(value, BinaryOp::And, "$and")?,
                    "$or" => parse_logical(value, BinaryOp::Or, "$or")?,
                    op if op.starts_with('$') => {
                        return Err(Error::invalid_filter(format!(
                            "unknown top-level operator {op}"
                        )))
                    }
                    field => parse_field_expr(field, value)?,
                };
                clauses.push(clause);
            }
            fold(clauses, BinaryOp::And)
                .ok_or_else(|| Error::invalid_filter("filter object must not be empty"))
        }
        _ => Err(Error::invalid_filter("top-level filter must be an object")),
    }
}

fn fold(clauses: Vec<Expr>, op: BinaryOp) -> Option<Expr> {
    let mut iter = clauses.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, next| Expr::binary(op, acc, next)))
}

fn parse_logical(value: &Json, op: BinaryOp, name: &str) -> Result<Expr> {
    let Json::Array(items) = value else {
        return Err(Error::invalid_filter(format!("{name} value must be an array")));
    };
    let clauses = items.iter().map(parse_filter).collect::<Result<Vec<_>>>()?;
    fold(clauses, op).ok_or_else(|| Error::invalid_filter(format!("{name} expects a non-empty array")))
}

fn parse_field_expr(path: &str, value: &Json) -> Result<Expr> {
    let Json::Object(ops) = value else {
        // shorthand: { field: value }
        return Ok(member(path).eq(Expr::Literal(value.clone())));
    };
    if ops.is_empty() {
        return Err(Error::invalid_filter(format!(
            "empty operator object for field {path}"
        )));
    }
    if !ops.keys().any(|k| k.starts_with('$')) {
        // embedded document equality
        return Ok(member(path).eq(Expr::Literal(value.clone())));
    }

    let clauses = ops
        .iter()
        .map(|(op, operand)| parse_cmp_op(path, op, operand))
        .collect::<Result<Vec<_>>>()?;
    fold(clauses, BinaryOp::And)
        .ok_or_else(|| Error::invalid_filter(format!("no operators for field {path}")))
}

fn parse_cmp_op(path: &str, op: &str, value: &Json) -> Result<Expr> {
    let compare = |op: BinaryOp| Expr::binary(op, member(path), Expr::Literal(value.clone()));

    match op {
        "$eq" => Ok(compare(BinaryOp::Eq)),
        "$ne" => Ok(compare(BinaryOp::Ne)),
        "$gt" => Ok(compare(BinaryOp::Gt)),
        "$gte" => Ok(compare(BinaryOp::Ge)),
        "$lt" => Ok(compare(BinaryOp::Lt)),
        "$lte" => Ok(compare(BinaryOp::Le)),
        "$in" => {
            // membership is a disjunction of equalities
            let items = value
                .as_array()
                .ok_or_else(|| Error::invalid_filter("$in expects array"))?;
            let clauses = items
                .iter()
                .map(|item| member(path).eq(Expr::Literal(item.clone())))
                .collect();
            fold(clauses, BinaryOp::Or)
                .ok_or_else(|| Error::invalid_filter("$in expects a non-empty array"))
        }
        "$not" => {
            if !value.is_object() {
                return Err(Error::invalid_filter("$not expects an operator object"));
            }
            Ok(!parse_field_expr(path, value)?)
        }
        other => Err(Error::invalid_filter(format!(
            "unknown operator {other} for field {path}"
        ))),
    }
}
