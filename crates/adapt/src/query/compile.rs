//! Predicate to operation compiler.
//!
//! Only equality, AND and OR are index-answerable:
//! - `Id == v` (the record's identifier member) becomes `QueryById`,
//! - `Member == v` becomes `QueryByField` on the index named after the path,
//! - `&&` / `||` compile both sides.
//!
//! Everything else is rejected before any store is touched.

use super::operation::Operation;
use super::predicate::{BinaryOp, Expr};
use crate::{Error, Result};
use domain::{IndexValue, MemberPath, Record};
use serde::de::DeserializeOwned;
use serde_json::Value as Json;

pub fn compile<T: Record>(expr: &Expr) -> Result<Operation<T::Id>> {
    match expr {
        Expr::Binary {
            op: BinaryOp::Eq,
            left,
            right,
        } => compile_equality::<T>(left, right),
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => Ok(compile::<T>(left)?.and(compile::<T>(right)?)),
        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => Ok(compile::<T>(left)?.or(compile::<T>(right)?)),
        other => Err(Error::unsupported(format!(
            "`{other}` is not an equality, AND or OR expression"
        ))),
    }
}

fn compile_equality<T: Record>(left: &Expr, right: &Expr) -> Result<Operation<T::Id>> {
    let path = member_path(left)?;
    let value = constant(right)?;

    if path.is_member(T::ID_MEMBER) {
        let id = identifier::<T::Id>(&value).map_err(|e| {
            Error::unsupported(format!(
                "`{value}` is not a valid `{}` identifier: {e}",
                T::ID_MEMBER
            ))
        })?;
        return Ok(Operation::QueryById(id));
    }

    Ok(Operation::QueryByField {
        name: path.index_name(),
        value: IndexValue::from_json(&value),
    })
}

/// Identifiers that are strings also match a number or boolean literal
/// through its index-value text, so `id == 42` finds the record `"42"`.
fn identifier<Id: DeserializeOwned>(value: &Json) -> serde_json::Result<Id> {
    serde_json::from_value(value.clone()).or_else(|err| match value {
        Json::Number(_) | Json::Bool(_) => {
            let text = IndexValue::from_json(value).to_string();
            serde_json::from_value(Json::String(text)).map_err(|_| err)
        }
        _ => Err(err),
    })
}

fn member_path(expr: &Expr) -> Result<&MemberPath> {
    match strip_conversion(expr)? {
        Expr::Member(path) if !path.is_empty() => Ok(path),
        other => Err(Error::unsupported(format!(
            "left side of `==` must be a record member, found `{other}`"
        ))),
    }
}

/// Literal values are used as-is; captured values are read now.
fn constant(expr: &Expr) -> Result<Json> {
    match strip_conversion(expr)? {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Captured(capture) => capture
            .evaluate()
            .map_err(|e| Error::unsupported(format!("captured value could not be read: {e}"))),
        other => Err(Error::unsupported(format!(
            "right side of `==` must be a constant, found `{other}`"
        ))),
    }
}

fn strip_conversion(expr: &Expr) -> Result<&Expr> {
    match expr {
        Expr::Convert(inner) => match inner.as_ref() {
            Expr::Convert(_) => Err(Error::unsupported("nested conversions are not supported")),
            inner => Ok(inner),
        },
        other => Ok(other),
    }
}
