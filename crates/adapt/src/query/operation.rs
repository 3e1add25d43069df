use crate::{DataStore, Result};
use domain::{IdSet, IndexName, IndexValue, LeafStore, Record, RecordId};
use futures::future::{BoxFuture, FutureExt};
use std::{collections::HashSet, fmt};

/// Executable query plan produced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation<Id> {
    QueryById(Id),
    QueryByField { name: IndexName, value: IndexValue },
    And(Box<Operation<Id>>, Box<Operation<Id>>),
    Or(Box<Operation<Id>>, Box<Operation<Id>>),
}

impl<Id> Operation<Id> {
    pub fn by_field(name: impl Into<IndexName>, value: impl Into<IndexValue>) -> Self {
        Operation::QueryByField {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn and(self, other: Operation<Id>) -> Self {
        Operation::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Operation<Id>) -> Self {
        Operation::Or(Box::new(self), Box::new(other))
    }
}

impl<Id: RecordId> Operation<Id> {
    /// Evaluates the plan against `store`. Both operands of AND / OR run
    /// concurrently; AND keeps the left side's order, OR keeps the first
    /// occurrence of each record.
    pub fn execute<'a, T, P, I>(&'a self, store: &'a DataStore<T, P, I>) -> BoxFuture<'a, Result<Vec<T>>>
    where
        T: Record<Id = Id>,
        P: LeafStore<Id, T> + 'a,
        I: LeafStore<IndexValue, IdSet<Id>, Tx = P::Tx> + 'a,
    {
        async move {
            match self {
                Operation::QueryById(id) => Ok(store.get_by_id(id).await?.into_iter().collect()),
                Operation::QueryByField { name, value } => store.search_by_index(name, value).await,
                Operation::And(left, right) => {
                    let (left, right) =
                        futures::try_join!(left.execute(store), right.execute(store))?;
                    Ok(intersect(left, right))
                }
                Operation::Or(left, right) => {
                    let (left, right) =
                        futures::try_join!(left.execute(store), right.execute(store))?;
                    Ok(union(left, right))
                }
            }
        }
        .boxed()
    }
}

fn intersect<T: Record>(left: Vec<T>, right: Vec<T>) -> Vec<T> {
    let keep: HashSet<&T::Id> = right.iter().map(Record::id).collect();
    left.into_iter().filter(|r| keep.contains(r.id())).collect()
}

fn union<T: Record>(left: Vec<T>, right: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(left.len() + right.len());
    left.into_iter()
        .chain(right)
        .filter(|r| seen.insert(r.id().clone()))
        .collect()
}

impl<Id: fmt::Debug> fmt::Display for Operation<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::QueryById(id) => write!(f, "QueryById({id:?})"),
            Operation::QueryByField { name, value } => write!(f, "QueryByField({name}, {value})"),
            Operation::And(left, right) => write!(f, "And({left}, {right})"),
            Operation::Or(left, right) => write!(f, "Or({left}, {right})"),
        }
    }
}
