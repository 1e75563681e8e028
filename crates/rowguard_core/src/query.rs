//! In-flight read requests and the rows they return.
//!
//! # Invariants
//! - Predicates are append-only, same as on mutations.
//! - A `Record` holds every selected column, including policy columns.

use crate::policy::optlock::LOCK_VERSION_FIELD;
use crate::policy::softdelete::DELETE_TIME_FIELD;
use crate::predicate::{Predicate, PredicateSink};
use crate::schema::EntitySchema;
use rusqlite::types::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// In-flight read request.
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<EntitySchema>,
    predicates: Vec<Predicate>,
    order_by: Option<(String, Order)>,
    limit: Option<u32>,
}

impl Query {
    /// Every row of the entity, subject to interceptors.
    pub fn all(schema: &Arc<EntitySchema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            predicates: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// The row with this primary key, subject to interceptors.
    pub fn by_id(schema: &Arc<EntitySchema>, id: impl Into<String>) -> Self {
        let column = schema.id_column().to_string();
        Self::all(schema).filter(Predicate::eq(column, id.into()))
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.where_p(predicate);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn table(&self) -> &str {
        self.schema.table()
    }

    pub fn ordering(&self) -> Option<(&str, Order)> {
        self.order_by
            .as_ref()
            .map(|(column, order)| (column.as_str(), *order))
    }

    pub fn row_limit(&self) -> Option<u32> {
        self.limit
    }
}

impl PredicateSink for Query {
    fn where_p(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

/// One returned row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.values.get(column) {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_text(&self, column: &str) -> Option<&str> {
        match self.values.get(column) {
            Some(Value::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Missing columns count as NULL.
    pub fn is_null(&self, column: &str) -> bool {
        matches!(self.values.get(column), None | Some(Value::Null))
    }

    pub fn id(&self) -> Option<&str> {
        self.get_text(crate::schema::pk::ID_FIELD)
    }

    pub fn lock_version(&self) -> Option<i64> {
        self.get_i64(LOCK_VERSION_FIELD)
    }

    /// Soft-delete instant in Unix epoch milliseconds; `None` for live rows.
    pub fn delete_time(&self) -> Option<i64> {
        self.get_i64(DELETE_TIME_FIELD)
    }
}
