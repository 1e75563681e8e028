//! Entity schema declarations consumed by the pipeline as data.
//!
//! # Responsibility
//! - Declare tables, fields and indexes, including the fields contributed by
//!   policy mixins.
//! - Carry each entity's mixin hooks and interceptors to the client.
//!
//! # Invariants
//! - Table, column and index names are plain SQL identifiers.
//! - The primary-key field is always the first declared field.
//! - Field names are unique per entity; indexes only reference declared fields.
//! - Index storage names are unique per entity.

use crate::pipeline::{Hook, Interceptor};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use thiserror::Error;

pub mod pk;

pub use pk::IdStrategy;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Schema declaration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),
    #[error("duplicate field `{field}` on `{table}`")]
    DuplicateField { table: String, field: String },
    #[error("index on `{table}` references unknown field `{field}`")]
    UnknownIndexField { table: String, field: String },
    #[error("index on `{0}` declares no fields")]
    EmptyIndex(String),
    #[error("index name `{0}` is declared more than once")]
    DuplicateIndex(String),
}

/// Storage type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Int64,
    Real,
    /// Unix epoch milliseconds.
    Timestamp,
}

impl FieldKind {
    pub(crate) fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Int64 | Self::Timestamp => "INTEGER",
            Self::Real => "REAL",
        }
    }
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub optional: bool,
    /// Raw SQL default expression, e.g. `0`.
    pub default_sql: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            default_sql: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int64)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Real)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    /// Allows NULL in storage.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn default_sql(mut self, expr: impl Into<String>) -> Self {
        self.default_sql = Some(expr.into());
        self
    }
}

/// Secondary index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDef {
    pub fields: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Storage name, derived from table and field names.
    ///
    /// Names are not injective (`a_b` + `c` and `a` + `b_c` agree); schema
    /// build and `Client::migrate` reject collisions.
    pub fn name(&self, table: &str) -> String {
        format!("{table}_{}", self.fields.join("_"))
    }
}

/// Reusable bundle of fields, indexes and pipeline stages.
pub trait Mixin {
    fn fields(&self) -> Vec<FieldDef> {
        Vec::new()
    }

    fn indexes(&self) -> Vec<IndexDef> {
        Vec::new()
    }

    fn hooks(&self) -> Vec<Arc<dyn Hook>> {
        Vec::new()
    }

    fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        Vec::new()
    }
}

/// Declared entity: table, fields, indexes and the stages its mixins install.
#[derive(Serialize)]
pub struct EntitySchema {
    table: String,
    id_strategy: IdStrategy,
    fields: Vec<FieldDef>,
    indexes: Vec<IndexDef>,
    #[serde(skip)]
    hooks: Vec<Arc<dyn Hook>>,
    #[serde(skip)]
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Debug for EntitySchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySchema")
            .field("table", &self.table)
            .field("id_strategy", &self.id_strategy)
            .field("fields", &self.fields)
            .field("indexes", &self.indexes)
            .field("hooks", &self.hooks.len())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl EntitySchema {
    pub fn builder(table: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            table: table.into(),
            id_strategy: IdStrategy::Uuid,
            fields: Vec::new(),
            indexes: Vec::new(),
            hooks: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_strategy(&self) -> IdStrategy {
        self.id_strategy
    }

    pub fn id_column(&self) -> &str {
        pk::ID_FIELD
    }

    /// All fields, primary key first.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns whether a field with this name and kind is declared.
    pub fn has_field(&self, name: &str, kind: FieldKind) -> bool {
        self.field(name).is_some_and(|field| field.kind == kind)
    }

    pub(crate) fn hooks(&self) -> &[Arc<dyn Hook>] {
        &self.hooks
    }

    pub(crate) fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }
}

/// Builder for [`EntitySchema`]; validation happens in [`build`](Self::build).
pub struct EntitySchemaBuilder {
    table: String,
    id_strategy: IdStrategy,
    fields: Vec<FieldDef>,
    indexes: Vec<IndexDef>,
    hooks: Vec<Arc<dyn Hook>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl EntitySchemaBuilder {
    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a mixin's fields, indexes, hooks and interceptors.
    ///
    /// Mixin hooks run in the order mixins are added.
    pub fn mixin(mut self, mixin: impl Mixin) -> Self {
        self.fields.extend(mixin.fields());
        self.indexes.extend(mixin.indexes());
        self.hooks.extend(mixin.hooks());
        self.interceptors.extend(mixin.interceptors());
        self
    }

    pub fn build(self) -> Result<Arc<EntitySchema>, SchemaError> {
        validate_identifier(&self.table)?;

        let mut fields = Vec::with_capacity(self.fields.len() + 1);
        fields.push(pk::id_field());
        for field in self.fields {
            validate_identifier(&field.name)?;
            if fields.iter().any(|existing: &FieldDef| existing.name == field.name) {
                return Err(SchemaError::DuplicateField {
                    table: self.table,
                    field: field.name,
                });
            }
            fields.push(field);
        }

        let mut index_names = BTreeSet::new();
        for index in &self.indexes {
            if index.fields.is_empty() {
                return Err(SchemaError::EmptyIndex(self.table));
            }
            let name = index.name(&self.table);
            if !index_names.insert(name.clone()) {
                return Err(SchemaError::DuplicateIndex(name));
            }
            for name in &index.fields {
                if !fields.iter().any(|field| &field.name == name) {
                    return Err(SchemaError::UnknownIndexField {
                        table: self.table,
                        field: name.clone(),
                    });
                }
            }
        }

        Ok(Arc::new(EntitySchema {
            table: self.table,
            id_strategy: self.id_strategy,
            fields,
            indexes: self.indexes,
            hooks: self.hooks,
            interceptors: self.interceptors,
        }))
    }
}

/// Validates a table, column or index name.
pub fn validate_identifier(name: &str) -> Result<(), SchemaError> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_identifier, EntitySchema, FieldDef, FieldKind, IndexDef, SchemaError};
    use crate::policy::OptimisticLocking;

    #[test]
    fn builder_puts_primary_key_first() {
        let schema = EntitySchema::builder("accounts")
            .field(FieldDef::text("owner"))
            .build()
            .expect("schema should build");

        assert_eq!(schema.fields()[0].name, "id");
        assert!(schema.has_field("owner", FieldKind::Text));
        assert!(!schema.has_field("owner", FieldKind::Int64));
    }

    #[test]
    fn builder_rejects_duplicate_fields_and_unknown_index_fields() {
        let duplicate = EntitySchema::builder("accounts")
            .field(FieldDef::text("owner"))
            .field(FieldDef::int64("owner"))
            .build()
            .expect_err("duplicate field must fail");
        assert!(matches!(duplicate, SchemaError::DuplicateField { .. }));

        let unknown = EntitySchema::builder("accounts")
            .index(IndexDef::fields(["missing"]))
            .build()
            .expect_err("unknown index field must fail");
        assert!(matches!(unknown, SchemaError::UnknownIndexField { .. }));
    }

    #[test]
    fn builder_rejects_index_colliding_with_mixin_index() {
        let err = EntitySchema::builder("accounts")
            .mixin(OptimisticLocking)
            .index(IndexDef::fields(["lock_ver"]).unique())
            .build()
            .expect_err("second index with the same name must fail");
        assert!(matches!(err, SchemaError::DuplicateIndex(ref name) if name == "accounts_lock_ver"));
    }

    #[test]
    fn identifiers_reject_sql_fragments() {
        assert!(validate_identifier("lock_ver").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("name; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());
    }
}
