//! SQL rendering for SQLite.
//!
//! Rendering is pure: it turns a mutation, query or schema into SQL text plus
//! bound parameters without touching a connection.

use crate::error::{PipelineError, PipelineResult};
use crate::mutation::{Assignment, Mutation, Op};
use crate::predicate::{Predicate, PredicateSink};
use crate::query::{Order, Query};
use crate::schema::{validate_identifier, EntitySchema, SchemaError};
use rusqlite::types::Value;

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Renders a mutation in its current (possibly rewritten) form.
///
/// # Errors
/// - `InvalidMutation` for a create without id, an increment on create, or an
///   update with no assignments.
/// - Schema errors for invalid identifiers.
pub fn render_mutation(mutation: &Mutation) -> PipelineResult<Statement> {
    let table = quote(mutation.table())?;
    let mut params = Vec::new();

    let sql = match mutation.op() {
        Op::Create => {
            let id = mutation.id().ok_or_else(|| {
                PipelineError::InvalidMutation(format!(
                    "create on `{}` has no id",
                    mutation.table()
                ))
            })?;
            let mut columns = vec![quote(mutation.schema().id_column())?];
            params.push(Value::Text(id.to_string()));
            for assignment in mutation.assignments() {
                match assignment {
                    Assignment::Set { column, value } => {
                        columns.push(quote(column)?);
                        params.push(value.clone());
                    }
                    Assignment::Add { column, .. } => {
                        return Err(PipelineError::InvalidMutation(format!(
                            "create on `{}` cannot increment `{column}`",
                            mutation.table()
                        )));
                    }
                }
            }
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                columns.join(", ")
            )
        }
        Op::UpdateOne | Op::UpdateMany => {
            if mutation.assignments().is_empty() {
                return Err(PipelineError::InvalidMutation(format!(
                    "{} on `{}` has no field assignments",
                    mutation.op(),
                    mutation.table()
                )));
            }
            let mut sets = Vec::with_capacity(mutation.assignments().len());
            for assignment in mutation.assignments() {
                sets.push(render_assignment(assignment, &mut params)?);
            }
            let mut sql = format!("UPDATE {table} SET {}", sets.join(", "));
            push_where(&mut sql, mutation.predicates(), &mut params)?;
            sql
        }
        Op::DeleteOne | Op::DeleteMany => {
            let mut sql = format!("DELETE FROM {table}");
            push_where(&mut sql, mutation.predicates(), &mut params)?;
            sql
        }
    };

    Ok(Statement { sql, params })
}

/// Renders a query after interceptors ran. Rows default to primary-key order.
pub fn render_query(query: &Query) -> PipelineResult<Statement> {
    let mut params = Vec::new();
    let mut sql = format!("SELECT * FROM {}", quote(query.table())?);
    push_where(&mut sql, query.predicates(), &mut params)?;

    let (column, order) = query
        .ordering()
        .unwrap_or((query.schema().id_column(), Order::Asc));
    let direction = match order {
        Order::Asc => "ASC",
        Order::Desc => "DESC",
    };
    sql.push_str(&format!(" ORDER BY {} {direction}", quote(column)?));

    if let Some(limit) = query.row_limit() {
        sql.push_str(" LIMIT ?");
        params.push(Value::Integer(i64::from(limit)));
    }

    Ok(Statement { sql, params })
}

/// Renders `CREATE TABLE` plus one `CREATE INDEX` per declared index.
pub fn render_create_table(schema: &EntitySchema) -> Result<Vec<String>, SchemaError> {
    let table = quote(schema.table())?;
    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let mut column = format!("{} {}", quote(&field.name)?, field.kind.sql_type());
        if field.name == schema.id_column() {
            column.push_str(" PRIMARY KEY NOT NULL");
        } else if !field.optional {
            column.push_str(" NOT NULL");
        }
        if let Some(default) = &field.default_sql {
            column.push_str(&format!(" DEFAULT {default}"));
        }
        columns.push(column);
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {table} ({})",
        columns.join(", ")
    )];
    for index in schema.indexes() {
        let fields = index
            .fields
            .iter()
            .map(|field| quote(field))
            .collect::<Result<Vec<_>, _>>()?;
        statements.push(format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {table} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote(&index.name(schema.table()))?,
            fields.join(", ")
        ));
    }
    Ok(statements)
}

fn render_assignment(assignment: &Assignment, params: &mut Vec<Value>) -> PipelineResult<String> {
    Ok(match assignment {
        Assignment::Set { column, value } => {
            params.push(value.clone());
            format!("{} = ?", quote(column)?)
        }
        Assignment::Add { column, delta } => {
            let column = quote(column)?;
            params.push(Value::Integer(*delta));
            format!("{column} = COALESCE({column}, 0) + ?")
        }
    })
}

fn push_where(
    sql: &mut String,
    predicates: &[Predicate],
    params: &mut Vec<Value>,
) -> PipelineResult<()> {
    if predicates.is_empty() {
        return Ok(());
    }
    let mut clauses = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        clauses.push(render_predicate(predicate, params)?);
    }
    sql.push_str(" WHERE ");
    sql.push_str(&clauses.join(" AND "));
    Ok(())
}

fn render_predicate(predicate: &Predicate, params: &mut Vec<Value>) -> PipelineResult<String> {
    let column = quote(predicate.column())?;
    let binary = |op: &str, value: &Value, params: &mut Vec<Value>| {
        params.push(value.clone());
        format!("{column} {op} ?")
    };
    Ok(match predicate {
        Predicate::Eq { value, .. } => binary("=", value, params),
        Predicate::Ne { value, .. } => binary("<>", value, params),
        Predicate::Gt { value, .. } => binary(">", value, params),
        Predicate::Lt { value, .. } => binary("<", value, params),
        Predicate::In { values, .. } if values.is_empty() => "0 = 1".to_string(),
        Predicate::In { values, .. } => {
            params.extend(values.iter().cloned());
            format!("{column} IN ({})", vec!["?"; values.len()].join(", "))
        }
        Predicate::IsNull { .. } => format!("{column} IS NULL"),
        Predicate::NotNull { .. } => format!("{column} IS NOT NULL"),
    })
}

fn quote(identifier: &str) -> Result<String, SchemaError> {
    validate_identifier(identifier)?;
    Ok(format!("\"{identifier}\""))
}
