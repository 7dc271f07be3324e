//! Creating and dropping the tables of a model registry.
//!
//! Both operations run inside a single transaction, so a failing statement
//! leaves the database as it was. Only registered models are touched: a
//! model that was never registered simply has no table.

use steward_model::{ModelRegistry, Table};

use crate::error::SchemaError;
use crate::session::SessionFactory;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builds the `CREATE TABLE IF NOT EXISTS` statement for `table`.
///
/// Every column is included, private ones too. Identity columns form the
/// `PRIMARY KEY` clause.
pub fn create_table_sql(table: &Table) -> String {
    let mut defs: Vec<String> = table
        .columns
        .iter()
        .map(|col| {
            let mut def = format!("{} {}", quote_ident(col.name), col.kind.sql_type());
            if !col.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();

    let keys: Vec<String> = table
        .columns
        .iter()
        .filter(|col| col.primary_key)
        .map(|col| quote_ident(col.name))
        .collect();
    if !keys.is_empty() {
        defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table.name),
        defs.join(", ")
    )
}

/// Creates every registered table that does not exist yet.
///
/// Returns the number of tables processed.
///
/// # Errors
///
/// Returns `SchemaError` if no connection is available or any statement
/// fails; nothing is created in that case.
pub fn create_schema(factory: &SessionFactory, registry: &ModelRegistry) -> Result<usize, SchemaError> {
    let conn = factory.pool().get()?;
    let tx = conn
        .unchecked_transaction()
        .map_err(SchemaError::Transaction)?;

    let mut count = 0;
    for table in registry.tables() {
        tracing::debug!(table = table.name, "creating table if missing");
        tx.execute_batch(&create_table_sql(table))
            .map_err(|source| SchemaError::Statement {
                table: table.name.to_string(),
                source,
            })?;
        count += 1;
    }

    tx.commit().map_err(SchemaError::Transaction)?;
    tracing::info!(tables = count, "schema created");
    Ok(count)
}

/// Drops every registered table, in reverse registration order.
///
/// Returns the number of tables processed.
///
/// # Errors
///
/// Returns `SchemaError` if no connection is available or any statement
/// fails; nothing is dropped in that case.
pub fn drop_schema(factory: &SessionFactory, registry: &ModelRegistry) -> Result<usize, SchemaError> {
    let conn = factory.pool().get()?;
    let tx = conn
        .unchecked_transaction()
        .map_err(SchemaError::Transaction)?;

    let mut count = 0;
    for table in registry.tables().rev() {
        tracing::debug!(table = table.name, "dropping table");
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table.name)))
            .map_err(|source| SchemaError::Statement {
                table: table.name.to_string(),
                source,
            })?;
        count += 1;
    }

    tx.commit().map_err(SchemaError::Transaction)?;
    tracing::info!(tables = count, "schema dropped");
    Ok(count)
}
