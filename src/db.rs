//! PostgreSQL-backed reading store
//!
//! Readings live in a single table partitioned logically by `device_id`:
//!
//! ```sql
//! CREATE TABLE readings (
//!     device_id   TEXT NOT NULL,
//!     "timestamp" TEXT NOT NULL,
//!     temperature DOUBLE PRECISION NOT NULL,
//!     humidity    DOUBLE PRECISION NOT NULL
//! );
//! CREATE INDEX readings_device_ts ON readings (device_id, "timestamp");
//! ```
//!
//! Queries are written against the alias `c` and use `@name` placeholders.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::store::{DocumentStore, QueryParam, Row};

/// Database connection pool and query execution
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    table: String,
}

impl Database {
    /// Create the connection pool.
    ///
    /// Connections are opened on first use, so an unreachable server shows up
    /// as a request error rather than a startup failure.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect_lazy(&config.url)
            .map_err(|e| AppError::Upstream(format!("Invalid database URL: {}", e)))?;

        info!(table = %config.table, "Database connection pool created");
        Ok(Self {
            pool,
            table: config.table.clone(),
        })
    }
}

#[async_trait]
impl DocumentStore for Database {
    async fn execute(
        &self,
        query: &str,
        params: &[QueryParam],
        partition_key: Option<&str>,
    ) -> Result<Vec<Row>> {
        let sql = scoped_sql(&self.table, query, params)?;

        let mut stmt = sqlx::query_scalar::<sqlx::Postgres, serde_json::Value>(&sql)
            .bind(partition_key.map(str::to_string));
        for param in params {
            stmt = stmt.bind(param.value.clone());
        }

        let docs = stmt.fetch_all(&self.pool).await?;
        debug!(
            rows = docs.len(),
            partition_key = partition_key.unwrap_or("*"),
            "Query executed"
        );

        docs.into_iter()
            .map(|doc| match doc {
                serde_json::Value::Object(row) => Ok(row),
                other => Err(AppError::Upstream(format!(
                    "Expected an object row, got {}",
                    other
                ))),
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Wrap `query` so it reads from `c`, the readings of one partition (or all
/// of them when `$1` is NULL), and returns every row as one JSON object.
pub fn scoped_sql(table: &str, query: &str, params: &[QueryParam]) -> Result<String> {
    // $1 is reserved for the partition key
    let body = bind_named_params(query, params, 1)?;
    Ok(format!(
        "WITH c AS (SELECT * FROM {table} WHERE $1::text IS NULL OR device_id = $1::text) \
         SELECT to_jsonb(q) FROM ({body}) AS q",
        table = table,
        body = body,
    ))
}

/// Rewrite `@name` placeholders to positional `$n` placeholders.
///
/// Parameter `i` of `params` becomes `$(offset + i + 1)`. Text inside quoted
/// literals and quoted identifiers is copied verbatim.
pub fn bind_named_params(query: &str, params: &[QueryParam], offset: usize) -> Result<String> {
    let mut out = String::with_capacity(query.len());
    let mut chars = query.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            out.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                out.push(ch);
            }
            '@' if chars
                .peek()
                .is_some_and(|c| c.is_ascii_alphabetic() || *c == '_') =>
            {
                let mut name = String::from("@");
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let index = params
                    .iter()
                    .position(|p| p.name == name)
                    .ok_or_else(|| AppError::Upstream(format!("Unbound query parameter {}", name)))?;
                out.push('$');
                out.push_str(&(offset + index + 1).to_string());
            }
            _ => out.push(ch),
        }
    }

    Ok(out)
}

/// Whether `name` is a plain, optionally schema-qualified SQL identifier
pub fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
