use crate::connection::Database;
use crate::error::DbError;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::{PgColumn, PgRow};
use sqlx::{
    Column, Connection, Executor, PgConnection, Postgres, Row, Statement, Transaction, TypeInfo,
};

/// The result envelope for a successfully executed statement.
///
/// Serializes as a tagged JSON object, e.g.
/// `{"type":"select","columns":["id"],"rows":[{"id":1}]}` or
/// `{"type":"modify","row_count":3}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatementOutcome {
    /// Rows fetched by a `select`-leading statement, as column-labeled
    /// mappings in result order.
    Select {
        columns: Vec<String>,
        rows: Vec<Map<String, Value>>,
    },
    /// The affected-row count reported by the database for anything else.
    Modify { row_count: u64 },
}

/// True when the statement lexically starts with `select`, ignoring leading
/// whitespace and case. Purely lexical: no SQL parsing takes place.
pub fn is_select(sql: &str) -> bool {
    let head = sql.trim_start().as_bytes();
    head.len() >= 6 && head[..6].eq_ignore_ascii_case(b"select")
}

/// True when the statement contains a `;` anywhere but its final character.
///
/// This is the multi-statement guard: one trailing semicolon is tolerated,
/// anything else is rejected. It is a lexical check and can be fooled by
/// semicolons inside string literals; that is a known limitation of the
/// contract, not an oversight.
pub fn has_internal_semicolon(sql: &str) -> bool {
    sql.strip_suffix(';').unwrap_or(sql).contains(';')
}

impl Database {
    /// Executes one client-supplied statement inside its own transaction.
    ///
    /// `select`-leading statements fetch all rows and never commit; anything
    /// else commits and reports the affected-row count. On error the
    /// transaction is rolled back and the connection released before the
    /// error propagates, so a failed statement can never leave a partial
    /// commit behind.
    pub async fn run_statement(&self, sql: &str) -> Result<StatementOutcome, DbError> {
        let mut handle = self.checkout().await?;
        let outcome = run_in_transaction(handle.as_conn(), sql).await;
        handle.release().await;
        outcome
    }
}

async fn run_in_transaction(
    conn: &mut PgConnection,
    sql: &str,
) -> Result<StatementOutcome, DbError> {
    let mut tx = conn.begin().await.map_err(DbError::Execute)?;

    let result = if is_select(sql) {
        fetch_select(&mut tx, sql).await
    } else {
        execute_modify(&mut tx, sql).await
    };

    match result {
        Ok(outcome) => {
            match outcome {
                // The read path never commits; rolling back keeps statements
                // that merely start with `select` from leaving durable
                // effects.
                StatementOutcome::Select { .. } => {
                    tx.rollback().await.map_err(DbError::Execute)?;
                }
                StatementOutcome::Modify { .. } => {
                    tx.commit().await.map_err(DbError::Execute)?;
                }
            }
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    error = %rollback_err,
                    "Rollback after a failed statement also failed."
                );
            }
            Err(e)
        }
    }
}

async fn fetch_select(
    tx: &mut Transaction<'_, Postgres>,
    sql: &str,
) -> Result<StatementOutcome, DbError> {
    // Client statements are one-shot; skip the prepared-statement cache so
    // arbitrary SQL cannot grow it without bound.
    let rows: Vec<PgRow> = sqlx::query(sql)
        .persistent(false)
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::Execute)?;

    let columns = match rows.first() {
        Some(row) => column_names(row.columns()),
        // No row carries the result description, so ask the driver directly;
        // if it has none either, the envelope stays empty.
        None => describe_columns(tx, sql).await,
    };

    let mut mapped = Vec::with_capacity(rows.len());
    for row in &rows {
        mapped.push(row_to_map(row)?);
    }

    Ok(StatementOutcome::Select {
        columns,
        rows: mapped,
    })
}

async fn execute_modify(
    tx: &mut Transaction<'_, Postgres>,
    sql: &str,
) -> Result<StatementOutcome, DbError> {
    let result = sqlx::query(sql)
        .persistent(false)
        .execute(&mut **tx)
        .await
        .map_err(DbError::Execute)?;

    Ok(StatementOutcome::Modify {
        row_count: result.rows_affected(),
    })
}

fn column_names(columns: &[PgColumn]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_owned()).collect()
}

async fn describe_columns(tx: &mut Transaction<'_, Postgres>, sql: &str) -> Vec<String> {
    match (&mut **tx).prepare(sql).await {
        Ok(statement) => column_names(statement.columns()),
        Err(e) => {
            tracing::debug!(error = %e, "Statement has no result description.");
            Vec::new()
        }
    }
}

/// Converts one row into an ordered column-name → JSON value mapping.
fn row_to_map(row: &PgRow) -> Result<Map<String, Value>, DbError> {
    let mut map = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_owned(), decode_value(row, idx, column)?);
    }
    Ok(map)
}

/// Decodes a single column value into JSON by its PostgreSQL type name.
///
/// Covers the common scalar types; anything outside the table decodes to
/// JSON null rather than failing the whole result set.
fn decode_value(row: &PgRow, idx: usize, column: &PgColumn) -> Result<Value, DbError> {
    let decode_err = |source: sqlx::Error| DbError::Decode {
        column: column.name().to_owned(),
        source,
    };

    let value = match column.type_info().name() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, Value::from),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, Value::from),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, |v| Value::from(f64::from(v))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, Value::from),
        // NUMERIC renders as a string so no precision is lost in a JSON
        // number.
        "NUMERIC" => row
            .try_get::<Option<rust_decimal::Decimal>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
            .try_get::<Option<String>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, Value::String),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, |v| Value::String(v.to_rfc3339())),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(idx)
            .map_err(decode_err)?
            .unwrap_or(Value::Null),
        // Raw bytes are summarized, not shipped.
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(idx)
            .map_err(decode_err)?
            .map_or(Value::Null, |v| Value::String(format!("<{} bytes>", v.len()))),
        "VOID" => Value::Null,
        other => {
            tracing::debug!(
                column = column.name(),
                column_type = other,
                "Unsupported column type; returning null."
            );
            Value::Null
        }
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── is_select ─────────────────────────────────────────────────────────

    #[test]
    fn select_is_detected_case_insensitively() {
        assert!(is_select("select 1"));
        assert!(is_select("SELECT 1"));
        assert!(is_select("SeLeCt 1"));
    }

    #[test]
    fn leading_whitespace_is_ignored() {
        assert!(is_select("   select 1"));
        assert!(is_select("\n\tSELECT * FROM t"));
    }

    #[test]
    fn non_select_statements_are_not_select() {
        assert!(!is_select("INSERT INTO t VALUES (1)"));
        assert!(!is_select("update t set a = 1"));
        assert!(!is_select("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_select(""));
        assert!(!is_select("sel"));
    }

    #[test]
    fn classification_is_a_prefix_match_only() {
        // Lexical contract: anything starting with the six letters routes to
        // the read path, even when it is not a well-formed SELECT.
        assert!(is_select("selection nonsense"));
    }

    #[test]
    fn classification_matches_a_trim_and_lowercase_prefix_test() {
        // The byte-wise check must decide exactly like trimming the statement
        // and testing its lowercased prefix, non-ASCII input included.
        let statements = [
            "select 1",
            "SELECT 1",
            " \u{3000}SeLeCt 1",
            "\n\tselect * from t",
            "selection nonsense",
            "sel",
            "select",
            "",
            "ſelect 1",
            "ＳＥＬＥＣＴ 1",
            "sélect 1",
            "insert into t values ('select')",
            "with x as (select 1) select * from x",
        ];

        for sql in statements {
            let expected = sql.trim().to_lowercase().starts_with("select");
            assert_eq!(is_select(sql), expected, "statement: {sql:?}");
        }
    }

    // ── has_internal_semicolon ────────────────────────────────────────────

    #[test]
    fn statement_without_semicolons_passes() {
        assert!(!has_internal_semicolon("select 1"));
    }

    #[test]
    fn single_trailing_semicolon_is_tolerated() {
        assert!(!has_internal_semicolon("select 1;"));
    }

    #[test]
    fn internal_semicolon_is_rejected() {
        assert!(has_internal_semicolon("select 1; drop table users"));
        assert!(has_internal_semicolon("a;b"));
    }

    #[test]
    fn semicolon_followed_by_whitespace_is_internal() {
        assert!(has_internal_semicolon("select 1; "));
    }

    #[test]
    fn doubled_trailing_semicolon_is_rejected() {
        assert!(has_internal_semicolon("select 1;;"));
    }

    #[test]
    fn lone_semicolon_passes_the_guard() {
        // The final character is exempt, so a bare ";" reaches the database
        // (and fails there instead).
        assert!(!has_internal_semicolon(";"));
    }

    #[test]
    fn guard_examines_every_character_except_the_last() {
        // Equivalent formulation of the rule: drop the final character, then
        // look for a semicolon anywhere in what remains. Multi-byte final
        // characters must not confuse the suffix handling.
        let statements = [
            "",
            ";",
            ";;",
            "x",
            "select 1",
            "select 1;",
            "select 1 ;",
            "select 1; ",
            "select 1;;",
            "select 1; drop table users",
            "a;b",
            "select 'a;b'",
            "select '萌';",
            "select ';'é",
            "\n;select 1",
        ];

        for sql in statements {
            let mut chars: Vec<char> = sql.chars().collect();
            chars.pop();
            let expected = chars.contains(&';');
            assert_eq!(has_internal_semicolon(sql), expected, "statement: {sql:?}");
        }
    }

    // ── StatementOutcome serialization ────────────────────────────────────

    #[test]
    fn select_outcome_serializes_with_type_tag() {
        let mut row = Map::new();
        row.insert("id".to_string(), json!(1));
        let outcome = StatementOutcome::Select {
            columns: vec!["id".to_string()],
            rows: vec![row],
        };

        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"type": "select", "columns": ["id"], "rows": [{"id": 1}]})
        );
    }

    #[test]
    fn modify_outcome_serializes_with_type_tag() {
        let outcome = StatementOutcome::Modify { row_count: 3 };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"type": "modify", "row_count": 3})
        );
    }
}
