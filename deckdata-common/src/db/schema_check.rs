//! Schema introspection and drift detection
//!
//! Table definitions live in code (`table_schemas`). On open, every table
//! is compared against its declaration through `PRAGMA table_info`. The
//! cache schema is fixed, so drift is reported as a schema error instead of
//! being repaired in place; rebuilding the cache from CSV is the fix.
//!
//! # Usage
//!
//! ```rust,ignore
//! pub struct PicturesTableSchema;
//!
//! impl TableSchema for PicturesTableSchema {
//!     fn table_name() -> &'static str { "pictures" }
//!
//!     fn expected_columns() -> Vec<ColumnDefinition> {
//!         vec![
//!             ColumnDefinition::new("key", "TEXT").primary_key().not_null(),
//!             ColumnDefinition::new("picture", "TEXT"),
//!         ]
//!     }
//! }
//!
//! SchemaVerifier::verify_table::<PicturesTableSchema>(&pool).await?;
//! ```

use crate::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::fmt;
use tracing::{debug, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER")
    pub sql_type: String,
    pub not_null: bool,
    /// Member of the (possibly composite) primary key
    pub primary_key: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// Actual column from `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    /// Position in the primary key (0 = not part of it)
    pub pk: i32,
}

/// Difference between declared and actual schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    MissingTable {
        table: String,
    },
    MissingColumn {
        table: String,
        column: String,
    },
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    ConstraintMismatch {
        table: String,
        column: String,
        constraint: String, // "NOT NULL", "PRIMARY KEY"
    },
}

impl fmt::Display for SchemaDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaDrift::MissingTable { table } => write!(f, "table '{}' is missing", table),
            SchemaDrift::MissingColumn { table, column } => {
                write!(f, "column {}.{} is missing", table, column)
            }
            SchemaDrift::TypeMismatch {
                table,
                column,
                expected,
                actual,
            } => write!(
                f,
                "column {}.{} has type '{}', expected '{}'",
                table, column, actual, expected
            ),
            SchemaDrift::ConstraintMismatch {
                table,
                column,
                constraint,
            } => write!(f, "column {}.{} lacks {}", table, column, constraint),
        }
    }
}

/// Declared schema of one cache table
pub trait TableSchema {
    fn table_name() -> &'static str;

    /// Expected column definitions, in table order
    fn expected_columns() -> Vec<ColumnDefinition>;
}

/// Reads the actual database schema
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Columns of `table_name`, ordered by cid
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                pk: row.get("pk"),
            })
            .collect();

        columns.sort_by_key(|c| c.cid);

        Ok(columns)
    }

    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Compares declared and actual columns
pub struct SchemaDiff;

impl SchemaDiff {
    pub fn compare(
        table_name: &str,
        expected: &[ColumnDefinition],
        actual: &[ActualColumn],
    ) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in expected {
            let Some(actual_col) = actual.iter().find(|c| c.name == expected_col.name) else {
                drift.push(SchemaDrift::MissingColumn {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                });
                continue;
            };

            if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                drift.push(SchemaDrift::TypeMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    expected: expected_col.sql_type.clone(),
                    actual: actual_col.type_name.clone(),
                });
            }

            if expected_col.not_null && !actual_col.not_null {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    constraint: "NOT NULL".to_string(),
                });
            }

            if expected_col.primary_key && actual_col.pk == 0 {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    constraint: "PRIMARY KEY".to_string(),
                });
            }
        }

        drift
    }

    /// SQLite type affinity rules
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = expected.to_uppercase();
        let act = actual.to_uppercase();

        if exp == act {
            return true;
        }

        if exp.contains("INT") && act.contains("INT") {
            return true;
        }

        let is_text = |t: &str| t.contains("TEXT") || t.contains("CHAR") || t.contains("CLOB");
        if is_text(&exp) && is_text(&act) {
            return true;
        }

        let is_real = |t: &str| t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB");
        is_real(&exp) && is_real(&act)
    }
}

/// Verifies tables against their declarations
pub struct SchemaVerifier;

impl SchemaVerifier {
    /// Detect drift for one table
    pub async fn detect_drift<T: TableSchema>(pool: &SqlitePool) -> Result<Vec<SchemaDrift>> {
        let table_name = T::table_name();

        if !SchemaIntrospector::table_exists(pool, table_name).await? {
            return Ok(vec![SchemaDrift::MissingTable {
                table: table_name.to_string(),
            }]);
        }

        let actual = SchemaIntrospector::introspect_table(pool, table_name).await?;
        let expected = T::expected_columns();

        for extra in actual
            .iter()
            .filter(|a| !expected.iter().any(|e| e.name == a.name))
        {
            warn!(
                "Unexpected column {}.{} in cache (ignored)",
                table_name, extra.name
            );
        }

        Ok(SchemaDiff::compare(table_name, &expected, &actual))
    }

    /// Fail with a schema error when the table drifted
    pub async fn verify_table<T: TableSchema>(pool: &SqlitePool) -> Result<()> {
        let drift = Self::detect_drift::<T>(pool).await?;

        if drift.is_empty() {
            debug!("Schema up to date for '{}'", T::table_name());
            return Ok(());
        }

        let reason = drift
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("; ");

        Err(Error::schema(
            format!("cache table {}", T::table_name()),
            format!("{}. Delete the cache and re-import from CSV", reason),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    struct NotesSchema;

    impl TableSchema for NotesSchema {
        fn table_name() -> &'static str {
            "notes"
        }

        fn expected_columns() -> Vec<ColumnDefinition> {
            vec![
                ColumnDefinition::new("key", "TEXT").primary_key().not_null(),
                ColumnDefinition::new("body", "TEXT").not_null(),
                ColumnDefinition::new("rank", "INTEGER"),
            ]
        }
    }

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_matching_table_has_no_drift() {
        let pool = setup_test_db().await;
        sqlx::query(
            "CREATE TABLE notes (key TEXT PRIMARY KEY NOT NULL, body TEXT NOT NULL DEFAULT '', rank INT)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let drift = SchemaVerifier::detect_drift::<NotesSchema>(&pool).await.unwrap();
        assert!(drift.is_empty(), "unexpected drift: {:?}", drift);
        SchemaVerifier::verify_table::<NotesSchema>(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_table_detected() {
        let pool = setup_test_db().await;

        let drift = SchemaVerifier::detect_drift::<NotesSchema>(&pool).await.unwrap();
        assert_eq!(
            drift,
            vec![SchemaDrift::MissingTable {
                table: "notes".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_column_is_schema_error() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE notes (key TEXT PRIMARY KEY NOT NULL, body TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let result = SchemaVerifier::verify_table::<NotesSchema>(&pool).await;
        match result {
            Err(Error::Schema { reason, .. }) => assert!(reason.contains("notes.rank")),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_constraint_and_type_mismatch() {
        let actual = vec![
            ActualColumn {
                cid: 0,
                name: "key".to_string(),
                type_name: "TEXT".to_string(),
                not_null: true,
                pk: 0,
            },
            ActualColumn {
                cid: 1,
                name: "body".to_string(),
                type_name: "BLOB".to_string(),
                not_null: true,
                pk: 0,
            },
            ActualColumn {
                cid: 2,
                name: "rank".to_string(),
                type_name: "BIGINT".to_string(),
                not_null: false,
                pk: 0,
            },
        ];

        let drift = SchemaDiff::compare("notes", &NotesSchema::expected_columns(), &actual);
        assert_eq!(drift.len(), 2);
        assert!(matches!(&drift[0], SchemaDrift::ConstraintMismatch { constraint, .. } if constraint == "PRIMARY KEY"));
        assert!(matches!(&drift[1], SchemaDrift::TypeMismatch { column, .. } if column == "body"));
    }
}
