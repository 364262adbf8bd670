//! Dataset store — loads a CSV into SQLite and hands out per-worker
//! connections.
//!
//! SQLite connections are not shared between workers. The store itself is
//! cheap to clone; every job calls `connect()` for its own read-only
//! connection and drops it when the job ends.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("failed to read CSV {}: {1}", .0.display())]
    CsvRead(PathBuf, csv::Error),
    #[error("CSV {} has no header row", .0.display())]
    EmptyCsv(PathBuf),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result of a SQL query: column names plus row values as JSON.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Handle to the dataset database. Clone freely; connections are per-call.
#[derive(Clone)]
pub struct DatasetStore {
    db_path: PathBuf,
    table: String,
}

impl DatasetStore {
    pub fn new(db_path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Load a CSV file into the dataset table, replacing any prior contents.
    /// Returns the number of rows loaded.
    pub fn load_csv(&self, csv_path: &Path) -> Result<usize, QueryError> {
        let mut reader = csv::Reader::from_path(csv_path)
            .map_err(|e| QueryError::CsvRead(csv_path.to_path_buf(), e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| QueryError::CsvRead(csv_path.to_path_buf(), e))?
            .iter()
            .map(sanitize_column)
            .collect();
        if headers.is_empty() {
            return Err(QueryError::EmptyCsv(csv_path.to_path_buf()));
        }

        let records: Vec<csv::StringRecord> = reader
            .records()
            .collect::<Result<_, _>>()
            .map_err(|e| QueryError::CsvRead(csv_path.to_path_buf(), e))?;

        // A column is numeric if every non-empty value parses as f64.
        let numeric: Vec<bool> = (0..headers.len())
            .map(|i| {
                records.iter().all(|r| {
                    r.get(i)
                        .map(|v| v.is_empty() || v.parse::<f64>().is_ok())
                        .unwrap_or(true)
                })
            })
            .collect();

        let mut conn = Connection::open(&self.db_path)?;

        let column_defs: Vec<String> = headers
            .iter()
            .zip(&numeric)
            .map(|(name, is_num)| {
                format!("\"{}\" {}", name, if *is_num { "REAL" } else { "TEXT" })
            })
            .collect();

        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{table}\";\n\
             CREATE TABLE \"{table}\" ({defs});",
            table = self.table,
            defs = column_defs.join(", "),
        ))?;

        let placeholders: Vec<&str> = headers.iter().map(|_| "?").collect();
        let insert_sql = format!(
            "INSERT INTO \"{}\" VALUES ({})",
            self.table,
            placeholders.join(", ")
        );

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for record in &records {
                let values: Vec<rusqlite::types::Value> = (0..headers.len())
                    .map(|i| {
                        let raw = record.get(i).unwrap_or("");
                        if raw.is_empty() {
                            rusqlite::types::Value::Null
                        } else if numeric[i] {
                            raw.parse::<f64>()
                                .map(rusqlite::types::Value::Real)
                                .unwrap_or(rusqlite::types::Value::Null)
                        } else {
                            rusqlite::types::Value::Text(raw.to_string())
                        }
                    })
                    .collect();
                stmt.execute(rusqlite::params_from_iter(values))?;
            }
        }
        tx.commit()?;

        tracing::info!(
            table = %self.table,
            rows = records.len(),
            columns = headers.len(),
            "dataset loaded"
        );
        Ok(records.len())
    }

    /// Open an independent read-only connection. Each worker job gets its
    /// own; the connection closes when the returned handle is dropped.
    pub fn connect(&self) -> Result<DatasetConn, QueryError> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(DatasetConn { conn })
    }

    /// Column names and declared types of the dataset table.
    pub fn schema(&self) -> Result<Vec<(String, String)>, QueryError> {
        let conn = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", self.table))?;
        let cols = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cols)
    }
}

/// One worker's private connection to the dataset.
pub struct DatasetConn {
    conn: Connection,
}

impl DatasetConn {
    /// Run a read-only SQL query and collect the full result set.
    pub fn execute(&self, sql: &str) -> Result<QueryRows, QueryError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let column_count = columns.len();

        let mut rows = Vec::new();
        let mut raw = stmt.query([])?;
        while let Some(row) = raw.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = match row.get_ref(i)? {
                    rusqlite::types::ValueRef::Null => serde_json::Value::Null,
                    rusqlite::types::ValueRef::Integer(n) => serde_json::Value::from(n),
                    rusqlite::types::ValueRef::Real(f) => {
                        serde_json::Number::from_f64(f)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null)
                    }
                    rusqlite::types::ValueRef::Text(t) => {
                        serde_json::Value::from(String::from_utf8_lossy(t).into_owned())
                    }
                    rusqlite::types::ValueRef::Blob(_) => serde_json::Value::Null,
                };
                values.push(value);
            }
            rows.push(values);
        }

        Ok(QueryRows { columns, rows })
    }
}

fn sanitize_column(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "column".to_string()
    } else {
        cleaned
    }
}
