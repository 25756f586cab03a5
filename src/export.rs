/*!
 * Table sinks
 *
 * A sink persists a cleaned table to a destination: a file (overwritten on
 * every write) or a named relational table (rows appended, no upsert). CSV
 * and JSON sinks take file destinations; the SQL script and SQLite sinks take
 * table destinations.
 */

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Result, EtlError, ExportFormat};
use crate::schema::{AppointmentSchema, DoctorSchema, TableSchema};
use crate::table::{Table, Value};

/// Where a sink writes a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A file, replaced on every write
    File(PathBuf),
    /// A named relational table, appended to
    Table(String),
}

impl Destination {
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Destination::File(path.into())
    }

    pub fn table<S: Into<String>>(name: S) -> Self {
        Destination::Table(name.into())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::File(path) => write!(f, "file {}", path.display()),
            Destination::Table(name) => write!(f, "table {}", name),
        }
    }
}

/// Trait for persisting cleaned tables
pub trait TableSink {
    /// Write the table to the destination
    fn write(&self, table: &Table, destination: &Destination) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;
}

/// SQL dialect for generated DDL and literals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    #[serde(alias = "postgres")]
    PostgreSQL,
    SQLite,
}

impl FromStr for SqlDialect {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(SqlDialect::PostgreSQL),
            "sqlite" => Ok(SqlDialect::SQLite),
            other => Err(EtlError::Configuration {
                message: format!("Unknown SQL dialect '{}'", other),
                suggestion: Some("Use 'postgresql' or 'sqlite'".to_string()),
            }),
        }
    }
}

/// CSV file sink
pub struct CsvSink {
    /// Whether to include the header row
    pub include_headers: bool,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvSink {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
        }
    }
}

impl CsvSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }
}

impl TableSink for CsvSink {
    fn write(&self, table: &Table, destination: &Destination) -> Result<()> {
        let path = file_destination(destination, self.format())?;
        create_parent_dirs(path)?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)?;

        if self.include_headers {
            writer.write_record(table.columns())?;
        }
        for row in table.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;

        info!(rows = table.len(), path = %path.display(), "Wrote CSV");
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// JSON file sink
pub struct JsonSink {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
    /// Whether to export as JSON Lines (one record per line)
    pub json_lines: bool,
}

impl Default for JsonSink {
    fn default() -> Self {
        Self {
            pretty_print: true,
            json_lines: false,
        }
    }
}

impl JsonSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// Set JSON Lines format
    pub fn as_json_lines(mut self) -> Self {
        self.json_lines = true;
        self.pretty_print = false;
        self
    }
}

impl TableSink for JsonSink {
    fn write(&self, table: &Table, destination: &Destination) -> Result<()> {
        let path = file_destination(destination, self.format())?;
        create_parent_dirs(path)?;

        let mut writer = BufWriter::new(File::create(path)?);
        let records = table.to_json_records();

        if self.json_lines {
            for record in &records {
                serde_json::to_writer(&mut writer, record)?;
                writeln!(writer)?;
            }
        } else if self.pretty_print {
            serde_json::to_writer_pretty(&mut writer, &records)?;
        } else {
            serde_json::to_writer(&mut writer, &records)?;
        }
        writer.flush()?;

        info!(rows = table.len(), path = %path.display(), "Wrote JSON");
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }
}

/// Appends `INSERT` statements to a SQL script
pub struct SqlScriptSink {
    /// Script file, created if missing and appended to
    pub script_path: PathBuf,
    /// SQL dialect to use
    pub dialect: SqlDialect,
    /// Rows per `INSERT` statement
    pub batch_size: usize,
    /// Whether to emit `CREATE TABLE IF NOT EXISTS` before the inserts
    pub include_schema: bool,
}

impl SqlScriptSink {
    pub fn new<P: Into<PathBuf>>(script_path: P) -> Self {
        Self {
            script_path: script_path.into(),
            dialect: SqlDialect::PostgreSQL,
            batch_size: 1000,
            include_schema: true,
        }
    }

    /// Set the SQL dialect
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_schema(mut self, include: bool) -> Self {
        self.include_schema = include;
        self
    }

    fn write_inserts(&self, writer: &mut dyn Write, name: &str, table: &Table) -> Result<()> {
        let columns = table.columns().join(", ");

        for chunk in table.rows().chunks(self.batch_size) {
            writeln!(writer, "INSERT INTO {} ({}) VALUES", name, columns)?;

            for (i, row) in chunk.iter().enumerate() {
                let values = row
                    .iter()
                    .map(|v| sql_literal(v, self.dialect))
                    .collect::<Vec<_>>()
                    .join(", ");

                if i < chunk.len() - 1 {
                    writeln!(writer, "  ({}),", values)?;
                } else {
                    writeln!(writer, "  ({});", values)?;
                }
            }
        }
        Ok(())
    }
}

impl TableSink for SqlScriptSink {
    fn write(&self, table: &Table, destination: &Destination) -> Result<()> {
        let name = table_destination(destination, self.format())?;
        check_primary_key(name, table, self.format())?;
        create_parent_dirs(&self.script_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.script_path)?;
        let mut writer = BufWriter::new(file);

        if self.include_schema {
            writeln!(writer, "{}\n", create_table_sql(name, table, self.dialect))?;
        }
        if !table.is_empty() {
            writeln!(writer, "-- {} rows for {}", table.len(), name)?;
            self.write_inserts(&mut writer, name, table)?;
        }
        writer.flush()?;

        info!(rows = table.len(), table = name, script = %self.script_path.display(), "Appended SQL inserts");
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Sql
    }
}

/// Appends rows to a SQLite database
#[cfg(feature = "sqlite")]
pub struct SqliteSink {
    /// Database file, created if missing
    pub db_path: PathBuf,
}

#[cfg(feature = "sqlite")]
impl SqliteSink {
    pub fn new<P: Into<PathBuf>>(db_path: P) -> Self {
        Self { db_path: db_path.into() }
    }
}

#[cfg(feature = "sqlite")]
impl TableSink for SqliteSink {
    fn write(&self, table: &Table, destination: &Destination) -> Result<()> {
        use rusqlite::{params_from_iter, Connection};

        let name = table_destination(destination, self.format())?;
        check_primary_key(name, table, self.format())?;
        create_parent_dirs(&self.db_path)?;

        let mut conn = Connection::open(&self.db_path)?;
        conn.execute_batch(&create_table_sql(name, table, SqlDialect::SQLite))?;

        let placeholders = (1..=table.columns().len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            name,
            table.columns().join(", "),
            placeholders
        );

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in table.rows() {
                stmt.execute(params_from_iter(row.iter().map(sqlite_value)))?;
            }
        }
        tx.commit()?;

        info!(rows = table.len(), table = name, db = %self.db_path.display(), "Appended rows to SQLite");
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Sqlite
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        Value::Null => Sql::Null,
        Value::Int(i) => Sql::Integer(*i),
        Value::Float(f) if f.is_finite() => Sql::Real(*f),
        Value::Float(_) => Sql::Null,
        Value::Text(s) => Sql::Text(s.clone()),
        Value::DateTime(dt) => Sql::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
    }
}

/// DDL for a destination table: the entity schema when the name is known,
/// otherwise one untyped column per table column
pub fn create_table_sql(name: &str, table: &Table, dialect: SqlDialect) -> String {
    if name == DoctorSchema::ENTITY {
        return DoctorSchema::create_table_sql(dialect);
    }
    if name == AppointmentSchema::ENTITY {
        return AppointmentSchema::create_table_sql(dialect);
    }

    let text = match dialect {
        SqlDialect::PostgreSQL => "VARCHAR(255)",
        SqlDialect::SQLite => "TEXT",
    };
    let columns = table
        .columns()
        .iter()
        .map(|c| format!("  {} {}", c, text))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n);", name, columns)
}

/// Render a value as a SQL literal
pub fn sql_literal(value: &Value, dialect: SqlDialect) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
        Value::Bool(b) => match dialect {
            SqlDialect::PostgreSQL => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            SqlDialect::SQLite => (if *b { "1" } else { "0" }).to_string(),
        },
    }
}

fn file_destination(destination: &Destination, format: ExportFormat) -> Result<&Path> {
    match destination {
        Destination::File(path) => Ok(path),
        Destination::Table(name) => Err(EtlError::Export {
            message: format!("{} sink cannot write to table '{}'", format, name),
            format,
            suggestion: Some("Use a file destination".to_string()),
        }),
    }
}

fn table_destination(destination: &Destination, format: ExportFormat) -> Result<&str> {
    match destination {
        Destination::Table(name) if is_identifier(name) => Ok(name),
        Destination::Table(name) => Err(EtlError::Export {
            message: format!("'{}' is not a valid table name", name),
            format,
            suggestion: Some("Table names may contain only letters, digits and underscores".to_string()),
        }),
        Destination::File(path) => Err(EtlError::Export {
            message: format!("{} sink cannot write to file {}", format, path.display()),
            format,
            suggestion: Some("Use a table destination".to_string()),
        }),
    }
}

/// Refuse rows whose `id` is null when writing an entity table
///
/// SQLite turns a NULL written to an `INTEGER PRIMARY KEY` column into a fresh
/// rowid, ignoring `NOT NULL`, so the check has to happen before the insert.
fn check_primary_key(name: &str, table: &Table, format: ExportFormat) -> Result<()> {
    if name != DoctorSchema::ENTITY && name != AppointmentSchema::ENTITY {
        return Ok(());
    }

    let missing = table.column_values("id")?.filter(|v| v.is_null()).count();
    if missing > 0 {
        return Err(EtlError::Export {
            message: format!("{} row(s) for '{}' have a null primary key 'id'", missing, name),
            format,
            suggestion: Some("Check the raw identifier column; rows without an id cannot be stored".to_string()),
        });
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn create_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
