/*!
 * Reader for raw doctor and appointment files
 *
 * Loads a delimited file into a `Table`, inferring each cell as null, integer,
 * float, boolean or text. With the `excel` feature, `.xlsx`, `.xls`, `.xlsm`
 * and `.ods` workbooks are read from their first sheet, whose first row is the
 * header. Header validation against a schema is optional here because the
 * entity pipelines always validate again before cleaning.
 */

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info, warn};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::{Result, EtlError, ErrorContext};
use crate::schema::TableSchema;
use crate::table::{Table, Value};

/// Extensions read as workbooks rather than CSV
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsm", "ods"];

/// Reader for raw input tables
#[derive(Debug, Clone)]
pub struct TableReader {
    delimiter: u8,
    /// Skip rows the CSV parser rejects instead of failing
    skip_invalid_records: bool,
    #[cfg(feature = "progress")]
    show_progress_bar: bool,
}

impl Default for TableReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableReader {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            skip_invalid_records: false,
            #[cfg(feature = "progress")]
            show_progress_bar: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Enable or disable skipping malformed rows
    pub fn with_skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    /// Enable or disable the progress bar
    #[cfg(feature = "progress")]
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    /// Load a file into a table
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Table> {
        let path = path.as_ref();
        if check_source(path)? == SourceKind::Workbook {
            return self.read_workbook(path);
        }

        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        self.read_table(file, file_size, Some(path))
    }

    /// Load a file and reject it early if its header does not match `S`
    pub fn load_with_schema<S: TableSchema, P: AsRef<Path>>(&self, path: P) -> Result<Table> {
        let table = self.load(path)?;
        S::validate_headers(table.columns())?;
        Ok(table)
    }

    /// Read CSV text from any reader
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<Table> {
        self.read_table(reader, 0, None)
    }

    fn read_table<R: Read>(&self, source: R, total_bytes: u64, path: Option<&Path>) -> Result<Table> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .from_reader(source);

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        debug!(columns = ?headers, "Read header");

        let mut table = Table::new(headers);
        let mut invalid_count = 0usize;
        let start_time = Instant::now();

        #[cfg(feature = "progress")]
        let progress_bar = if self.show_progress_bar && total_bytes > 0 {
            let pb = ProgressBar::new(total_bytes);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-")
            );
            Some(pb)
        } else {
            None
        };
        #[cfg(not(feature = "progress"))]
        let _ = total_bytes;

        let mut record = StringRecord::new();
        // header is line 1
        let mut line_number = 1;
        loop {
            line_number += 1;
            let row = match reader.read_record(&mut record) {
                Ok(false) => break,
                Ok(true) => table.push_row(record.iter().map(Value::infer).collect()),
                Err(e) => Err(EtlError::CsvParse {
                    message: e.to_string(),
                    line: Some(line_number),
                    context: ErrorContext {
                        file_path: path.map(Path::to_path_buf),
                        line_number: Some(line_number),
                        column_name: failing_column(&e, table.columns()),
                    },
                }),
            };

            if let Err(e) = row {
                if !self.skip_invalid_records {
                    return Err(e);
                }
                invalid_count += 1;
                if invalid_count <= 10 {
                    warn!(line = line_number, error = %e, "Skipping invalid record");
                }
            }

            #[cfg(feature = "progress")]
            if let Some(ref pb) = progress_bar {
                pb.set_position(reader.position().byte().min(total_bytes));
            }
        }

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_with_message("Loading complete");
        }

        info!(
            rows = table.len(),
            skipped = invalid_count,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "<reader>".to_string()),
            "Loaded raw table"
        );
        Ok(table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Delimited,
    Workbook,
}

/// Reject missing files and tell delimited text from workbooks
fn check_source(path: &Path) -> Result<SourceKind> {
    if !path.exists() {
        return Err(EtlError::file_not_found_with_suggestion(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        if cfg!(feature = "excel") {
            return Ok(SourceKind::Workbook);
        }
        return Err(EtlError::unsupported_format(path.to_path_buf(), &extension));
    }
    Ok(SourceKind::Delimited)
}

/// Header of the field a CSV error points at, when the error names one
fn failing_column(error: &csv::Error, headers: &[String]) -> Option<String> {
    match error.kind() {
        csv::ErrorKind::Utf8 { err, .. } => headers.get(err.field()).cloned(),
        _ => None,
    }
}

#[cfg(feature = "excel")]
impl TableReader {
    /// Read the first sheet of a workbook; its first row is the header
    fn read_workbook(&self, path: &Path) -> Result<Table> {
        use calamine::{open_workbook_auto, Reader};

        let start_time = Instant::now();
        let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(path, e))?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .ok_or_else(|| workbook_error(path, "workbook has no sheets"))?;
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| workbook_error(path, e))?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .ok_or_else(|| workbook_error(path, format!("sheet '{}' has no header row", sheet_name)))?
            .iter()
            .map(header_text)
            .collect();
        debug!(columns = ?headers, sheet = %sheet_name, "Read header");

        let mut table = Table::new(headers);
        for row in rows {
            table.push_row(row.iter().map(cell_value).collect())?;
        }

        info!(
            rows = table.len(),
            sheet = %sheet_name,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            source = %path.display(),
            "Loaded raw table"
        );
        Ok(table)
    }
}

#[cfg(not(feature = "excel"))]
impl TableReader {
    fn read_workbook(&self, path: &Path) -> Result<Table> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Err(EtlError::unsupported_format(path.to_path_buf(), &extension))
    }
}

#[cfg(feature = "excel")]
fn workbook_error(path: &Path, error: impl std::fmt::Display) -> EtlError {
    EtlError::Workbook {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

#[cfg(feature = "excel")]
fn header_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map a sheet cell onto the same values a CSV field would produce
///
/// Sheets store every number as a float, so whole numbers come back as
/// integers. Text goes through the same inference as a CSV field.
#[cfg(feature = "excel")]
fn cell_value(cell: &calamine::Data) -> Value {
    use calamine::Data;

    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) if f.is_nan() => Value::Null,
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::Int(*f as i64),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::infer(s),
        Data::DateTime(dt) => dt.as_datetime().map(Value::DateTime).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DoctorSchema;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_infers_values() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doctors.csv", "doctor_id,name,specialty\n1,A,X\n2 ,B,\nNA,C,Z\n");

        let table = TableReader::new().load(&path).unwrap();
        assert_eq!(table.columns(), &["doctor_id", "name", "specialty"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0][0], Value::Int(1));
        assert_eq!(table.rows()[1][0], Value::from("2 "));
        assert_eq!(table.rows()[1][2], Value::Null);
        assert_eq!(table.rows()[2][0], Value::Null);
    }

    #[test]
    fn test_missing_file() {
        let err = TableReader::new().load("/nonexistent/doctors.csv").unwrap_err();
        assert!(matches!(err, EtlError::FileNotFound { .. }));
    }

    #[cfg(not(feature = "excel"))]
    #[test]
    fn test_spreadsheet_needs_excel_feature() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doctors.xlsx", "not really a spreadsheet");
        let err = TableReader::new().load(&path).unwrap_err();
        assert!(matches!(err, EtlError::UnsupportedFormat { ref extension, .. } if extension == "xlsx"));
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_corrupt_workbook_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doctors.xlsx", "not really a spreadsheet");
        let err = TableReader::new().load(&path).unwrap_err();
        assert!(matches!(err, EtlError::Workbook { .. }));
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_sheet_cells_map_like_csv_fields() {
        use calamine::Data;

        assert_eq!(cell_value(&Data::Empty), Value::Null);
        assert_eq!(cell_value(&Data::Float(3.0)), Value::Int(3));
        assert_eq!(cell_value(&Data::Float(2.5)), Value::Float(2.5));
        assert_eq!(cell_value(&Data::String("N/A".to_string())), Value::Null);
        assert_eq!(cell_value(&Data::String("007".to_string())), Value::from("007"));
        assert_eq!(cell_value(&Data::Bool(true)), Value::Bool(true));
    }

    #[test]
    fn test_invalid_utf8_names_the_column() {
        let mut csv = b"doctor_id,name,specialty\n1,".to_vec();
        csv.extend_from_slice(&[0xff, 0xfe]);
        csv.extend_from_slice(b",X\n");

        let err = TableReader::new().load_from_reader(csv.as_slice()).unwrap_err();
        match err {
            EtlError::CsvParse { ref context, .. } => {
                assert_eq!(context.column_name.as_deref(), Some("name"));
                assert_eq!(context.line_number, Some(2));
            }
            ref other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.user_message().contains("Column: name"));
    }

    #[test]
    fn test_ragged_row_fails_or_is_skipped() {
        let csv = "doctor_id,name,specialty\n1,A,X\n2,B\n3,C,Z\n";

        let err = TableReader::new().load_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, EtlError::CsvParse { line: Some(3), .. }));

        let table = TableReader::new()
            .with_skip_invalid_records(true)
            .load_from_reader(csv.as_bytes())
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_load_with_schema() {
        let dir = TempDir::new().unwrap();
        let good = write_file(&dir, "doctors.csv", "doctor_id,name,specialty\n1,A,X\n");
        let bad = write_file(&dir, "doctors_bad.csv", "doctor_id,name\n1,A\n");

        assert!(TableReader::new().load_with_schema::<DoctorSchema, _>(&good).is_ok());
        let err = TableReader::new().load_with_schema::<DoctorSchema, _>(&bad).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_semicolon_delimiter() {
        let table = TableReader::new()
            .with_delimiter(b';')
            .load_from_reader("a;b\n1;x\n".as_bytes())
            .unwrap();
        assert_eq!(table.columns(), &["a", "b"]);
        assert_eq!(table.rows()[0], vec![Value::Int(1), Value::from("x")]);
    }
}
