/*!
 * Schema contracts for the doctor and appointment files
 *
 * Each entity declares the exact, ordered list of raw column names it accepts
 * and the shape it is persisted in. Any drift in the raw header (extra,
 * missing, renamed or reordered columns) is rejected before cleaning starts.
 */

use crate::export::SqlDialect;

/// Column contract shared by both entities
pub trait TableSchema {
    /// Entity name used in messages and as the destination table name
    const ENTITY: &'static str;

    /// Raw column names in the exact order they must appear
    fn column_names() -> Vec<&'static str>;

    /// Column names after the pipeline's renames
    fn cleaned_column_names() -> Vec<&'static str>;

    /// `CREATE TABLE` statement for the cleaned shape
    fn create_table_sql(dialect: SqlDialect) -> String;

    fn column_count() -> usize {
        Self::column_names().len()
    }

    /// Validate that a header row matches the expected schema
    fn validate_headers(headers: &[String]) -> Result<(), crate::EtlError> {
        let expected_columns = Self::column_names();

        for (i, (expected, actual)) in expected_columns.iter().zip(headers.iter()).enumerate() {
            if expected != actual {
                return Err(crate::EtlError::schema_mismatch_detailed(
                    Self::ENTITY,
                    expected_columns.len(),
                    headers.len(),
                    Some((i, expected.to_string(), actual.clone())),
                ));
            }
        }

        if headers.len() != expected_columns.len() {
            return Err(crate::EtlError::schema_mismatch_detailed(
                Self::ENTITY,
                expected_columns.len(),
                headers.len(),
                None,
            ));
        }

        Ok(())
    }
}

/// Doctors file schema
pub struct DoctorSchema;

impl TableSchema for DoctorSchema {
    const ENTITY: &'static str = "doctors";

    fn column_names() -> Vec<&'static str> {
        vec!["doctor_id", "name", "specialty"]
    }

    fn cleaned_column_names() -> Vec<&'static str> {
        vec!["id", "name", "specialty"]
    }

    fn create_table_sql(dialect: SqlDialect) -> String {
        let text = match dialect {
            SqlDialect::PostgreSQL => "VARCHAR(255)",
            SqlDialect::SQLite => "TEXT",
        };
        format!(
            "CREATE TABLE IF NOT EXISTS doctors (\n  id INTEGER PRIMARY KEY NOT NULL,\n  name {text},\n  specialty {text}\n);",
            text = text
        )
    }
}

/// Appointments file schema
pub struct AppointmentSchema;

impl TableSchema for AppointmentSchema {
    const ENTITY: &'static str = "appointments";

    fn column_names() -> Vec<&'static str> {
        vec!["booking_id", "patient_id", "doctor_id", "booking_date", "status"]
    }

    fn cleaned_column_names() -> Vec<&'static str> {
        vec!["id", "patient_id", "doctor_id", "booking_date", "status"]
    }

    fn create_table_sql(dialect: SqlDialect) -> String {
        let status = match dialect {
            SqlDialect::PostgreSQL => "VARCHAR(50)",
            SqlDialect::SQLite => "TEXT",
        };
        format!(
            "CREATE TABLE IF NOT EXISTS appointments (\n  id INTEGER PRIMARY KEY NOT NULL,\n  patient_id INTEGER NOT NULL,\n  doctor_id INTEGER REFERENCES doctors(id),\n  booking_date TIMESTAMP,\n  status {status}\n);",
            status = status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EtlError;

    fn headers(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_headers_accepted() {
        assert!(DoctorSchema::validate_headers(&headers(&["doctor_id", "name", "specialty"])).is_ok());
        assert!(AppointmentSchema::validate_headers(&headers(&[
            "booking_id", "patient_id", "doctor_id", "booking_date", "status"
        ])).is_ok());
    }

    #[test]
    fn test_missing_column_rejected() {
        let err = DoctorSchema::validate_headers(&headers(&["doctor_id", "name"])).unwrap_err();
        match err {
            EtlError::SchemaMismatch { expected_columns, found_columns, mismatched_column, .. } => {
                assert_eq!(expected_columns, 3);
                assert_eq!(found_columns, 2);
                assert!(mismatched_column.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reordered_and_renamed_rejected() {
        assert!(DoctorSchema::validate_headers(&headers(&["name", "doctor_id", "specialty"])).is_err());
        assert!(DoctorSchema::validate_headers(&headers(&["Doctor_ID", "name", "specialty"])).is_err());
        assert!(DoctorSchema::validate_headers(&headers(&["doctor_id", "name", "specialty", "extra"])).is_err());
    }

    #[test]
    fn test_ddl_names_cleaned_columns() {
        let ddl = AppointmentSchema::create_table_sql(SqlDialect::SQLite);
        for col in AppointmentSchema::cleaned_column_names() {
            assert!(ddl.contains(col), "{} missing from DDL", col);
        }
        assert!(DoctorSchema::create_table_sql(SqlDialect::PostgreSQL).contains("VARCHAR(255)"));
        assert_eq!(AppointmentSchema::column_count(), 5);
        for dialect in [SqlDialect::PostgreSQL, SqlDialect::SQLite] {
            assert!(DoctorSchema::create_table_sql(dialect).contains("id INTEGER PRIMARY KEY NOT NULL"));
            assert!(AppointmentSchema::create_table_sql(dialect).contains("id INTEGER PRIMARY KEY NOT NULL"));
        }
    }
}
