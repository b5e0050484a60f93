// sqlx::Error -> AppError mapping

use garage_core::error::AppError;

/// Convert sqlx::Error to AppError with structured information
///
/// A UNIQUE violation means another writer got there first and surfaces as
/// `AppError::Conflict`. Everything else is `AppError::Database`.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite extended result codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Conflict(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "787" | "3850" => AppError::Database(format!(
                        "Foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Database(format!("Column not found: {}", col)),
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

/// Stored integer does not fit the domain type
pub(crate) fn out_of_range(column: &str, value: i64) -> AppError {
    AppError::Database(format!("Column {} out of range: {}", column, value))
}
