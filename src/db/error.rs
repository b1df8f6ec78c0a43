use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record ({0})")]
    Duplicate(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db_err) => {
                let constraint = db_err.constraint().unwrap_or("unique").to_string();
                if db_err.is_unique_violation() {
                    DatabaseError::Duplicate(constraint)
                } else if db_err.is_foreign_key_violation() {
                    DatabaseError::NotFound
                } else if db_err.is_check_violation() {
                    DatabaseError::InvalidInput(format!("constraint {} violated", constraint))
                } else {
                    DatabaseError::Sqlx(err)
                }
            }
            other => DatabaseError::Sqlx(other),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationError(err.to_string())
    }
}
