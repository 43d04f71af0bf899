//! Conversions from external infrastructure errors into domain errors.

use mindhit_domain::MindhitError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub MindhitError);

impl From<InfraError> for MindhitError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MindhitError> for InfraError {
    fn from(value: MindhitError) -> Self {
        InfraError(value)
    }
}

trait IntoMindhitError {
    fn into_mindhit(self) -> MindhitError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → MindhitError */
/* -------------------------------------------------------------------------- */

impl IntoMindhitError for SqlError {
    fn into_mindhit(self) -> MindhitError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => MindhitError::Storage("database is busy".into()),
                    ErrorCode::DatabaseLocked => {
                        MindhitError::Storage("database is locked".into())
                    }
                    ErrorCode::DiskFull => MindhitError::Storage("disk is full".into()),
                    ErrorCode::ReadOnly => {
                        MindhitError::Storage("database is read-only".into())
                    }
                    _ => MindhitError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => MindhitError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                MindhitError::Storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                MindhitError::Storage(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => MindhitError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => MindhitError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_mindhit())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → MindhitError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(MindhitError::Storage(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → MindhitError */
/* -------------------------------------------------------------------------- */

impl IntoMindhitError for HttpError {
    fn into_mindhit(self) -> MindhitError {
        if self.is_timeout() {
            return MindhitError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return MindhitError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return MindhitError::Config(format!("invalid HTTP client setup: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => MindhitError::Auth(message),
                404 => MindhitError::NotFound(message),
                400..=499 => MindhitError::InvalidInput(message),
                _ => MindhitError::Network(message),
            };
        }

        MindhitError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_mindhit())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json / toml → MindhitError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(MindhitError::InvalidInput(format!("invalid JSON: {value}")))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(MindhitError::Config(format!("invalid TOML: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
