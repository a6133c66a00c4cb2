//! Column-extraction helpers shared by every repository. Centralizes the
//! TEXT-column encodings (UUID, RFC3339 timestamp, JSON) so each repository
//! only has to declare a SELECT's column order once.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use libsql::Row;
use uuid::Uuid;

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn uuid_col(row: &Row, idx: i32) -> Result<Uuid, DbError> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| DbError::MappingError(format!("bad uuid column: {e}")))
}

pub fn opt_uuid_col(row: &Row, idx: i32) -> Result<Option<Uuid>, DbError> {
    match row.get::<Option<String>>(idx)? {
        Some(raw) => Ok(Some(
            Uuid::parse_str(&raw).map_err(|e| DbError::MappingError(format!("bad uuid column: {e}")))?,
        )),
        None => Ok(None),
    }
}

pub fn datetime_col(row: &Row, idx: i32) -> Result<DateTime<Utc>, DbError> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::MappingError(format!("bad timestamp column: {e}")))
}

pub fn opt_datetime_col(row: &Row, idx: i32) -> Result<Option<DateTime<Utc>>, DbError> {
    match row.get::<Option<String>>(idx)? {
        Some(raw) => Ok(Some(
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DbError::MappingError(format!("bad timestamp column: {e}")))?,
        )),
        None => Ok(None),
    }
}

pub fn json_col(row: &Row, idx: i32) -> Result<serde_json::Value, DbError> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| DbError::MappingError(format!("bad json column: {e}")))
}

pub fn opt_json_col(row: &Row, idx: i32) -> Result<Option<serde_json::Value>, DbError> {
    match row.get::<Option<String>>(idx)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw).map_err(|e| {
            DbError::MappingError(format!("bad json column: {e}"))
        })?)),
        None => Ok(None),
    }
}
