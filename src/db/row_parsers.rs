use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::DbUser;

/// Accepts RFC 3339, SQLite's `datetime('now')` format and bare dates.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

pub fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s.trim()).map_err(|e| AppError::internal(format!("invalid uuid: {}", e)))
}

fn column<T>(row: &SqliteRow, name: &str) -> Result<T, AppError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

pub fn db_user_from_row(row: &SqliteRow) -> Result<DbUser, AppError> {
    let id: String = column(row, "id")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(DbUser {
        id: parse_uuid(&id)?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}
