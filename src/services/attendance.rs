use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::models::{AttendanceEntry, ClientAttendanceMap};
use crate::validation::{AttendanceQuery, AttendanceUpsert, ClientAttendanceQuery};

#[instrument(skip(pool))]
pub async fn get_attendance(
    pool: &SqlitePool,
    query: AttendanceQuery,
) -> Result<Vec<AttendanceEntry>, AppError> {
    db::get_attendance(pool, query.date, query.side).await
}

/// Writes every record or none of them.
#[instrument(skip_all, fields(count = records.len()))]
pub async fn upsert_attendance(
    pool: &SqlitePool,
    records: &[AttendanceUpsert],
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    for record in records {
        db::upsert_attendance(&mut *tx, record).await?;
    }

    tx.commit().await?;
    info!("Attendance saved");
    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_client_attendance(
    pool: &SqlitePool,
    query: ClientAttendanceQuery,
) -> Result<ClientAttendanceMap, AppError> {
    let rows = db::get_client_attendance(
        pool,
        query.cid,
        query.month.first_day(),
        query.month.next_first_day(),
    )
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.attendance_date.format("%Y-%m-%d").to_string(), row.attendance_status))
        .collect())
}
