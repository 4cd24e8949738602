use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use serde_json::json;
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::models::{Client, RosterInterval};
use crate::validation::{ClientData, CreateClient, RosterEnrollment};

fn check_interval(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), AppError> {
    match end {
        Some(end) if end < start => Err(AppError::validation(
            "body",
            json!({ "endDate": ["End date must not be before start date"] }),
        )),
        _ => Ok(()),
    }
}

async fn ensure_no_overlap(
    conn: &mut SqliteConnection,
    cid: i64,
    start: NaiveDate,
    end: Option<NaiveDate>,
    exclude_start: Option<NaiveDate>,
) -> Result<(), AppError> {
    match db::find_overlapping_interval(conn, cid, start, end, exclude_start).await? {
        Some(existing) => Err(AppError::Conflict(format!(
            "Roster interval overlaps enrollment starting {}",
            existing.start_date
        ))),
        None => Ok(()),
    }
}

#[instrument(skip(pool))]
pub async fn list_clients(pool: &SqlitePool, name: Option<&str>) -> Result<Vec<Client>, AppError> {
    let name = name.map(str::trim).filter(|name| !name.is_empty());
    db::get_clients(pool, name).await
}

#[instrument(skip(pool))]
pub async fn get_client(pool: &SqlitePool, id: i64) -> Result<Client, AppError> {
    db::get_client(pool, id).await
}

#[instrument(skip(pool, data))]
pub async fn update_client(pool: &SqlitePool, id: i64, data: &ClientData) -> Result<(), AppError> {
    db::update_client(pool, id, data).await
}

/// Inserts the client and its first roster interval together.
#[instrument(skip_all, fields(start_date = %request.start_date))]
pub async fn create_client(pool: &SqlitePool, request: &CreateClient) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;

    let id = db::insert_client(&mut *tx, &request.client_data).await?;
    db::insert_roster_interval(&mut *tx, id, request.start_date, None).await?;

    tx.commit().await?;
    info!(client_id = id, "Client created");
    Ok(id)
}

#[instrument(skip(pool))]
pub async fn get_roster(pool: &SqlitePool, cid: i64) -> Result<Vec<RosterInterval>, AppError> {
    db::get_client(pool, cid).await?;
    db::get_roster(pool, cid).await
}

#[instrument(skip(pool, request))]
pub async fn add_roster_interval(
    pool: &SqlitePool,
    cid: i64,
    request: &RosterEnrollment,
) -> Result<(), AppError> {
    check_interval(request.start_date, request.end_date)?;
    db::get_client(pool, cid).await?;

    let mut tx = pool.begin().await?;
    ensure_no_overlap(&mut *tx, cid, request.start_date, request.end_date, None).await?;
    db::insert_roster_interval(&mut *tx, cid, request.start_date, request.end_date).await?;
    tx.commit().await?;

    info!(client_id = cid, "Roster interval added");
    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_roster_end(
    pool: &SqlitePool,
    cid: i64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<(), AppError> {
    check_interval(start_date, end_date)?;

    let mut tx = pool.begin().await?;

    if db::get_roster_interval(&mut *tx, cid, start_date)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("Roster interval not found".to_string()));
    }

    ensure_no_overlap(&mut *tx, cid, start_date, end_date, Some(start_date)).await?;
    db::update_roster_end(&mut *tx, cid, start_date, end_date).await?;
    tx.commit().await?;

    info!(client_id = cid, "Roster interval updated");
    Ok(())
}
