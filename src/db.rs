use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::auth::{Session, SessionData, User};
use crate::error::AppError;
use crate::models::{AttendanceDay, AttendanceEntry, Client, RosterInterval, Side};
use crate::validation::{Application, AttendanceUpsert, ClientData, Contact, UserData};

/// Sentinel used as the upper bound of an open-ended roster interval.
const OPEN_END: &str = "9999-12-31";

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, User>(
        "SELECT id, fname, lname, username, side, role, status FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

#[instrument(skip(pool))]
pub async fn get_user_by_username(pool: &Pool<Sqlite>, username: &str) -> Result<User, AppError> {
    info!("Fetching user by username");
    let row = sqlx::query_as::<_, User>(
        "SELECT id, fname, lname, username, side, role, status FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

#[instrument(skip(pool))]
pub async fn get_all_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
    info!("Getting all users");
    let rows = sqlx::query_as::<_, User>(
        "SELECT id, fname, lname, username, side, role, status
         FROM users
         ORDER BY lname, fname, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip_all, fields(username = %data.username))]
pub async fn insert_user(conn: &mut SqliteConnection, data: &UserData) -> Result<i64, AppError> {
    info!("Inserting user");
    let res = sqlx::query(
        "INSERT INTO users (fname, lname, username, side, role, status) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&data.fname)
    .bind(&data.lname)
    .bind(&data.username)
    .bind(data.side)
    .bind(data.role)
    .bind(data.status)
    .execute(conn)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, data))]
pub async fn update_user(pool: &Pool<Sqlite>, id: i64, data: &UserData) -> Result<(), AppError> {
    info!("Updating user");
    let res = sqlx::query(
        "UPDATE users
         SET fname = ?, lname = ?, username = ?, side = ?, role = ?, status = ?
         WHERE id = ?",
    )
    .bind(&data.fname)
    .bind(&data.lname)
    .bind(&data.username)
    .bind(data.side)
    .bind(data.role)
    .bind(data.status)
    .bind(id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(())
}

#[instrument(skip(conn))]
pub async fn delete_user(conn: &mut SqliteConnection, id: i64) -> Result<u64, AppError> {
    info!("Deleting user");
    let res = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(res.rows_affected())
}

/// Escapes `%`, `_` and the escape character itself so a name matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[instrument(skip(pool))]
pub async fn get_clients(pool: &Pool<Sqlite>, name: Option<&str>) -> Result<Vec<Client>, AppError> {
    info!("Getting clients");
    let pattern = name.map(|name| format!("%{}%", escape_like(name)));
    let rows = sqlx::query_as::<_, Client>(
        r"SELECT id, fname, lname, side, status
         FROM clients
         WHERE ? IS NULL OR fname LIKE ? ESCAPE '\' OR lname LIKE ? ESCAPE '\'
         ORDER BY lname, fname, id",
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_client(pool: &Pool<Sqlite>, id: i64) -> Result<Client, AppError> {
    info!("Fetching client by ID");
    let row = sqlx::query_as::<_, Client>(
        "SELECT id, fname, lname, side, status FROM clients WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::NotFound("Client not found".to_string()))
}

#[instrument(skip_all)]
pub async fn insert_client(conn: &mut SqliteConnection, data: &ClientData) -> Result<i64, AppError> {
    info!("Inserting client");
    let res = sqlx::query("INSERT INTO clients (fname, lname, side, status) VALUES (?, ?, ?, ?)")
        .bind(&data.fname)
        .bind(&data.lname)
        .bind(data.side)
        .bind(data.status)
        .execute(conn)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, data))]
pub async fn update_client(pool: &Pool<Sqlite>, id: i64, data: &ClientData) -> Result<(), AppError> {
    info!("Updating client");
    let res = sqlx::query(
        "UPDATE clients SET fname = ?, lname = ?, side = ?, status = ? WHERE id = ?",
    )
    .bind(&data.fname)
    .bind(&data.lname)
    .bind(data.side)
    .bind(data.status)
    .bind(id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Client not found".to_string()));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_roster(pool: &Pool<Sqlite>, cid: i64) -> Result<Vec<RosterInterval>, AppError> {
    info!("Getting roster intervals");
    let rows = sqlx::query_as::<_, RosterInterval>(
        "SELECT cid, start_date, end_date, created_at
         FROM client_roster
         WHERE cid = ?
         ORDER BY start_date",
    )
    .bind(cid)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(conn))]
pub async fn get_roster_interval(
    conn: &mut SqliteConnection,
    cid: i64,
    start_date: NaiveDate,
) -> Result<Option<RosterInterval>, AppError> {
    let row = sqlx::query_as::<_, RosterInterval>(
        "SELECT cid, start_date, end_date, created_at
         FROM client_roster
         WHERE cid = ? AND start_date = ?",
    )
    .bind(cid)
    .bind(start_date)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// First interval of `cid` intersecting `[start_date, end_date]`, ignoring the
/// interval that starts on `exclude_start`.
#[instrument(skip(conn))]
pub async fn find_overlapping_interval(
    conn: &mut SqliteConnection,
    cid: i64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    exclude_start: Option<NaiveDate>,
) -> Result<Option<RosterInterval>, AppError> {
    let row = sqlx::query_as::<_, RosterInterval>(
        "SELECT cid, start_date, end_date, created_at
         FROM client_roster
         WHERE cid = ?
           AND start_date <= COALESCE(?, ?)
           AND COALESCE(end_date, ?) >= ?
           AND (? IS NULL OR start_date <> ?)
         ORDER BY start_date
         LIMIT 1",
    )
    .bind(cid)
    .bind(end_date)
    .bind(OPEN_END)
    .bind(OPEN_END)
    .bind(start_date)
    .bind(exclude_start)
    .bind(exclude_start)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

#[instrument(skip(conn))]
pub async fn insert_roster_interval(
    conn: &mut SqliteConnection,
    cid: i64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<(), AppError> {
    info!("Inserting roster interval");
    sqlx::query("INSERT INTO client_roster (cid, start_date, end_date) VALUES (?, ?, ?)")
        .bind(cid)
        .bind(start_date)
        .bind(end_date)
        .execute(conn)
        .await?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn update_roster_end(
    conn: &mut SqliteConnection,
    cid: i64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<u64, AppError> {
    info!("Updating roster interval end");
    let res = sqlx::query("UPDATE client_roster SET end_date = ? WHERE cid = ? AND start_date = ?")
        .bind(end_date)
        .bind(cid)
        .bind(start_date)
        .execute(conn)
        .await?;

    Ok(res.rows_affected())
}

/// Clients of `side` rostered on `date`, each joined to that day's attendance row.
#[instrument(skip(pool))]
pub async fn get_attendance(
    pool: &Pool<Sqlite>,
    date: NaiveDate,
    side: Side,
) -> Result<Vec<AttendanceEntry>, AppError> {
    info!("Getting attendance for date");
    let rows = sqlx::query_as::<_, AttendanceEntry>(
        "SELECT c.id AS cid, c.fname, c.lname, a.attendance_status
         FROM clients c
         LEFT JOIN attendance a ON a.cid = c.id AND a.attendance_date = ?
         WHERE c.side = ?
           AND EXISTS (
               SELECT 1 FROM client_roster r
               WHERE r.cid = c.id
                 AND r.start_date <= ?
                 AND (r.end_date IS NULL OR r.end_date >= ?)
           )
         ORDER BY c.lname, c.fname, c.id",
    )
    .bind(date)
    .bind(side)
    .bind(date)
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip_all, fields(cid = record.cid, date = %record.attendance_date))]
pub async fn upsert_attendance(
    conn: &mut SqliteConnection,
    record: &AttendanceUpsert,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO attendance (cid, attendance_date, attendance_status)
         VALUES (?, ?, ?)
         ON CONFLICT (cid, attendance_date) DO UPDATE
         SET attendance_status = excluded.attendance_status,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(record.cid)
    .bind(record.attendance_date)
    .bind(record.attendance_status)
    .execute(conn)
    .await?;

    Ok(())
}

/// Attendance rows of one client with `from <= date < until`.
#[instrument(skip(pool))]
pub async fn get_client_attendance(
    pool: &Pool<Sqlite>,
    cid: i64,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<AttendanceDay>, AppError> {
    info!("Getting client attendance for range");
    let rows = sqlx::query_as::<_, AttendanceDay>(
        "SELECT attendance_date, attendance_status
         FROM attendance
         WHERE cid = ? AND attendance_date >= ? AND attendance_date < ?
         ORDER BY attendance_date",
    )
    .bind(cid)
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool, sid, data))]
pub async fn create_session(
    pool: &Pool<Sqlite>,
    sid: &str,
    data: &SessionData,
    expire: NaiveDateTime,
) -> Result<(), AppError> {
    info!("Creating session");
    let sess = serde_json::to_string(data)?;

    sqlx::query("INSERT INTO sessions (sid, sess, expire) VALUES (?, ?, ?)")
        .bind(sid)
        .bind(sess)
        .bind(expire)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool, sid))]
pub async fn get_session(pool: &Pool<Sqlite>, sid: &str) -> Result<Session, AppError> {
    let session = sqlx::query_as::<_, Session>("SELECT sess, expire FROM sessions WHERE sid = ?")
        .bind(sid)
        .fetch_optional(pool)
        .await?;

    session.ok_or_else(|| AppError::Authentication("Invalid session".to_string()))
}

#[instrument(skip(pool, sid))]
pub async fn delete_session(pool: &Pool<Sqlite>, sid: &str) -> Result<(), AppError> {
    info!("Deleting session");
    sqlx::query("DELETE FROM sessions WHERE sid = ?")
        .bind(sid)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");
    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM sessions WHERE expire < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument(skip_all)]
pub async fn insert_contact(pool: &Pool<Sqlite>, contact: &Contact) -> Result<i64, AppError> {
    info!("Inserting contact submission");
    let res = sqlx::query(
        "INSERT INTO contact (fname, lname, email, phone, message) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&contact.fname)
    .bind(&contact.lname)
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.message)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip_all)]
pub async fn insert_application(
    pool: &Pool<Sqlite>,
    application: &Application,
) -> Result<i64, AppError> {
    info!("Inserting application submission");
    let res = sqlx::query(
        "INSERT INTO application (fname, lname, email, phone, message) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&application.fname)
    .bind(&application.lname)
    .bind(&application.email)
    .bind(&application.phone)
    .bind(&application.message)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}
