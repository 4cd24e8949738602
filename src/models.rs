use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Physical program location. `Both` is only meaningful for staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Side {
    One,
    Two,
    Both,
}

impl Side {
    pub const ALL: [Side; 3] = [Side::One, Side::Two, Side::Both];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::One => "One",
            Side::Two => "Two",
            Side::Both => "Both",
        }
    }

    pub fn parse(value: &str) -> Option<Side> {
        Side::ALL.into_iter().find(|side| side.as_str() == value)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Status {
    Active,
    Deactivated,
}

impl Status {
    pub const ALL: [Status; 2] = [Status::Active, Status::Deactivated];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "Active",
            Status::Deactivated => "Deactivated",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum AttendanceStatus {
    Here,
    Absent,
    #[serde(rename = "Not Scheduled")]
    #[sqlx(rename = "Not Scheduled")]
    NotScheduled,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 3] = [
        AttendanceStatus::Here,
        AttendanceStatus::Absent,
        AttendanceStatus::NotScheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Here => "Here",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::NotScheduled => "Not Scheduled",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct Client {
    pub id: i64,
    pub fname: String,
    pub lname: String,
    pub side: Side,
    pub status: Status,
}

/// One enrollment interval. `end_date == None` means currently enrolled.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct RosterInterval {
    pub cid: i64,
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "createdAt")]
    pub created_at: NaiveDateTime,
}

/// A rostered client for one day. `attendance_status` is `None` when nothing
/// has been recorded for that day yet.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct AttendanceEntry {
    pub cid: i64,
    pub fname: String,
    pub lname: String,
    pub attendance_status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendanceDay {
    pub attendance_date: NaiveDate,
    pub attendance_status: AttendanceStatus,
}

/// ISO date -> status for one client and month. Days without a record are absent.
pub type ClientAttendanceMap = BTreeMap<String, AttendanceStatus>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CreatedId {
    pub id: i64,
}
