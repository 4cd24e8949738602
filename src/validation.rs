//! Request schemas and the rules applied to them before any handler logic
//! runs. Failures become `400 {source} validation failed` with per-field messages.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::fs::TempFile;
use rocket::request::FromParam;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::auth::Role;
use crate::config::MAX_DOCUMENT_BYTES;
use crate::error::AppError;
use crate::models::{AttendanceStatus, Side, Status};

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").unwrap());

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\+0?1\s?)?(\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}|\d{10})$").unwrap()
});

static MONTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

pub const ALLOWED_DOCUMENT_TYPES: [(&str, &str); 3] = [
    ("application/pdf", "pdf"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
];

fn error_with_message(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < 8 {
        return Err(error_with_message(
            "password_length",
            "Password must be at least 8 characters long",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(error_with_message(
            "password_digit",
            "Password must contain at least one number",
        ));
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        return Err(error_with_message(
            "password_special",
            "Password must contain at least one special character",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(error_with_message(
            "password_upper",
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(error_with_message(
            "password_lower",
            "Password must contain at least one lowercase letter",
        ));
    }
    Ok(())
}

fn validate_client_side(side: &Side) -> Result<(), ValidationError> {
    match side {
        Side::Both => Err(error_with_message(
            "client_side",
            "Clients must be assigned to side One or Two",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Credentials {
    #[validate(
        length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"),
        regex(path = *USERNAME_RE, message = "Only letters, numbers, and underscores allowed")
    )]
    pub username: String,
    #[validate(custom(function = validate_password))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompleteChallenge {
    #[validate(
        length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"),
        regex(path = *USERNAME_RE, message = "Only letters, numbers, and underscores allowed")
    )]
    pub username: String,
    #[serde(rename = "newPassword")]
    #[validate(custom(function = validate_password))]
    pub new_password: String,
    #[validate(length(min = 1, message = "Session is required"))]
    pub session: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserData {
    #[validate(length(min = 1, max = 50, message = "First name must be 1 to 50 characters"))]
    pub fname: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1 to 50 characters"))]
    pub lname: String,
    #[validate(
        length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"),
        regex(path = *USERNAME_RE, message = "Only letters, numbers, and underscores allowed")
    )]
    pub username: String,
    pub side: Side,
    pub role: Role,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UserRef {
    #[validate(range(min = 1, message = "Id must be a positive integer"))]
    pub id: i64,
    #[validate(
        length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"),
        regex(path = *USERNAME_RE, message = "Only letters, numbers, and underscores allowed")
    )]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientData {
    #[validate(length(min = 1, max = 50, message = "First name must be 1 to 50 characters"))]
    pub fname: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1 to 50 characters"))]
    pub lname: String,
    #[validate(custom(function = validate_client_side))]
    pub side: Side,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateClient {
    #[serde(rename = "clientData")]
    #[validate(nested)]
    pub client_data: ClientData,
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RosterEnrollment {
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "endDate", default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RosterEnd {
    #[serde(rename = "endDate")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AttendanceUpsert {
    #[validate(range(min = 1, message = "Client id must be a positive integer"))]
    pub cid: i64,
    pub attendance_date: NaiveDate,
    pub attendance_status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Contact {
    #[validate(length(min = 1, max = 50, message = "First name must be 1 to 50 characters"))]
    pub fname: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1 to 50 characters"))]
    pub lname: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number format"))]
    pub phone: String,
    #[validate(length(min = 10, max = 1000, message = "Message must be 10 to 1000 characters"))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Application {
    #[validate(length(min = 1, max = 50, message = "First name must be 1 to 50 characters"))]
    pub fname: String,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1 to 50 characters"))]
    pub lname: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(regex(path = *PHONE_RE, message = "Invalid phone number format"))]
    pub phone: String,
    pub message: String,
}

/// An uploaded application document after validation.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Returns the canonical MIME type and file extension for an accepted document type.
pub fn document_kind(content_type: &str) -> Option<(&'static str, &'static str)> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    ALLOWED_DOCUMENT_TYPES
        .iter()
        .find(|(mime, _)| *mime == normalized)
        .copied()
}

/// Reads and checks uploaded application documents: at least one, at most
/// `max_files`, each non-empty, within the size limit and of an accepted type.
pub async fn read_documents(
    files: &[TempFile<'_>],
    max_files: usize,
) -> Result<Vec<Document>, AppError> {
    let mut errors = FieldErrors::default();

    if files.is_empty() {
        errors.add("files", "At least one file is required");
    }
    if files.len() > max_files {
        errors.add("files", &format!("No more than {} files may be uploaded", max_files));
    }
    if !errors.is_empty() {
        return Err(errors.into_error("files"));
    }

    let mut documents = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let field = format!("files[{}]", index);
        let file_name = file
            .raw_name()
            .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str().to_string())
            .unwrap_or_else(|| "document".to_string());

        let kind = file
            .content_type()
            .and_then(|ct| document_kind(&format!("{}/{}", ct.top(), ct.sub())));

        if file.len() == 0 {
            errors.add(&field, "File is empty");
        } else if file.len() > MAX_DOCUMENT_BYTES {
            errors.add(&field, "File must be 5MB or smaller");
        }

        let Some((content_type, _)) = kind else {
            errors.add(&field, "Only PDF, DOC, and DOCX files are allowed");
            continue;
        };

        if !errors.is_empty() {
            continue;
        }

        let mut bytes = Vec::new();
        let mut reader = file
            .open()
            .await
            .map_err(|e| AppError::Internal(format!("open upload: {}", e)))?;
        reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| AppError::Internal(format!("read upload: {}", e)))?;

        documents.push(Document {
            file_name,
            content_type,
            bytes,
        });
    }

    if errors.is_empty() {
        Ok(documents)
    } else {
        Err(errors.into_error("files"))
    }
}

/// Positive integer path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialId(pub i64);

impl<'a> FromParam<'a> for SerialId {
    type Error = AppError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        match param.parse::<i64>() {
            Ok(id) if id > 0 => Ok(SerialId(id)),
            _ => Err(AppError::validation(
                "params",
                json!({ "id": ["Id must be a positive integer"] }),
            )),
        }
    }
}

/// `YYYY-MM-DD` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParam(pub NaiveDate);

impl<'a> FromParam<'a> for DateParam {
    type Error = AppError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        parse_date(param).map(DateParam).ok_or_else(|| {
            AppError::validation(
                "params",
                json!({ "startDate": ["Date must be formatted YYYY-MM-DD"] }),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceQuery {
    pub date: NaiveDate,
    pub side: Side,
}

/// A calendar month, held as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month(NaiveDate);

impl Month {
    pub fn parse(value: &str) -> Option<Month> {
        if !MONTH_RE.is_match(value) {
            return None;
        }
        NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d")
            .ok()
            .map(Month)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// First day of the following month (exclusive upper bound).
    pub fn next_first_day(&self) -> NaiveDate {
        let (year, month) = if self.0.month() == 12 {
            (self.0.year() + 1, 1)
        } else {
            (self.0.year(), self.0.month() + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAttendanceQuery {
    pub cid: i64,
    pub month: Month,
}

/// Accumulates `{field: [messages]}` for hand-parsed sources (query strings, forms).
#[derive(Default)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_error(self, source: &str) -> AppError {
        AppError::validation(source, json!(self.0))
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

impl AttendanceQuery {
    pub fn parse(date: Option<&str>, side: Option<&str>) -> Result<Self, AppError> {
        let mut errors = FieldErrors::default();

        let date = match date.map(parse_date) {
            Some(Some(date)) => Some(date),
            Some(None) => {
                errors.add("date", "Date must be formatted YYYY-MM-DD");
                None
            }
            None => {
                errors.add("date", "Date is required");
                None
            }
        };

        let side = match side.map(Side::parse) {
            Some(Some(side)) => Some(side),
            _ => {
                errors.add("side", "Side is required");
                None
            }
        };

        match (date, side) {
            (Some(date), Some(side)) if errors.is_empty() => Ok(Self { date, side }),
            _ => Err(errors.into_error("query")),
        }
    }
}

impl ClientAttendanceQuery {
    pub fn parse(month: Option<&str>, cid: Option<&str>) -> Result<Self, AppError> {
        let mut errors = FieldErrors::default();

        let month = match month.map(Month::parse) {
            Some(Some(month)) => Some(month),
            _ => {
                errors.add("month", "Month must be formatted YYYY-MM");
                None
            }
        };

        let cid = match cid.map(|raw| raw.parse::<i64>()) {
            Some(Ok(cid)) if cid > 0 => Some(cid),
            _ => {
                errors.add("cid", "Client id must be a positive integer");
                None
            }
        };

        match (month, cid) {
            (Some(month), Some(cid)) => Ok(Self { cid, month }),
            _ => Err(errors.into_error("query")),
        }
    }
}

fn collect_errors(prefix: &str, errors: &ValidationErrors, out: &mut BTreeMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let messages = out.entry(path).or_default();
                for error in field_errors {
                    messages.push(
                        error
                            .message
                            .clone()
                            .unwrap_or_else(|| "Invalid value".into())
                            .to_string(),
                    );
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_errors(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

pub fn validation_errors_to_json(errors: &ValidationErrors) -> Value {
    let mut out = BTreeMap::new();
    collect_errors("", errors, &mut out);
    json!(out)
}

fn json_error_detail(error: &json::Error<'_>) -> Value {
    let detail = match error {
        json::Error::Io(err) => err.to_string(),
        json::Error::Parse(_, err) => err.to_string(),
    };
    json!({ "body": [detail] })
}

/// Unwraps a JSON data guard result and runs the body's validation rules.
pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> Result<T, AppError>;
}

impl<T: Validate> JsonValidateExt<T> for Result<Json<T>, json::Error<'_>> {
    fn validate_custom(self) -> Result<T, AppError> {
        let body = self
            .map_err(|err| AppError::validation("body", json_error_detail(&err)))?
            .into_inner();

        body.validate()
            .map_err(|errors| AppError::validation("body", validation_errors_to_json(&errors)))?;

        Ok(body)
    }
}

/// Like [`JsonValidateExt`] for array bodies, validating each element.
pub trait JsonValidateListExt<T> {
    fn validate_each(self) -> Result<Vec<T>, AppError>;
}

impl<T: Validate> JsonValidateListExt<T> for Result<Json<Vec<T>>, json::Error<'_>> {
    fn validate_each(self) -> Result<Vec<T>, AppError> {
        let items = self
            .map_err(|err| AppError::validation("body", json_error_detail(&err)))?
            .into_inner();

        let mut out = BTreeMap::new();
        for (index, item) in items.iter().enumerate() {
            if let Err(errors) = item.validate() {
                collect_errors(&format!("[{}]", index), &errors, &mut out);
            }
        }

        if out.is_empty() {
            Ok(items)
        } else {
            Err(AppError::validation("body", json!(out)))
        }
    }
}

/// Converts Rocket form parse failures (multipart) into a validation error.
pub fn form_errors_to_error(errors: &rocket::form::Errors<'_>) -> AppError {
    let mut field_errors = FieldErrors::default();
    for error in errors.iter() {
        let field = error
            .name
            .as_ref()
            .map(|name| name.to_string())
            .unwrap_or_else(|| "form".to_string());
        field_errors.add(&field, &error.kind.to_string());
    }
    field_errors.into_error("body")
}
