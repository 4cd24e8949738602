use rocket::State;
use rocket::form::{self, Form};
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::serde::json::{self, Json};
use sqlx::SqlitePool;
use validator::Validate;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::integrations::Integrations;
use crate::services::public;
use crate::validation::{
    Application, Contact, JsonValidateExt, form_errors_to_error, read_documents,
    validation_errors_to_json,
};

#[derive(FromForm)]
pub struct ApplicationForm<'r> {
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub phone: String,
    #[field(default = String::new())]
    pub message: String,
    #[field(default = Vec::new())]
    pub files: Vec<TempFile<'r>>,
}

#[post("/contact", data = "<contact>")]
pub async fn api_submit_contact(
    contact: Result<Json<Contact>, json::Error<'_>>,
    db: &State<SqlitePool>,
) -> Result<Status, AppError> {
    let contact = contact.validate_custom()?;
    public::submit_contact(db, &contact).await?;
    Ok(Status::Created)
}

#[post("/apply", data = "<form>")]
pub async fn api_submit_application(
    form: Result<Form<ApplicationForm<'_>>, form::Errors<'_>>,
    db: &State<SqlitePool>,
    integrations: &State<Integrations>,
    config: &State<AppConfig>,
) -> Result<Status, AppError> {
    let form = form.map_err(|errors| form_errors_to_error(&errors))?;

    let application = Application {
        fname: form.fname.clone(),
        lname: form.lname.clone(),
        email: form.email.clone(),
        phone: form.phone.clone(),
        message: form.message.clone(),
    };
    application
        .validate()
        .map_err(|errors| AppError::validation("body", validation_errors_to_json(&errors)))?;

    let documents = read_documents(&form.files, config.max_application_files).await?;

    public::submit_application(
        db,
        integrations.documents.as_ref(),
        integrations.mailer.as_ref(),
        &application,
        documents,
    )
    .await?;

    Ok(Status::Created)
}

#[get("/ping")]
pub fn api_ping() -> &'static str {
    "pong"
}
