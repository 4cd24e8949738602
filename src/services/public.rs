use chrono::Utc;
use futures::future::try_join_all;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::integrations::{DocumentStore, Mailer, Notification};
use crate::validation::{Application, Contact, Document, document_kind};

pub const APPLICATION_SUBJECT: &str = "New Application Submitted";

#[instrument(skip_all)]
pub async fn submit_contact(pool: &SqlitePool, contact: &Contact) -> Result<(), AppError> {
    let id = db::insert_contact(pool, contact).await?;
    info!(contact_id = id, "Contact submission stored");
    Ok(())
}

/// Replaces anything outside `[A-Za-z0-9_-]` in the file stem and appends the
/// canonical extension for the document type. `index` is the document's
/// position in its submission, so keys never collide within one upload.
pub fn document_key(timestamp_ms: i64, index: usize, document: &Document) -> String {
    let stem = document
        .file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&document.file_name);

    let mut sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        sanitized.push_str("document");
    }

    let extension = document_kind(document.content_type)
        .map(|(_, ext)| ext)
        .unwrap_or("bin");

    format!(
        "applications/{}_{}_{}.{}",
        timestamp_ms, index, sanitized, extension
    )
}

fn application_body(application: &Application, documents: &[Document]) -> String {
    let files = documents
        .iter()
        .map(|doc| format!("- {}", doc.file_name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Application submitted by {} {} ({}, {}).\n\n{}\n\nUploaded files:\n{}",
        application.fname,
        application.lname,
        application.email,
        application.phone,
        application.message,
        files
    )
}

/// Uploads the documents, notifies staff, then records the submission.
#[instrument(skip_all, fields(files = documents.len()))]
pub async fn submit_application(
    pool: &SqlitePool,
    documents_store: &dyn DocumentStore,
    mailer: &dyn Mailer,
    application: &Application,
    documents: Vec<Document>,
) -> Result<(), AppError> {
    let timestamp = Utc::now().timestamp_millis();
    let body = application_body(application, &documents);

    try_join_all(documents.into_iter().enumerate().map(|(index, document)| async move {
        let key = document_key(timestamp, index, &document);
        documents_store
            .put(&key, document.bytes, document.content_type)
            .await
    }))
    .await?;

    mailer
        .send(Notification {
            subject: APPLICATION_SUBJECT.to_string(),
            body,
        })
        .await?;

    let id = db::insert_application(pool, application).await?;
    info!(application_id = id, "Application submission stored");
    Ok(())
}
