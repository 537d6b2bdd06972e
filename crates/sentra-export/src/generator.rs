//! The export generator service.

use crate::collect::CollectorRegistry;
use crate::csv::build_csv_archive;
use crate::job::{ExportFormat, ExportJob, ExportJobStatus};
use crate::pdf::{render_export_html, PdfRenderer};
use crate::storage::{BlobStorage, StorageError};
use chrono::{DateTime, Duration, Utc};
use sentra_audit::{AuditTrail, LogRequest};
use sentra_catalog::TypeCatalog;
use sentra_store::SharedConnection;
use sentra_types::{
    ComplianceAction, ComplianceActor, DataCategory, ExportJobId, LegalBasis, RequestContext,
    UserId,
};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Export generation and download errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("category not exportable under this catalog: {0}")]
    UnknownCategory(DataCategory),
    #[error("export not found")]
    NotFound,
    #[error("export not ready: status is {0}")]
    NotReady(ExportJobStatus),
    #[error("export download window has passed")]
    Expired,
    #[error("export file missing from storage")]
    FileMissing,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How a freshly requested job gets processed.
pub enum ProcessingMode {
    /// The requesting call collects and serializes inline.
    Inline,
    /// Jobs are queued for the single background worker.
    Queued(tokio::sync::mpsc::Sender<ExportJobId>),
}

/// Generator configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Download window after completion, in days.
    pub download_expiry_days: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            download_expiry_days: 7,
        }
    }
}

/// A completed artifact ready to stream to the subject.
#[derive(Debug, Clone)]
pub struct ExportDownload {
    /// Artifact bytes.
    pub bytes: Vec<u8>,
    /// MIME type matching the stored artifact.
    pub content_type: &'static str,
    /// Suggested download filename.
    pub filename: String,
    /// Artifact length in bytes.
    pub length: u64,
}

/// Orchestrates data export jobs: single-flight creation, category
/// collection, serialization, download streaming, and expiry cleanup.
pub struct ExportGenerator {
    conn: SharedConnection,
    catalog: Arc<TypeCatalog>,
    trail: Arc<AuditTrail>,
    collectors: CollectorRegistry,
    storage: Arc<dyn BlobStorage>,
    renderer: Arc<dyn PdfRenderer>,
    mode: ProcessingMode,
    config: ExportConfig,
}

impl ExportGenerator {
    /// Create a generator.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conn: SharedConnection,
        catalog: Arc<TypeCatalog>,
        trail: Arc<AuditTrail>,
        collectors: CollectorRegistry,
        storage: Arc<dyn BlobStorage>,
        renderer: Arc<dyn PdfRenderer>,
        mode: ProcessingMode,
        config: ExportConfig,
    ) -> Self {
        Self {
            conn,
            catalog,
            trail,
            collectors,
            storage,
            renderer,
            mode,
            config,
        }
    }

    /// Request an export, returning its download token.
    ///
    /// Categories are validated against the catalog; an empty list means
    /// every catalog category. When the user already has a pending or
    /// processing job its existing token is returned instead of creating a
    /// second one. The partial unique index on in-flight jobs closes the
    /// race between that check and the insert: a concurrent loser's insert
    /// fails and resolves to the winner's token.
    pub fn request_export(
        &self,
        user: UserId,
        format: ExportFormat,
        categories: Vec<DataCategory>,
        ctx: &RequestContext,
    ) -> Result<String, ExportError> {
        let categories = if categories.is_empty() {
            self.catalog.export_categories().to_vec()
        } else {
            for category in &categories {
                if !self.catalog.has_export_category(*category) {
                    return Err(ExportError::UnknownCategory(*category));
                }
            }
            categories
        };

        if let Some(token) = self.in_flight_token(user)? {
            debug!(%user, "export already in flight, returning existing token");
            return Ok(token);
        }

        let job = ExportJob {
            id: ExportJobId::new(),
            user_id: user,
            token: Uuid::new_v4().simple().to_string(),
            format,
            categories,
            status: ExportJobStatus::Pending,
            progress: 0,
            file_path: None,
            file_size: None,
            download_count: 0,
            last_downloaded_at: None,
            expires_at: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        let inserted = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO export_jobs
                 (id, user_id, token, format, categories, status, progress, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    job.id.as_uuid().to_string(),
                    job.user_id.as_uuid().to_string(),
                    job.token,
                    job.format.to_string(),
                    serde_json::to_string(&job.categories)?,
                    job.status.to_string(),
                    job.progress,
                    job.created_at.to_rfc3339(),
                ],
            )
        };

        if let Err(e) = inserted {
            if is_constraint_violation(&e) {
                // Lost the race; the winner's job holds the slot.
                if let Some(token) = self.in_flight_token(user)? {
                    return Ok(token);
                }
            }
            return Err(e.into());
        }

        self.trail.log(
            LogRequest::new(ComplianceAction::ExportRequested, LegalBasis::LegalObligation)
                .user(user)
                .actor(ComplianceActor::user(user))
                .details(json!({
                    "job_id": job.id.as_uuid().to_string(),
                    "format": job.format.to_string(),
                    "categories": job.categories.iter().map(ToString::to_string).collect::<Vec<_>>(),
                }))
                .context(ctx.clone()),
        );
        info!(id = %job.id, format = %job.format, "export job created");

        match &self.mode {
            ProcessingMode::Inline => {
                self.process_job(job.id)?;
            }
            ProcessingMode::Queued(queue) => {
                if let Err(e) = queue.try_send(job.id) {
                    // The job stays pending; the worker picks it up once
                    // the queue drains or the host re-enqueues on restart.
                    warn!(id = %job.id, "export queue rejected job: {}", e);
                }
            }
        }

        Ok(job.token)
    }

    /// Process a pending job to completion or failure.
    ///
    /// Collection, serialization, and storage trouble is captured into the
    /// job (status failed, message preserved); only database errors on the
    /// job row itself propagate. Returns false when the job was not in a
    /// processable state or ended failed.
    pub fn process_job(&self, id: ExportJobId) -> Result<bool, ExportError> {
        let job = self.job(id)?;
        let claimed = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE export_jobs SET status = 'processing', progress = 5
                 WHERE id = ?1 AND status = 'pending'",
                [id.as_uuid().to_string()],
            )?
        };
        if claimed == 0 {
            debug!(%id, status = %job.status, "job not pending, skipping");
            return Ok(false);
        }

        let total = job.categories.len();
        let mut collected: Vec<(DataCategory, Value)> = Vec::with_capacity(total);
        for (i, category) in job.categories.iter().enumerate() {
            match self.collectors.collect(*category, job.user_id) {
                Ok(value) => collected.push((*category, value)),
                Err(e) => {
                    self.fail_job(&job, &format!("collecting {}: {}", category, e))?;
                    return Ok(false);
                }
            }
            let progress = 5 + ((i + 1) * 75 / total) as u8;
            self.set_progress(id, progress)?;
        }

        let (bytes, extension) = match self.serialize(&job, &collected) {
            Ok(artifact) => artifact,
            Err(message) => {
                self.fail_job(&job, &message)?;
                return Ok(false);
            }
        };

        let path = format!(
            "exports/{}/{}.{}",
            job.user_id.as_uuid(),
            job.id.as_uuid(),
            extension
        );
        if let Err(e) = self.storage.put(&path, &bytes) {
            self.fail_job(&job, &format!("storing artifact: {}", e))?;
            return Ok(false);
        }

        let completed_at = Utc::now();
        let expires_at = completed_at + Duration::days(i64::from(self.config.download_expiry_days));
        {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE export_jobs
                 SET status = 'completed', progress = 100, file_path = ?1,
                     file_size = ?2, expires_at = ?3, completed_at = ?4
                 WHERE id = ?5",
                rusqlite::params![
                    path,
                    bytes.len() as u64,
                    expires_at.to_rfc3339(),
                    completed_at.to_rfc3339(),
                    id.as_uuid().to_string(),
                ],
            )?;
        }

        self.trail.log(
            LogRequest::new(ComplianceAction::ExportCompleted, LegalBasis::LegalObligation)
                .user(job.user_id)
                .actor(ComplianceActor::system("export_worker"))
                .details(json!({
                    "job_id": id.as_uuid().to_string(),
                    "file_size": bytes.len(),
                    "format": job.format.to_string(),
                })),
        );
        info!(%id, size = bytes.len(), "export completed");
        Ok(true)
    }

    /// Serialize collected categories per the requested format.
    ///
    /// PDF rendering failure is not a job failure: the HTML document the
    /// renderer was given becomes the artifact instead.
    fn serialize(
        &self,
        job: &ExportJob,
        collected: &[(DataCategory, Value)],
    ) -> Result<(Vec<u8>, &'static str), String> {
        match job.format {
            ExportFormat::Json => {
                let mut data = serde_json::Map::new();
                for (category, value) in collected {
                    data.insert(category.to_string(), value.clone());
                }
                let doc = json!({
                    "export": {
                        "user_id": job.user_id.as_uuid().to_string(),
                        "generated_at": Utc::now().to_rfc3339(),
                        "categories": job.categories.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    },
                    "data": Value::Object(data),
                });
                serde_json::to_vec_pretty(&doc)
                    .map(|bytes| (bytes, "json"))
                    .map_err(|e| format!("serializing JSON: {}", e))
            }
            ExportFormat::Csv => build_csv_archive(collected)
                .map(|bytes| (bytes, "zip"))
                .map_err(|e| format!("building CSV archive: {}", e)),
            ExportFormat::Pdf => {
                let html = render_export_html("Personal Data Export", collected);
                match self.renderer.render(&html) {
                    Ok(bytes) => Ok((bytes, "pdf")),
                    Err(e) => {
                        warn!(id = %job.id, "PDF render failed, storing HTML: {}", e);
                        Ok((html.into_bytes(), "html"))
                    }
                }
            }
        }
    }

    /// Stream a completed artifact for download.
    ///
    /// Increments the download count and records the download instant.
    pub fn stream_export(&self, user: UserId, token: &str) -> Result<ExportDownload, ExportError> {
        let job = self.job_by_token(token)?;
        if job.user_id != user {
            return Err(ExportError::NotFound);
        }
        match job.status {
            ExportJobStatus::Completed => {}
            ExportJobStatus::Expired => return Err(ExportError::Expired),
            status => return Err(ExportError::NotReady(status)),
        }
        if job.is_past_expiry(Utc::now()) {
            return Err(ExportError::Expired);
        }

        let path = job.file_path.as_deref().ok_or(ExportError::FileMissing)?;
        let bytes = match self.storage.get(path) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => return Err(ExportError::FileMissing),
            Err(e) => return Err(e.into()),
        };

        {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE export_jobs
                 SET download_count = download_count + 1, last_downloaded_at = ?1
                 WHERE id = ?2",
                rusqlite::params![Utc::now().to_rfc3339(), job.id.as_uuid().to_string()],
            )?;
        }

        self.trail.log(
            LogRequest::new(ComplianceAction::ExportDownloaded, LegalBasis::LegalObligation)
                .user(user)
                .actor(ComplianceActor::user(user))
                .details(json!({ "job_id": job.id.as_uuid().to_string() })),
        );

        let filename = path.rsplit('/').next().unwrap_or(path).to_string();
        let length = bytes.len() as u64;
        Ok(ExportDownload {
            bytes,
            content_type: content_type_for(path),
            filename,
            length,
        })
    }

    /// Delete artifacts and mark jobs expired for completed jobs past
    /// their download window. Safe to re-run; already-expired jobs never
    /// match again.
    pub fn clean_expired(&self) -> Result<u64, ExportError> {
        let now = Utc::now().to_rfc3339();
        let expired: Vec<(String, Option<String>, Option<String>)> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, user_id, file_path FROM export_jobs
                 WHERE status = 'completed' AND expires_at IS NOT NULL AND expires_at < ?1",
            )?;
            let rows = stmt.query_map([&now], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut count = 0u64;
        for (id, user_s, path) in expired {
            if let Some(path) = &path {
                if let Err(e) = self.storage.delete(path) {
                    warn!(job = %id, "failed to delete expired artifact: {}", e);
                }
            }
            let updated = {
                let conn = self.conn.lock();
                conn.execute(
                    "UPDATE export_jobs SET status = 'expired' WHERE id = ?1 AND status = 'completed'",
                    [&id],
                )?
            };
            if updated == 0 {
                continue;
            }
            count += 1;

            let mut request =
                LogRequest::new(ComplianceAction::ExportExpired, LegalBasis::LegalObligation)
                    .actor(ComplianceActor::system("export_sweep"))
                    .details(json!({ "job_id": id }));
            if let Some(user) = user_s.as_deref().and_then(UserId::parse) {
                request = request.user(user);
            }
            self.trail.log(request);
        }

        Ok(count)
    }

    /// Load a job by id.
    pub fn job(&self, id: ExportJobId) -> Result<ExportJob, ExportError> {
        self.query_job("id = ?1", &id.as_uuid().to_string())
    }

    /// Load a job by its download token.
    pub fn job_by_token(&self, token: &str) -> Result<ExportJob, ExportError> {
        self.query_job("token = ?1", token)
    }

    fn query_job(&self, predicate: &str, param: &str) -> Result<ExportJob, ExportError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, user_id, token, format, categories, status, progress,
                    file_path, file_size, download_count, last_downloaded_at,
                    expires_at, error, created_at, completed_at
             FROM export_jobs WHERE {}",
            predicate
        ))?;
        let mut rows = stmt.query_map([param], row_to_job)?;
        match rows.next() {
            Some(job) => Ok(job?),
            None => Err(ExportError::NotFound),
        }
    }

    fn in_flight_token(&self, user: UserId) -> Result<Option<String>, ExportError> {
        let conn = self.conn.lock();
        let token = conn
            .query_row(
                "SELECT token FROM export_jobs
                 WHERE user_id = ?1 AND status IN ('pending', 'processing')",
                [user.as_uuid().to_string()],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(token)
    }

    fn set_progress(&self, id: ExportJobId, progress: u8) -> Result<(), ExportError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE export_jobs SET progress = MAX(progress, ?1) WHERE id = ?2",
            rusqlite::params![progress, id.as_uuid().to_string()],
        )?;
        Ok(())
    }

    fn fail_job(&self, job: &ExportJob, message: &str) -> Result<(), ExportError> {
        error!(id = %job.id, "export failed: {}", message);
        {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE export_jobs SET status = 'failed', error = ?1, completed_at = ?2
                 WHERE id = ?3",
                rusqlite::params![
                    message,
                    Utc::now().to_rfc3339(),
                    job.id.as_uuid().to_string(),
                ],
            )?;
        }
        self.trail.log(
            LogRequest::new(ComplianceAction::ExportFailed, LegalBasis::LegalObligation)
                .user(job.user_id)
                .actor(ComplianceActor::system("export_worker"))
                .details(json!({
                    "job_id": job.id.as_uuid().to_string(),
                    "error": message,
                })),
        );
        Ok(())
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("json") => "application/json",
        Some("zip") => "application/zip",
        Some("pdf") => "application/pdf",
        Some("html") => "text/html",
        _ => "application/octet-stream",
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExportJob> {
    let id_s: String = row.get(0)?;
    let user_s: String = row.get(1)?;
    let format_s: String = row.get(3)?;
    let categories_s: String = row.get(4)?;
    let status_s: String = row.get(5)?;
    let downloaded_s: Option<String> = row.get(10)?;
    let expires_s: Option<String> = row.get(11)?;
    let created_s: String = row.get(13)?;
    let completed_s: Option<String> = row.get(14)?;

    Ok(ExportJob {
        id: ExportJobId::parse(&id_s).unwrap_or_default(),
        user_id: UserId::parse(&user_s).unwrap_or_default(),
        token: row.get(2)?,
        format: format_s.parse().unwrap_or(ExportFormat::Json),
        categories: serde_json::from_str(&categories_s).unwrap_or_default(),
        status: status_s.parse().unwrap_or(ExportJobStatus::Failed),
        progress: row.get(6)?,
        file_path: row.get(7)?,
        file_size: row.get(8)?,
        download_count: row.get(9)?,
        last_downloaded_at: downloaded_s.and_then(|s| parse_rfc3339(&s)),
        expires_at: expires_s.and_then(|s| parse_rfc3339(&s)),
        error: row.get(12)?,
        created_at: parse_rfc3339(&created_s).unwrap_or_default(),
        completed_at: completed_s.and_then(|s| parse_rfc3339(&s)),
    })
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
