//! Portable data export generation for Sentra.
//!
//! An export runs as a single-flight job per user: collect the requested
//! data categories through registered collectors, serialize into the
//! requested format (JSON, CSV bundle, or PDF with HTML fallback), and
//! hand the artifact to blob storage for expiring download.

mod collect;
mod csv;
mod generator;
mod job;
mod pdf;
mod storage;
mod worker;

pub use collect::{CollectError, Collector, CollectorRegistry, StaticCollector};
pub use collect::{ActivityCollector, AuditTrailCollector, ConsentsCollector};
pub use csv::{flatten_category, sanitize_cell};
pub use generator::{
    ExportConfig, ExportDownload, ExportError, ExportGenerator, ProcessingMode,
};
pub use job::{ExportFormat, ExportJob, ExportJobStatus};
pub use pdf::{render_export_html, PdfRenderError, PdfRenderer, UnavailablePdfRenderer};
pub use storage::{BlobStorage, LocalBlobStorage, MemoryBlobStorage, StorageError};
pub use worker::spawn_worker;
