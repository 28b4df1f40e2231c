//! Rent bill generation - business logic for filling the DOCX template and
//! converting it to PDF.
//!
//! - `template` / `image` - placeholder substitution and inline images
//! - `converter` - native and headless-office PDF conversion strategies
//! - `pipeline` - per-request orchestration with a scoped workspace
//! - `handlers` - the `POST /generate-bill` endpoint

pub mod converter;
pub mod handlers;
pub mod image;
pub mod models;
pub mod pipeline;
pub mod template;
pub mod validation;
pub mod workspace;

pub use converter::{Converter, HeadlessOfficeConverter, NativeConverter};
pub use models::{BillRequest, RenderContext};
pub use pipeline::BillPipeline;
pub use template::TemplateRenderer;

use std::path::PathBuf;
use thiserror::Error;

/// Filename suggested to clients for the generated PDF.
pub const OUTPUT_FILENAME: &str = "rent_bill.pdf";

/// Coarse error classes the HTTP boundary maps to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conversion,
    Unclassified,
}

/// Errors that can occur during bill generation.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Template file '{0}' not found")]
    TemplateNotFound(String),
    #[error("failed to read template: {0}")]
    TemplateIo(#[source] std::io::Error),
    #[error("invalid document package: {0}")]
    Package(#[from] zip::result::ZipError),
    #[error("failed to create temporary workspace: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("failed to write rendered document: {0}")]
    WriteDocument(#[source] std::io::Error),
    #[error("Failed to process image: {0}")]
    InvalidImage(String),
    #[error("{0}")]
    Validation(String),
    #[error("Failed to convert DOCX to PDF: could not run {program}: {source}")]
    ConverterSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to convert DOCX to PDF: {program} exited with status {code}: {stderr}")]
    ConverterExit {
        program: String,
        code: i32,
        stderr: String,
    },
    #[error("Failed to convert DOCX to PDF: {program} timed out after {seconds}s")]
    ConverterTimeout { program: String, seconds: u64 },
    #[error("Failed to convert DOCX to PDF: virtual display {display} did not start: {reason}")]
    DisplayStart { display: String, reason: String },
    #[error("Failed to convert DOCX to PDF: converter reported success but produced nothing at {0}")]
    NoOutput(PathBuf),
    #[error("Failed to convert DOCX to PDF: converter produced an empty file at {0}")]
    EmptyOutput(PathBuf),
    #[error("PDF file was not generated: {path}")]
    OutputMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rendering task failed: {0}")]
    Task(String),
}

impl GeneratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TemplateNotFound(_) | Self::OutputMissing { .. } => ErrorKind::NotFound,
            Self::InvalidImage(_) | Self::Validation(_) => ErrorKind::Validation,
            Self::ConverterSpawn { .. }
            | Self::ConverterExit { .. }
            | Self::ConverterTimeout { .. }
            | Self::DisplayStart { .. }
            | Self::NoOutput(_)
            | Self::EmptyOutput(_) => ErrorKind::Conversion,
            Self::TemplateIo(_)
            | Self::Package(_)
            | Self::Workspace(_)
            | Self::WriteDocument(_)
            | Self::Task(_) => ErrorKind::Unclassified,
        }
    }
}

/// Result of a successful bill generation.
#[derive(Debug)]
pub struct GeneratedDocument {
    pub filename: String,
    pub pdf: Vec<u8>,
}
