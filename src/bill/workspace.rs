//! Per-request scratch directory.

use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};

use super::GeneratorError;

const RENDERED_DOCX: &str = "rent_bill.docx";
const CONVERTED_PDF: &str = "rent_bill.pdf";

/// Temporary directory owned by one pipeline run. Everything inside it is
/// removed when the workspace is dropped, on success and error paths alike.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `root`, or the system temp dir if `None`.
    pub fn acquire(root: Option<&Path>) -> Result<Self, GeneratorError> {
        let mut builder = Builder::new();
        builder.prefix("rent-bill-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(GeneratorError::Workspace)?;

        log::debug!("Acquired workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn docx_path(&self) -> PathBuf {
        self.dir.path().join(RENDERED_DOCX)
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.dir.path().join(CONVERTED_PDF)
    }

    /// Remove the workspace now, reporting cleanup failures instead of
    /// swallowing them in `Drop`.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            log::warn!("Failed to remove workspace {}: {}", path.display(), e);
        }
    }
}
