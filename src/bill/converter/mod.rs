//! DOCX to PDF conversion strategies.
//!
//! Both strategies shell out to LibreOffice; they differ only in how the
//! office suite is driven:
//! - `NativeConverter` - `soffice --headless --convert-to pdf`
//! - `HeadlessOfficeConverter` - `unoconv` under a private `Xvfb` display

mod headless;
mod native;
mod process;

pub use headless::{
    HeadlessOfficeConverter, VirtualDisplay, DEFAULT_DISPLAY_BASE, DEFAULT_DISPLAY_SPAN,
};
pub use native::NativeConverter;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::GeneratorError;
use crate::config::{Config, ConverterKind};

/// Produces a PDF at `target` from the document at `source`.
///
/// On `Ok(())` the target file exists and is non-empty.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn convert(&self, source: &Path, target: &Path) -> Result<(), GeneratorError>;
}

/// Build the strategy selected in `config`.
pub fn from_config(config: &Config) -> Arc<dyn Converter> {
    let timeout = Duration::from_secs(config.conversion_timeout_secs);
    match config.converter {
        ConverterKind::Native => Arc::new(NativeConverter::new(&config.soffice_bin, timeout)),
        ConverterKind::HeadlessOffice => Arc::new(
            HeadlessOfficeConverter::new(&config.xvfb_bin, &config.unoconv_bin, timeout)
                .with_displays(config.xvfb_display_base, config.xvfb_display_span)
                .with_startup_delay(Duration::from_millis(config.xvfb_startup_ms)),
        ),
    }
}

/// Check the converter postcondition: `target` exists and has content.
pub async fn ensure_output(target: &Path) -> Result<(), GeneratorError> {
    match tokio::fs::metadata(target).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(GeneratorError::EmptyOutput(target.to_path_buf())),
        Err(_) => Err(GeneratorError::NoOutput(target.to_path_buf())),
    }
}
