//! Request-to-PDF orchestration.
//!
//! CheckTemplate -> Validate -> AcquireWorkspace -> Render -> Convert ->
//! ReadResult, with the workspace released on every path.

use std::path::PathBuf;
use std::sync::Arc;

use super::converter::Converter;
use super::image::InlineImage;
use super::models::{BillRequest, RenderContext};
use super::template::TemplateRenderer;
use super::validation::RequestLimits;
use super::workspace::Workspace;
use super::{GeneratedDocument, GeneratorError, OUTPUT_FILENAME};

/// Generates rent bill PDFs. Cheap to share across workers; holds no
/// per-request state.
#[derive(Clone)]
pub struct BillPipeline {
    renderer: TemplateRenderer,
    converter: Arc<dyn Converter>,
    limits: RequestLimits,
    workspace_root: Option<PathBuf>,
}

impl BillPipeline {
    pub fn new(renderer: TemplateRenderer, converter: Arc<dyn Converter>) -> Self {
        Self {
            renderer,
            converter,
            limits: RequestLimits::default(),
            workspace_root: None,
        }
    }

    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Create workspaces under `root` instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub fn limits(&self) -> &RequestLimits {
        &self.limits
    }

    pub fn converter_name(&self) -> &'static str {
        self.converter.name()
    }

    /// Fill the template with `request` and convert it to PDF.
    ///
    /// Errors are returned unchanged from the stage that failed; nothing is
    /// retried.
    pub async fn generate(
        &self,
        request: &BillRequest,
    ) -> Result<GeneratedDocument, GeneratorError> {
        if !self.renderer.template_exists() {
            return Err(GeneratorError::TemplateNotFound(
                self.renderer.template_name(),
            ));
        }

        request
            .validate(&self.limits)
            .map_err(GeneratorError::Validation)?;

        let workspace = Workspace::acquire(self.workspace_root.as_deref())?;
        let pdf = self.run_in(&workspace, request).await?;
        workspace.release();

        log::info!(
            "Generated {} ({} bytes) for {} / {}",
            OUTPUT_FILENAME,
            pdf.len(),
            request.renter_name,
            request.month
        );
        Ok(GeneratedDocument {
            filename: OUTPUT_FILENAME.to_string(),
            pdf,
        })
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        request: &BillRequest,
    ) -> Result<Vec<u8>, GeneratorError> {
        let docx_path = workspace.docx_path();
        let pdf_path = workspace.pdf_path();

        let renderer = self.renderer.clone();
        let limits = self.limits;
        let dir = workspace.path().to_path_buf();
        let request_owned = request.clone();
        let output = docx_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut context = RenderContext::from(&request_owned);
            if let Some(payload) = request_owned.image_base64.as_deref() {
                context.set_image(InlineImage::from_base64(payload, &dir, &limits)?);
            }
            renderer.render(&context, &output)
        })
        .await
        .map_err(|e| GeneratorError::Task(e.to_string()))??;
        log::debug!("Rendered {}", docx_path.display());

        self.converter.convert(&docx_path, &pdf_path).await?;
        log::debug!(
            "Converted {} with {} converter",
            pdf_path.display(),
            self.converter.name()
        );

        tokio::fs::read(&pdf_path)
            .await
            .map_err(|source| GeneratorError::OutputMissing {
                path: pdf_path.clone(),
                source,
            })
    }
}
