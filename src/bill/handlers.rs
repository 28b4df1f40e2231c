//! HTTP handlers for bill generation.

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::header;
use actix_web::{web, HttpResponse, Responder};

use super::models::BillRequest;
use super::pipeline::BillPipeline;
use super::validation::RequestLimits;
use super::{ErrorKind, GeneratorError};
use crate::ErrorResponse;

/// Shared state for the bill endpoint.
pub struct BillState {
    pub pipeline: BillPipeline,
}

impl BillState {
    pub fn new(pipeline: BillPipeline) -> Self {
        Self { pipeline }
    }
}

#[utoipa::path(
    post,
    path = "/generate-bill",
    tag = "Rent Bill",
    request_body = BillRequest,
    responses(
        (status = 200, description = "Rendered rent bill", body = Vec<u8>, content_type = "application/pdf"),
        (status = 404, description = "Template or converted output missing", body = ErrorResponse),
        (status = 422, description = "Malformed request body", body = ErrorResponse),
        (status = 500, description = "Conversion or other failure", body = ErrorResponse)
    )
)]
pub async fn generate_bill(
    state: web::Data<BillState>,
    body: web::Json<BillRequest>,
) -> impl Responder {
    let request = body.into_inner();
    log::info!(
        "Received bill request: month={}, sr_no={}, image={}",
        request.month,
        request.sr_no,
        request.image_base64.is_some()
    );

    match state.pipeline.generate(&request).await {
        Ok(document) => HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", document.filename),
            ))
            .body(document.pdf),
        Err(e) => error_response(&e),
    }
}

/// Map a pipeline error to its HTTP response.
pub fn error_response(err: &GeneratorError) -> HttpResponse {
    match err.kind() {
        ErrorKind::NotFound => {
            log::warn!("Bill generation failed: {}", err);
            HttpResponse::NotFound().json(ErrorResponse::new(err.to_string()))
        }
        ErrorKind::Conversion => {
            log::error!("Bill conversion failed: {}", err);
            HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string()))
        }
        ErrorKind::Validation | ErrorKind::Unclassified => {
            log::error!("Bill generation failed: {}", err);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::new(format!("An error occurred: {}", err)))
        }
    }
}

/// JSON extractor settings sized for the largest accepted image.
pub fn json_config(limits: &RequestLimits) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limits.max_body_bytes())
        .error_handler(|err, _req| {
            let detail = err.to_string();
            let response = match err {
                JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                    HttpResponse::PayloadTooLarge().json(ErrorResponse::new(detail))
                }
                JsonPayloadError::ContentType => {
                    HttpResponse::UnsupportedMediaType().json(ErrorResponse::new(detail))
                }
                _ => HttpResponse::UnprocessableEntity().json(ErrorResponse::new(detail)),
            };
            InternalError::from_response(err, response).into()
        })
}

/// Register the bill routes.
pub fn config(limits: RequestLimits) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.service(
            web::resource("/generate-bill")
                .app_data(json_config(&limits))
                .route(web::post().to(generate_bill)),
        );
    }
}
