use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod bill;
pub mod config;

use crate::bill::handlers::BillState;
use crate::bill::{converter, BillPipeline, TemplateRenderer};
use crate::config::Config;

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(crate::bill::handlers::generate_bill),
    components(schemas(bill::models::BillRequest, ErrorResponse)),
    tags((name = "Rent Bill", description = "Rent bill PDF generation."))
)]
pub struct ApiDoc;

/// Assemble the pipeline described by `config`.
pub fn build_pipeline(config: &Config) -> BillPipeline {
    let renderer = TemplateRenderer::new(&config.template_path);
    let pipeline = BillPipeline::new(renderer, converter::from_config(config))
        .with_limits(config.limits);
    match &config.workspace_dir {
        Some(dir) => pipeline.with_workspace_root(dir),
        None => pipeline,
    }
}

fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["POST", "OPTIONS"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    if !config.template_path.exists() {
        log::warn!(
            "Template {} does not exist; requests will fail until it is provided",
            config.template_path.display()
        );
    }

    let pipeline = build_pipeline(&config);
    log::info!(
        "Using {} converter with template {}",
        pipeline.converter_name(),
        config.template_path.display()
    );
    let state = web::Data::new(BillState::new(pipeline));
    let limits = config.limits;
    let origins = Arc::new(config.cors_allowed_origins.clone());

    let prometheus = PrometheusMetricsBuilder::new("rent_bill_service")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    log::info!(
        "Starting server at http://{}:{}",
        config.bind_address,
        config.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .wrap(cors(&origins))
            .app_data(state.clone())
            .configure(bill::handlers::config(limits))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}
