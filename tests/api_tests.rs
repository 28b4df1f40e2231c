mod common;

use std::sync::Arc;

use actix_web::{http::header, http::StatusCode, test, web, App};
use rent_bill_service::bill::converter::Converter;
use rent_bill_service::bill::handlers::{self, BillState};
use rent_bill_service::bill::validation::RequestLimits;
use rent_bill_service::bill::BillRequest;
use rent_bill_service::ErrorResponse;

use common::{png_base64, FailingConverter, Fixture, MockConverter, SilentConverter, PDF_HEADER};

macro_rules! bill_app {
    ($fixture:expr, $converter:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(BillState::new(
                    $fixture.pipeline($converter),
                )))
                .configure(handlers::config(RequestLimits::default())),
        )
        .await
    };
}

fn post_bill(body: &impl serde::Serialize) -> test::TestRequest {
    test::TestRequest::post().uri("/generate-bill").set_json(body)
}

#[actix_web::test]
async fn test_generate_bill_returns_pdf() {
    let fixture = Fixture::new();
    let app = bill_app!(fixture, MockConverter::new());

    let resp = test::call_service(&app, post_bill(&BillRequest::sample()).to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    assert_eq!(
        resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=rent_bill.pdf"
    );
    let body = test::read_body(resp).await;
    assert!(body.starts_with(PDF_HEADER));
}

#[actix_web::test]
async fn test_generate_bill_with_image() {
    let fixture = Fixture::new();
    let app = bill_app!(fixture, MockConverter::new());
    let request = BillRequest {
        image_base64: Some(png_base64(16, 16)),
        ..BillRequest::sample()
    };

    let resp = test::call_service(&app, post_bill(&request).to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(fixture.workspace_entries(), 0);
}

#[actix_web::test]
async fn test_missing_template_is_404() {
    let fixture = Fixture::without_template();
    let app = bill_app!(fixture, MockConverter::new());

    let resp = test::call_service(&app, post_bill(&BillRequest::sample()).to_request()).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.detail, "Template file 'template.docx' not found");
}

#[actix_web::test]
async fn test_invalid_image_is_500_with_message() {
    let fixture = Fixture::new();
    let app = bill_app!(fixture, MockConverter::new());
    let request = BillRequest {
        image_base64: Some("%%% not base64 %%%".to_string()),
        ..BillRequest::sample()
    };

    let resp = test::call_service(&app, post_bill(&request).to_request()).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert!(body
        .detail
        .starts_with("An error occurred: Failed to process image"));
}

#[actix_web::test]
async fn test_conversion_failure_is_500() {
    let fixture = Fixture::new();
    let converter: Arc<dyn Converter> = Arc::new(FailingConverter);
    let app = bill_app!(fixture, converter);

    let resp = test::call_service(&app, post_bill(&BillRequest::sample()).to_request()).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert!(body.detail.starts_with("Failed to convert DOCX to PDF"));
}

#[actix_web::test]
async fn test_missing_output_is_404() {
    let fixture = Fixture::new();
    let converter: Arc<dyn Converter> = Arc::new(SilentConverter);
    let app = bill_app!(fixture, converter);

    let resp = test::call_service(&app, post_bill(&BillRequest::sample()).to_request()).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert!(body.detail.starts_with("PDF file was not generated"));
}

#[actix_web::test]
async fn test_missing_field_is_422() {
    let fixture = Fixture::new();
    let app = bill_app!(fixture, MockConverter::new());
    let mut payload = serde_json::to_value(BillRequest::sample()).unwrap();
    payload.as_object_mut().unwrap().remove("renter_name");

    let resp = test::call_service(&app, post_bill(&payload).to_request()).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert!(body.detail.contains("renter_name"));
}

#[actix_web::test]
async fn test_null_image_is_treated_as_absent() {
    let fixture = Fixture::new();
    let app = bill_app!(fixture, MockConverter::new());
    let mut payload = serde_json::to_value(BillRequest::sample()).unwrap();
    payload["image_base64"] = serde_json::Value::Null;

    let resp = test::call_service(&app, post_bill(&payload).to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
}
