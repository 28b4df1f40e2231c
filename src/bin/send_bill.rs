use std::path::{Path, PathBuf};

use anyhow::Context as _;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use reqwest::header::CONTENT_TYPE;

use rent_bill_service::bill::BillRequest;

/// Post the reference bill to a running service and save the returned PDF.
#[derive(Parser, Debug)]
#[command(name = "send-bill", version)]
struct Cli {
    /// Bill endpoint.
    #[arg(long, default_value = "http://localhost:8000/generate-bill")]
    url: String,

    /// Image to embed in the bill.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Directory the downloaded PDF is written to.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

fn encode_image(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

/// Request body as printed to the terminal, with the image summarized.
fn printable(request: &BillRequest) -> anyhow::Result<String> {
    let mut value = serde_json::to_value(request)?;
    if let Some(image) = &request.image_base64 {
        value["image_base64"] =
            serde_json::Value::String(format!("[base64 image data: {} bytes]", image.len()));
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut request = BillRequest::sample();

    if let Some(path) = &cli.image {
        println!("Processing image: {}", path.display());
        match encode_image(path) {
            Ok(encoded) => {
                request.image_base64 = Some(encoded);
                println!("Image encoded to base64");
            }
            Err(e) => println!("Error encoding image: {e:#}\nProceeding without image"),
        }
    }

    println!("Sending bill to {}", cli.url);
    println!("Request data:\n{}", printable(&request)?);

    let client = reqwest::Client::new();
    let response = match client.post(&cli.url).json(&request).send().await {
        Ok(response) => response,
        Err(e) if e.is_connect() => {
            println!("\nError: could not connect to {}", cli.url);
            println!("Make sure the service is running (cargo run --bin rent-bill-service)");
            return Ok(());
        }
        Err(e) => return Err(e).context("request failed"),
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !status.is_success() {
        println!("\nError: request failed");
        println!("Status code: {}", status.as_u16());
        let body = response.text().await.context("read error body")?;
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
            Err(_) => println!("{body}"),
        }
        return Ok(());
    }

    if content_type != "application/pdf" {
        println!("\nError: response is not a PDF file");
        println!("Content-Type: {content_type}");
        println!("{}", response.text().await.context("read response body")?);
        return Ok(());
    }

    let pdf = response.bytes().await.context("read PDF body")?;
    let filename = format!(
        "downloaded_bill_{}.pdf",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let output = cli.output_dir.join(filename);
    std::fs::write(&output, &pdf).with_context(|| format!("write {}", output.display()))?;

    println!("\nBill generated successfully");
    println!("PDF saved as: {}", output.display());
    println!("File size: {:.2} KB", pdf.len() as f64 / 1024.0);
    println!("Content-Type: {content_type}");
    println!("Content-Length: {} bytes", pdf.len());
    Ok(())
}
