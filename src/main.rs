#[actix_web::main]
async fn main() -> std::io::Result<()> {
    rent_bill_service::run().await
}
