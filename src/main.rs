#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    newswire::run().await?;
    Ok(())
}
