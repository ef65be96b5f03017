#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ciris_cli::run().await
}
