mod host;
mod terminal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
