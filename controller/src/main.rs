mod board;
mod control;
mod host;
mod ir;
mod mqtt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
