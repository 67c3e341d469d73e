#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pcb_inspect::run().await
}
