#[tokio::main]
async fn main() -> anyhow::Result<()> {
    blister_monitor_lib::run().await
}
