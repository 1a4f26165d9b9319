#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pomodoro_engine::run().await
}
