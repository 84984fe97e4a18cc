use coinsight::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    coinsight::init_tracing();

    let config = AppConfig::load()?;
    coinsight::run(config).await?;
    Ok(())
}
