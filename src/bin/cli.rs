use grafana_backup::{app, config::Config};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().unwrap_or_else(|e| e.exit());
    app::init_tracing();

    app::run(&config).await?;
    Ok(())
}
