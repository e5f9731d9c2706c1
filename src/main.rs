mod config;
mod crawler;
mod sources;
mod storage;

use config::Config;
use crawler::service::ScrapingService;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;
    let mut service = ScrapingService::new(cfg).await?;
    let reports = service.run().await?;

    println!("\n==============================");
    for report in &reports {
        println!(
            "{} / {}: {:?} - {} pages, {} inserted, {} updated",
            report.source,
            report.city,
            report.outcome,
            report.pages,
            report.inserted,
            report.updated
        );
    }
    println!("TOTAL LISTINGS STORED: {}", service.total_stored().await?);
    println!("==============================\n");

    Ok(())
}
