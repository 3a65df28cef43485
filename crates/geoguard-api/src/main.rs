//! Binary entrypoint for the GeoGuard API server.
use geoguard_api::{run, ServiceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("geoguard_api=info,geoguard_policy=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Listen address and config paths come from GEOGUARD_* variables
    let config = ServiceConfig::from_env()?;
    run(config).await?;
    Ok(())
}
