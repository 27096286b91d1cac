//! Explorer live-update service - Main entry point

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use dcr_explorer::{
    api::ApiServer,
    cli,
    config::{Config, LoggingConfig},
    services::LiveServices,
    templates::TemplateStore,
};

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::parse_args();

    let mut config = match &args.config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_cli_overrides(&args);
    config.validate()?;

    init_tracing(&config.logging);
    info!("Starting explorer live-update service");

    // The block and mempool monitors publish through `services.updater`.
    let services = LiveServices::start(&config);

    // Templates belong to the page renderer; a missing views directory only
    // disables reloads.
    let _templates = match TemplateStore::load(&config.templates) {
        Ok(templates) => {
            let templates = Arc::new(templates);
            if config.templates.reload_on_sighup {
                start_reload_listener(templates.clone())?;
            }
            Some(templates)
        }
        Err(e) => {
            warn!("Page templates unavailable: {}", e);
            None
        }
    };

    let server = services.api_server();
    let listener = ApiServer::bind(&config.listen_address()).await?;

    let shutdown_hub = services.hub.clone();
    server
        .serve(listener, async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Shutdown requested");
            shutdown_hub.stop().await;
        })
        .await?;

    services.shutdown().await?;
    info!("Explorer stopped");
    Ok(())
}

#[cfg(unix)]
fn start_reload_listener(templates: Arc<TemplateStore>) -> anyhow::Result<()> {
    let triggers = dcr_explorer::templates::sighup_triggers()?;
    dcr_explorer::templates::spawn_reload_listener(templates, triggers);
    Ok(())
}

#[cfg(not(unix))]
fn start_reload_listener(_templates: Arc<TemplateStore>) -> anyhow::Result<()> {
    warn!("Template reload on signal is only supported on unix");
    Ok(())
}
