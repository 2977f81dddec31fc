use dbserver::cli::CliArgs;
use dbserver::http::{shutdown_signal, AppState, Server};
use dbserver::{AppConfig, ConnectionRegistry};

#[tokio::main]
async fn main() -> dbserver::Result<()> {
    let args = CliArgs::parse();

    let config = AppConfig::resolve(args.config_file.as_ref())?;
    dbserver::logging::init(&config.logging)?;

    if args.check {
        println!("{}", config.to_json_masked()?);
        return Ok(());
    }

    log::info!("Starting dbserver {}", env!("CARGO_PKG_VERSION"));

    let registry = ConnectionRegistry::from_config(&config.dbserver);
    let reconcile_loop = registry.start(&config.dbserver).await;
    if log::log_enabled!(log::Level::Info) {
        for line in registry.render_status().await.lines() {
            log::info!("{}", line);
        }
    }

    if config.server.enabled {
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let server = Server::new(AppState::new(registry.clone(), config));
        if let Err(e) = server.serve(&addr).await {
            log::error!("Server error: {}", e);
        }
    } else {
        log::info!("HTTP server disabled, waiting for a shutdown signal");
        shutdown_signal().await;
    }

    log::info!("Shutting down...");
    if let Some(reconcile_loop) = reconcile_loop {
        reconcile_loop.stop().await;
    }
    registry.shutdown().await;

    Ok(())
}
