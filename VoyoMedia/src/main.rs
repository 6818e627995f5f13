use tracing::{error, info};
use voyoconfig::get_config;
use voyomedia::{MediaServerExt, MediaService};
use voyoserver::Server;
use voyoutils::TaskSupervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();

    let mut server = Server::new_configured();
    server.init_logging().await;

    server
        .add_route("/info", || async {
            serde_json::json!({"name": "VoyoMedia", "version": env!("CARGO_PKG_VERSION")})
        })
        .await;

    let supervisor = TaskSupervisor::new();
    let service = match MediaService::from_config(&config, supervisor.clone()) {
        Ok(service) => service,
        Err(e) => {
            error!("Unable to configure media service: {:#}", e);
            return Err(e);
        }
    };

    service.start_maintenance(&config);
    server.init_media_service(service).await;

    info!("Starting HTTP server...");
    server.start().await?;

    info!("VoyoMedia is ready");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    info!("Stopping background tasks...");
    supervisor.shutdown().await;
    Ok(())
}
