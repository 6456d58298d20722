use crate::agent::Agent;
use crate::kube::{ConnectorConfig, KubeAgentError, KubernetesConnector};
use crate::server::Server;
use dotenv::dotenv;
use environment::Environment;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod agent;
mod environment;
mod kube;
mod server;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            std::env::var("LOGGING_LEVEL")
                .ok()
                .and_then(|level| EnvFilter::try_new(level).ok())
        })
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    // RUST_LOG wins over LOGGING_LEVEL, e.g. RUST_LOG=debug cargo run
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Kubernetes tool agent");

    let env = Environment::new();

    let connector = Arc::new(KubernetesConnector::new(ConnectorConfig {
        credentials: env.credential_mode(),
        kubectl_path: env.kubectl_path.clone(),
        helm_path: env.helm_path.clone(),
    }));

    match connector.connect().await {
        Ok(()) => info!("Connected to Kubernetes"),
        Err(e @ KubeAgentError::Configuration(_)) => {
            error!("Failed to load Kubernetes configuration: {}", e);
            std::process::exit(1);
        }
        Err(e) => warn!("Kubernetes connection check failed: {}", e),
    }

    let agent = match Agent::new(env.openai_api_key, connector.clone()) {
        Ok(agent) => agent,
        Err(e) => {
            error!("Failed to initialize agent: {}", e);
            std::process::exit(1);
        }
    };

    let server = Arc::new(Server::new(
        agent,
        connector.clone(),
        env.server_host.clone(),
        env.chat_api_key,
    ));

    info!("Server initialized, listening on {}", env.server_host);

    tokio::select! {
        result = server.listen() => {
            if let Err(e) = result {
                error!("Failed to start server: {}", e);
                connector.cleanup().await;
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    let result = connector.cleanup().await;
    info!("{}", result.message().unwrap_or("Cleanup finished"));
}
