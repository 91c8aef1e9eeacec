mod cli;
mod config;

use std::sync::Arc;

use bridge_gateway::RunnerFactories;
use bridge_runner::{ProviderAAdapter, ProviderAConfig, ProviderBAdapter, ProviderBConfig, Runner};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let resolved = match config::resolve(&cli) {
        Ok(resolved) => resolved,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        host = %resolved.gateway.host,
        port = resolved.gateway.port,
        agent = %resolved.gateway.agent_name,
        "starting bridge gateway"
    );

    let factories = build_factories(&resolved);

    if let Err(err) = bridge_gateway::serve(resolved.gateway, factories, shutdown_signal()).await {
        tracing::error!(%err, "gateway exited with error");
        std::process::exit(1);
    }
}

fn build_factories(resolved: &config::ResolvedConfig) -> RunnerFactories {
    let session_root_a = resolved.session_root.join("provider-a");
    let agent_a_config = ProviderAConfig {
        binary: resolved.agent_a_binary.clone(),
        max_turns: resolved.agent_a_max_turns,
        tools: resolved.agent_a_tools.clone(),
    };
    let timeout = resolved.request_timeout;

    let session_root_b = resolved.session_root.join("provider-b");
    let image_temp_dir = resolved.session_root.join("provider-b-images");
    let agent_b_config = ProviderBConfig {
        binary: resolved.agent_b_binary.clone(),
        model: resolved.agent_b_model.clone(),
        image_temp_dir: image_temp_dir.clone(),
    };

    let model_base_url = resolved.model_base_url.clone();
    let http_client = reqwest::Client::new();

    RunnerFactories {
        provider_a: Arc::new(move || {
            Box::new(bridge_runner::spawn_subprocess_runner(
                ProviderAAdapter::new(agent_a_config.clone()),
                session_root_a.clone(),
                timeout,
            )) as Box<dyn Runner>
        }),
        provider_b: Arc::new(move || {
            Box::new(bridge_runner::spawn_subprocess_runner(
                ProviderBAdapter::new(agent_b_config.clone()),
                session_root_b.clone(),
                timeout,
            )) as Box<dyn Runner>
        }),
        provider_c: Arc::new(move || {
            Box::new(bridge_runner::spawn_http_runner(http_client.clone(), model_base_url.clone(), timeout)) as Box<dyn Runner>
        }),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
