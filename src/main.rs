// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use the_lattice::config::{load_and_validate_config, Config, Runtime, RuntimeBuilder};
use the_lattice::protocol::{Client, Node, Server, Side};

const USAGE: &str = "Usage: the-lattice <serve|connect|sweep> <config.yaml|config.toml>";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let (command, path) = match args.as_slice() {
        [_, command, path] => (command.as_str(), path.as_str()),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let config = load_and_validate_config(path).with_context(|| format!("loading {}", path))?;
    let runtime = RuntimeBuilder::from_config(&config).context("building runtime")?;

    match command {
        "serve" => serve(&config, &runtime).await,
        "connect" => connect(&config, &runtime).await,
        "sweep" => sweep(runtime).await,
        other => {
            eprintln!("Unknown command '{}'\n{}", other, USAGE);
            std::process::exit(2);
        }
    }
}

/// Publish the runtime's space and processors on `node`.
fn publish(node: &Node, runtime: &Runtime) -> Result<()> {
    node.register_space(runtime.space().clone())?;
    for processor in runtime.processors() {
        node.register_processor(processor.clone())?;
    }
    Ok(())
}

async fn serve(config: &Config, runtime: &Runtime) -> Result<()> {
    let node = Node::with_config(Side::Server, &config.node);
    publish(&node, runtime)?;
    let server = Server::start_with(node, config.node.socket_address())
        .await
        .with_context(|| format!("listening on {}", config.node.socket_address()))?;
    tracing::info!(address = %server.local_addr(), "serving; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}

async fn connect(config: &Config, runtime: &Runtime) -> Result<()> {
    let node = Node::with_config(Side::Client, &config.node);
    publish(&node, runtime)?;
    let client = Client::connect_with(node, config.node.socket_address())
        .await
        .with_context(|| format!("connecting to {}", config.node.socket_address()))?;
    tracing::info!(server = %client.server_addr(), "connected; press Ctrl-C to stop");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal?,
        _ = wait_for_disconnect(&client) => tracing::warn!("server closed the connection"),
    }
    client.stop();
    Ok(())
}

async fn wait_for_disconnect(client: &Client) {
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(250));
    while client.is_connected() {
        interval.tick().await;
    }
}

async fn sweep(runtime: Runtime) -> Result<()> {
    let completed = tokio::task::spawn_blocking(move || runtime.run_sweep()).await?;
    if !completed {
        bail!("sweep failed");
    }
    tracing::info!("sweep completed");
    Ok(())
}
