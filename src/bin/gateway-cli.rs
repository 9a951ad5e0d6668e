use clap::{Parser, Subcommand};
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::path::{Path, PathBuf};

use worker_gateway::config::load_config;
use worker_gateway::routing::Dispatcher;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the worker gateway", long_about = None)]
struct Cli {
    /// Gateway base URL
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API base URL
    #[arg(short, long, default_value = "http://localhost:8081")]
    admin_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a resource through the gateway
    Fetch {
        path: String,
        /// Accept header to send
        #[arg(long)]
        accept: Option<String>,
    },
    /// Show gateway status
    Status,
    /// List workers with health and session counts
    Workers,
    /// Show the responder tree
    Responders,
    /// Validate a config file offline and preview path resolution
    CheckConfig {
        file: PathBuf,
        /// Paths to resolve against the configured responders
        #[arg(long = "path")]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Fetch { path, accept } => {
            let url = format!("{}/{}", cli.url.trim_end_matches('/'), path.trim_start_matches('/'));
            let mut request = client.get(url);
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }
            let res = request.send().await?;
            let status = res.status();
            let content_type = res
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let body = res.bytes().await?;
            eprintln!("{} ({}, {} bytes)", status, content_type, body.len());
            println!("{}", String::from_utf8_lossy(&body));
        }
        Commands::Status => admin_get(&client, &cli.admin_url, "status").await?,
        Commands::Workers => admin_get(&client, &cli.admin_url, "workers").await?,
        Commands::Responders => admin_get(&client, &cli.admin_url, "responders").await?,
        Commands::CheckConfig { file, paths } => check_config(&file, &paths)?,
    }

    Ok(())
}

async fn admin_get(
    client: &reqwest::Client,
    admin_url: &str,
    endpoint: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let res = client
        .get(format!("{}/admin/{}", admin_url.trim_end_matches('/'), endpoint))
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn check_config(file: &Path, paths: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(file)?;
    println!(
        "{}: ok ({} workers, {} responders)",
        file.display(),
        config.workers.len(),
        config.responders.len()
    );

    let dispatcher = Dispatcher::from_config(&config.responders);
    for path in paths {
        match dispatcher.resolve(path) {
            Ok(resolution) => println!(
                "{} -> {} [{}] {}",
                path,
                resolution.responder.name,
                resolution.responder.media_type,
                resolution.responder.worker_request(&resolution.resource_id)
            ),
            Err(e) => println!("{} -> {}", path, e),
        }
    }
    Ok(())
}
