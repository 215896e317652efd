//! Web server command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use relay_web::ServerConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, env = "RELAY_PORT", default_value = "3000")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, env = "RELAY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Seconds between heartbeat frames on each push connection
    #[arg(long, env = "RELAY_HEARTBEAT_SECS", default_value = "15", value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_secs: u64,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ServeArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
        }
    }
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = args.server_config();
    let base = format!("http://{}", config.addr());

    println!();
    println!("  {} {}", "Relay".cyan().bold(), "Live Answer Server".bold());
    println!();
    println!("  {}    {}/api/webhook", "Webhook".green(), base);
    println!("  {}     {}/api/stream", "Stream".green(), base);
    println!("  {}     {}/api/latest", "Latest".green(), base);
    println!("  {}  ws://{}/ws", "WebSocket".green(), config.addr());
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    relay_web::run_server(config).await?;

    Ok(())
}
