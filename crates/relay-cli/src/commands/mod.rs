//! CLI command definitions and handlers.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod notify;
pub mod serve;

/// Live answer relay - webhook in, push stream out
#[derive(Parser)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve(serve::ServeArgs),

    /// Post a notification to a running relay server
    #[command(subcommand)]
    Notify(notify::NotifyCommands),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve(args) => serve::execute(args).await,
            Commands::Notify(cmd) => notify::execute(cmd).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["relay", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let config = args.server_config();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.heartbeat_interval.as_secs(), 15);
    }

    #[test]
    fn test_notify_answer_args() {
        let cli =
            Cli::try_parse_from(["relay", "notify", "answer", "B=2", "--model", "gpt"]).unwrap();
        let Commands::Notify(notify::NotifyCommands::Answer { text, model, .. }) = cli.command
        else {
            panic!("expected notify answer");
        };
        assert_eq!(text, "B=2");
        assert_eq!(model.as_deref(), Some("gpt"));
    }
}
