//! Producer-side notification commands.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use relay_core::notifier::{WebhookNotifier, DEFAULT_RELAY_URL};

#[derive(Subcommand)]
pub enum NotifyCommands {
    /// Announce that an answer is being produced
    Processing {
        /// Relay server URL
        #[arg(long, env = "RELAY_URL", default_value = DEFAULT_RELAY_URL)]
        url: String,
    },

    /// Deliver a completed answer
    Answer {
        /// Answer text
        text: String,

        /// Model that produced the answer
        #[arg(long)]
        model: Option<String>,

        /// Relay server URL
        #[arg(long, env = "RELAY_URL", default_value = DEFAULT_RELAY_URL)]
        url: String,
    },
}

pub async fn execute(cmd: NotifyCommands) -> Result<()> {
    let ack = match cmd {
        NotifyCommands::Processing { url } => {
            WebhookNotifier::with_url(&url).notify_processing().await?
        }
        NotifyCommands::Answer { text, model, url } => {
            WebhookNotifier::with_url(&url)
                .notify_answer(&text, model.as_deref())
                .await?
        }
    };

    println!(
        "{} {}",
        "✓".green().bold(),
        ack.message.unwrap_or_else(|| "Notification accepted".to_string())
    );
    Ok(())
}
