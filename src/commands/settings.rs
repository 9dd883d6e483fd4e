use anyhow::{anyhow, Result};
use clap::Subcommand;

use crate::services::state::{AppState, API_KEY_ENV};

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Show the current settings. The API key itself is never printed.
    Show,
    /// Store the Gemini API key (keychain, or encrypted in the database).
    SetKey { api_key: String },
    /// Remove the stored API key.
    ClearKey,
    /// Choose the Gemini model used for image extraction.
    SetModel { model: String },
    /// Check that the configured API key is accepted.
    TestKey,
    /// List recent extraction attempts.
    Logs {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

pub async fn run_settings(state: &mut AppState, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let key_source = if std::env::var(API_KEY_ENV).is_ok() {
                format!("environment ({})", API_KEY_ENV)
            } else if let Some(stored) = &state.settings.gemini_api_key {
                if stored.starts_with("keychain:") {
                    "keychain".to_string()
                } else {
                    "database (encrypted)".to_string()
                }
            } else {
                "not set".to_string()
            };
            println!("data dir   {}", state.data_dir().display());
            println!("model      {}", state.settings.gemini_model);
            println!("api key    {}", key_source);
        }
        SettingsCommand::SetKey { api_key } => {
            state.save_api_key(&api_key)?;
            tracing::info!("api key stored");
        }
        SettingsCommand::ClearKey => {
            if state.clear_api_key()? {
                println!("API key removed");
            } else {
                println!("No API key stored");
            }
        }
        SettingsCommand::SetModel { model } => {
            state.save_model(&model)?;
            tracing::info!(model = %state.settings.gemini_model, "model stored");
        }
        SettingsCommand::TestKey => {
            let ok = state
                .extractor()?
                .test_key()
                .await
                .map_err(|e| anyhow!("Connection failed: {}", e))?;
            if !ok {
                return Err(anyhow!("API key was rejected"));
            }
            println!("API key accepted");
        }
        SettingsCommand::Logs { limit } => {
            for log in state.db.get_recent_logs(limit)? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    log.created_at,
                    log.process_type,
                    log.status,
                    log.source_hash.as_deref().unwrap_or("-"),
                    log.message.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}
