use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::models::Settings;
use crate::services::crypto;
use crate::services::gemini::{GeminiExtractor, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::services::store::InvoiceStore;

pub const DB_FILE: &str = "invoicer.sqlite";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

pub const SETTING_API_KEY: &str = "gemini_api_key";
pub const SETTING_MODEL: &str = "gemini_model";

pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    data_dir: PathBuf,
}

impl AppState {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| anyhow!("Create data dir {}: {}", data_dir.display(), e))?;
        let db = Database::new(data_dir.join(DB_FILE))?;
        let settings = load_settings(&db);
        tracing::debug!(data_dir = %data_dir.display(), model = %settings.gemini_model, "state opened");
        Ok(AppState {
            db,
            settings,
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store(&self) -> InvoiceStore<'_> {
        InvoiceStore::new(&self.db)
    }

    pub fn save_api_key(&mut self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(anyhow!("API key is empty"));
        }
        let protected = crypto::protect_api_key(api_key)?;
        self.db.set_setting(SETTING_API_KEY, &protected)?;
        self.settings.gemini_api_key = Some(protected);
        Ok(())
    }

    /// Removes the stored key and its keychain entry. Returns false when no
    /// key was stored.
    pub fn clear_api_key(&mut self) -> Result<bool> {
        let Some(stored) = self.settings.gemini_api_key.take() else {
            return Ok(false);
        };
        if let Err(err) = crypto::forget_api_key(&stored) {
            tracing::warn!(error = %err, "stored key could not be cleaned up");
        }
        self.db.delete_setting(SETTING_API_KEY)?;
        Ok(true)
    }

    pub fn save_model(&mut self, model: &str) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            return Err(anyhow!("Model name is empty"));
        }
        self.db.set_setting(SETTING_MODEL, model)?;
        self.settings.gemini_model = model.to_string();
        Ok(())
    }

    /// The environment wins over the stored key.
    pub fn api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }
        let stored = self
            .settings
            .gemini_api_key
            .as_ref()
            .ok_or_else(|| anyhow!("Gemini API key missing; set {} or run `invoicer settings set-key`", API_KEY_ENV))?;
        crypto::reveal_api_key(stored)
    }

    pub fn extractor(&self) -> Result<GeminiExtractor> {
        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(GeminiExtractor::new(self.api_key()?, &self.settings.gemini_model).with_base_url(base_url))
    }
}

fn load_settings(db: &Database) -> Settings {
    let gemini_api_key = db.get_setting(SETTING_API_KEY).ok().flatten();
    let gemini_model = db
        .get_setting(SETTING_MODEL)
        .ok()
        .flatten()
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    Settings {
        gemini_api_key,
        gemini_model,
    }
}
