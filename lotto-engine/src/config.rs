use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "lotto.json";
pub const SECRET_ENV: &str = "LOTTO_TOKEN_SECRET";
const DEFAULT_SECRET: &str = "change-me-lotto-token-secret";
/// Un an.
pub const MAX_TOKEN_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub token_secret: String,
    pub token_ttl_seconds: u64,
    pub generation_hot_size: usize,
    pub generation_cold_size: usize,
    pub summary_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: lotto_db::db::db_path(),
            token_secret: DEFAULT_SECRET.to_string(),
            token_ttl_seconds: 24 * 60 * 60,
            generation_hot_size: 10,
            generation_cold_size: 10,
            summary_size: 5,
        }
    }
}

impl AppConfig {
    /// `explicit` doit exister ; sinon `lotto.json` du répertoire courant s'il est présent,
    /// sinon les valeurs par défaut. `LOTTO_TOKEN_SECRET` remplace la clé.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        let config = config.with_secret_override(std::env::var(SECRET_ENV).ok());
        config.validate()?;
        if config.token_secret == DEFAULT_SECRET {
            log::warn!("Clé de signature par défaut utilisée, définissez {}", SECRET_ENV);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Impossible de lire {:?}", path))?;
        let config: AppConfig = serde_json::from_str(&json)
            .with_context(|| format!("JSON invalide dans {:?}", path))?;
        Ok(config)
    }

    pub fn with_secret_override(mut self, secret: Option<String>) -> Self {
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            self.token_secret = secret;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.token_secret.is_empty() {
            bail!("token_secret ne peut pas être vide");
        }
        if self.token_ttl_seconds == 0 {
            bail!("token_ttl_seconds doit être positif");
        }
        if self.token_ttl_seconds > MAX_TOKEN_TTL_SECONDS {
            bail!(
                "token_ttl_seconds trop grand : {} (max {})",
                self.token_ttl_seconds,
                MAX_TOKEN_TTL_SECONDS
            );
        }
        Ok(())
    }
}
