//! Configuration: variables d'environnement, fichier JSON optionnel, options CLI
//!
//! Ordre de priorité (du plus faible au plus fort): valeurs par défaut,
//! environnement (`.env` compris), fichier `--config`, options de la ligne de commande.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "gpxutil";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_RATE_LIMIT_SECS: f64 = 3.0;
pub const CACHE_FILE_NAME: &str = "geocoding_cache.json";

/// Configuration résolue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Fichier du cache de géocodage
    pub cache_file: PathBuf,

    /// User agent envoyé à Nominatim
    pub user_agent: String,

    /// Langue des adresses (`accept-language`)
    pub language: String,

    /// URL de base du service Nominatim
    pub nominatim_url: String,

    /// Intervalle minimal entre deux appels, en secondes
    pub rate_limit_secs: f64,
}

/// Fichier de configuration JSON: tous les champs sont optionnels
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub cache_file: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub language: Option<String>,
    pub nominatim_url: Option<String>,
    pub rate_limit_secs: Option<f64>,
}

/// Emplacement par défaut du cache: répertoire cache de l'utilisateur
pub fn default_cache_file() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("gpxutil").join(CACHE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CACHE_FILE_NAME))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_file: default_cache_file(),
            user_agent: DEFAULT_USER_AGENT.into(),
            language: DEFAULT_LANGUAGE.into(),
            nominatim_url: DEFAULT_NOMINATIM_URL.into(),
            rate_limit_secs: DEFAULT_RATE_LIMIT_SECS,
        }
    }
}

impl Config {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            cache_file: get("GPXUTIL_CACHE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_file),
            user_agent: get("GPXUTIL_USER_AGENT").unwrap_or(defaults.user_agent),
            language: get("GPXUTIL_LANGUAGE").unwrap_or(defaults.language),
            nominatim_url: get("GPXUTIL_NOMINATIM_URL").unwrap_or(defaults.nominatim_url),
            rate_limit_secs: get("GPXUTIL_RATE_LIMIT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_secs),
        }
    }

    /// Lit un fichier de configuration JSON
    pub fn load(path: &Path) -> Result<ConfigFile> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Applique les valeurs présentes dans un fichier de configuration
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.cache_file {
            self.cache_file = v;
        }
        if let Some(v) = file.user_agent {
            self.user_agent = v;
        }
        if let Some(v) = file.language {
            self.language = v;
        }
        if let Some(v) = file.nominatim_url {
            self.nominatim_url = v;
        }
        if let Some(v) = file.rate_limit_secs {
            self.rate_limit_secs = v;
        }
    }

    /// Applique les options de la ligne de commande
    pub fn apply_overrides(&mut self, cache_file: Option<PathBuf>, rate_limit_secs: Option<f64>) {
        if let Some(v) = cache_file {
            self.cache_file = v;
        }
        if let Some(v) = rate_limit_secs {
            self.rate_limit_secs = v;
        }
    }

    /// Configuration complète: environnement, puis fichier, puis CLI
    pub fn resolve(
        config_path: Option<&Path>,
        cache_file: Option<PathBuf>,
        rate_limit_secs: Option<f64>,
    ) -> Result<Self> {
        let mut config = Self::from_env();
        if let Some(path) = config_path {
            config.apply_file(Self::load(path)?);
        }
        config.apply_overrides(cache_file, rate_limit_secs);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if Duration::try_from_secs_f64(self.rate_limit_secs).is_err() {
            bail!(
                "Invalid rate limit: {} (expected a non-negative number of seconds)",
                self.rate_limit_secs
            );
        }
        if self.user_agent.trim().is_empty() {
            bail!("User agent must not be empty");
        }
        Ok(())
    }

    /// Intervalle minimal entre deux appels au fournisseur (valeur vérifiée par `validate`)
    pub fn rate_limit_window(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_limit_secs).unwrap_or_default()
    }
}
