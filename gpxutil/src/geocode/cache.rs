//! Cache persistant des géocodages inverses
//!
//! Format de fichier JSON "hybride": chaque entrée porte le résultat sérialisé
//! puis encodé en base64.
//!
//! ```json
//! {
//!   "cache_version": "1.0",
//!   "format": "hybrid_json_binary",
//!   "created_by": "gpxutil geocoding cache",
//!   "entries": {
//!     "47.6062,-122.3321": { "type": "nominatim.Location", "data": "eyJh...", "cached_at": "..." }
//!   },
//!   "metadata": { "total_entries": 1, "last_updated": "...", "cache_file": "..." }
//! }
//! ```
//!
//! Les mises à jour restent en mémoire; le fichier est réécrit en entier à la
//! fermeture (voir `RuntimeContext::shutdown`) ou sur `force_flush`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{GeocodeError, Location, ReverseGeocoder};

pub const CACHE_VERSION: &str = "1.0";
pub const CACHE_FORMAT: &str = "hybrid_json_binary";
pub const CREATED_BY: &str = "gpxutil geocoding cache";

/// Type d'une entrée contenant un `Location` encodé
pub const LOCATION_ENTRY: &str = "nominatim.Location";

/// Type d'une entrée de repli (texte de l'adresse seulement)
pub const STRING_ENTRY: &str = "string";

/// Erreurs d'accès au fichier de cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache file I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cache file JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Clé de cache: coordonnées formatées telles quelles (`-0.0` et `0.0` diffèrent)
pub fn cache_key(latitude: f64, longitude: f64) -> String {
    format!("{},{}", latitude, longitude)
}

/// Entrée du cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
    #[serde(default)]
    pub cached_at: String,
}

impl CacheEntry {
    /// Encode un résultat. En cas d'échec de sérialisation, seul le texte est gardé.
    pub fn encode(location: &Location) -> Self {
        let cached_at = now_iso();
        match serde_json::to_vec(location) {
            Ok(bytes) => Self {
                kind: LOCATION_ENTRY.to_string(),
                data: STANDARD.encode(bytes),
                cached_at,
            },
            Err(e) => {
                warn!(error = %e, "Could not serialize location, caching its text only");
                Self {
                    kind: STRING_ENTRY.to_string(),
                    data: location.to_string(),
                    cached_at,
                }
            }
        }
    }

    /// Décode une entrée. Les coordonnées servent aux entrées de repli.
    pub fn decode(&self, latitude: f64, longitude: f64) -> Option<Location> {
        match self.kind.as_str() {
            LOCATION_ENTRY => {
                let bytes = STANDARD
                    .decode(self.data.as_bytes())
                    .map_err(|e| warn!(error = %e, "Could not decode cache entry"))
                    .ok()?;
                serde_json::from_slice(&bytes)
                    .map_err(|e| warn!(error = %e, "Could not deserialize cached location"))
                    .ok()
            }
            STRING_ENTRY => Some(Location::new(self.data.clone(), latitude, longitude)),
            other => {
                warn!(kind = other, "Unknown cache entry type");
                None
            }
        }
    }
}

fn now_iso() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheMetadata {
    #[serde(default)]
    total_entries: usize,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    cache_file: Option<String>,
}

/// Fichier de cache tel qu'écrit sur disque.
///
/// Les entrées restent des valeurs JSON brutes: une entrée illisible ne
/// doit pas empêcher de charger les autres.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    cache_version: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    entries: BTreeMap<String, Value>,
    #[serde(default)]
    metadata: CacheMetadata,
}

fn read_cache_file(path: &Path) -> Result<CacheFile, CacheError> {
    let content = fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| CacheError::json(path, e))
}

/// Contenu en mémoire d'un fichier de cache
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
    dirty: bool,
}

impl CacheStore {
    /// Cache vide, non encore chargé
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Charge le fichier s'il existe. Un fichier illisible donne un cache vide.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::empty(path);

        if !store.path.exists() {
            debug!(path = %store.path.display(), "No cache file yet");
            return store;
        }

        match read_cache_file(&store.path) {
            Ok(file) => {
                store.entries = file.entries;
                info!(
                    path = %store.path.display(),
                    entries = store.entries.len(),
                    "Loaded geocoding cache"
                );
            }
            Err(e) => {
                warn!(error = %e, "Could not load cache file, starting empty");
            }
        }

        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Modifié depuis le dernier enregistrement
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Cherche un résultat. Une entrée indécodable est traitée comme absente.
    pub fn get(&self, latitude: f64, longitude: f64) -> Option<Location> {
        let key = cache_key(latitude, longitude);
        let raw = self.entries.get(&key)?;

        let entry: CacheEntry = serde_json::from_value(raw.clone())
            .map_err(|e| warn!(key = key.as_str(), error = %e, "Malformed cache entry"))
            .ok()?;
        entry.decode(latitude, longitude)
    }

    /// Enregistre un résultat (en mémoire seulement)
    pub fn insert(&mut self, latitude: f64, longitude: f64, location: &Location) {
        let key = cache_key(latitude, longitude);
        let entry = CacheEntry::encode(location);

        match serde_json::to_value(&entry) {
            Ok(value) => {
                self.entries.insert(key, value);
                self.dirty = true;
            }
            Err(e) => warn!(key = key.as_str(), error = %e, "Could not cache result"),
        }
    }

    /// Vide le cache en mémoire
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = true;
    }

    /// Réécrit le fichier complet
    pub fn save(&mut self) -> Result<(), CacheError> {
        let file = CacheFile {
            cache_version: Some(CACHE_VERSION.to_string()),
            format: Some(CACHE_FORMAT.to_string()),
            created_by: Some(CREATED_BY.to_string()),
            entries: self.entries.clone(),
            metadata: CacheMetadata {
                total_entries: self.entries.len(),
                last_updated: Some(now_iso()),
                cache_file: Some(self.path.display().to_string()),
            },
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&file).map_err(|e| CacheError::json(&self.path, e))?;
        fs::write(&self.path, json).map_err(|e| CacheError::io(&self.path, e))?;

        self.dirty = false;
        info!(path = %self.path.display(), entries = self.entries.len(), "Saved geocoding cache");
        Ok(())
    }
}

/// Informations sur un cache en mémoire
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub cache_file: PathBuf,
    pub keys: Vec<String>,
    pub format: &'static str,
    pub updated: bool,
}

/// Verrouille un store partagé (un verrou empoisonné reste utilisable)
pub(crate) fn lock_store(store: &Mutex<CacheStore>) -> MutexGuard<'_, CacheStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Géocodeur avec cache persistant.
///
/// Un succès est mis en cache; `Ok(None)` et les erreurs ne le sont jamais.
pub struct GeocodeCache<G> {
    store: Arc<Mutex<CacheStore>>,
    inner: G,
}

impl<G> GeocodeCache<G> {
    /// Enveloppe un géocodeur autour d'un store déjà chargé
    pub fn new(store: Arc<Mutex<CacheStore>>, inner: G) -> Self {
        Self { store, inner }
    }

    /// Charge le fichier puis enveloppe le géocodeur
    pub fn open(path: impl Into<PathBuf>, inner: G) -> Self {
        Self::new(Arc::new(Mutex::new(CacheStore::load(path))), inner)
    }

    pub fn store(&self) -> &Arc<Mutex<CacheStore>> {
        &self.store
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn path(&self) -> PathBuf {
        lock_store(&self.store).path().to_path_buf()
    }

    /// Vide le cache et réécrit immédiatement le fichier
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut store = lock_store(&self.store);
        store.clear();
        store.save()?;
        info!(path = %store.path().display(), "Cleared geocoding cache");
        Ok(())
    }

    /// Écrit le fichier tout de suite
    pub fn force_flush(&self) -> Result<(), CacheError> {
        lock_store(&self.store).save()
    }

    pub fn stats(&self) -> CacheStats {
        let store = lock_store(&self.store);
        CacheStats {
            entries: store.len(),
            cache_file: store.path().to_path_buf(),
            keys: store.keys().map(str::to_string).collect(),
            format: CACHE_FORMAT,
            updated: store.is_dirty(),
        }
    }
}

fn is_error_result(location: &Location) -> bool {
    location.address.starts_with("Error:")
}

impl<G: ReverseGeocoder> ReverseGeocoder for GeocodeCache<G> {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Location>, GeocodeError> {
        let key = cache_key(latitude, longitude);

        if let Some(location) = lock_store(&self.store).get(latitude, longitude) {
            info!(key = key.as_str(), "Cache hit");
            return Ok(Some(location));
        }

        // Le verrou n'est pas tenu pendant l'appel au fournisseur
        info!(key = key.as_str(), "Cache miss");
        let result = self.inner.reverse(latitude, longitude)?;

        if let Some(location) = result.as_ref().filter(|l| !is_error_result(l)) {
            lock_store(&self.store).insert(latitude, longitude, location);
            debug!(key = key.as_str(), "Stored result in memory");
        }

        Ok(result)
    }
}

/// Statistiques lues directement dans un fichier de cache
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileStats {
    pub exists: bool,
    pub entries: usize,
    pub cache_version: Option<String>,
    pub format: String,
    pub last_updated: Option<String>,
    pub file_size: Option<u64>,
    pub error: Option<String>,
}

/// Statistiques d'un fichier de cache (sans le charger dans un store)
pub fn file_stats(path: &Path) -> FileStats {
    let mut stats = FileStats {
        format: CACHE_FORMAT.to_string(),
        ..Default::default()
    };

    if !path.exists() {
        return stats;
    }
    stats.exists = true;

    match read_cache_file(path) {
        Ok(file) => {
            stats.entries = file.entries.len();
            stats.cache_version = file.cache_version;
            if let Some(format) = file.format {
                stats.format = format;
            }
            stats.last_updated = file.metadata.last_updated;
            stats.file_size = fs::metadata(path).ok().map(|m| m.len());
        }
        Err(e) => stats.error = Some(format!("Could not read cache file: {}", e)),
    }

    stats
}

/// Entrée décrite pour l'inspection
#[derive(Debug, Clone)]
pub struct InspectedEntry {
    pub key: String,
    pub description: String,
}

/// Contenu d'un fichier de cache, pour le débogage
#[derive(Debug, Clone)]
pub struct Inspection {
    pub cache_version: Option<String>,
    pub format: Option<String>,
    pub created_by: Option<String>,
    pub last_updated: Option<String>,
    pub total_entries: usize,
    pub entries: Vec<InspectedEntry>,
}

fn describe_entry(value: &Value) -> String {
    match serde_json::from_value::<CacheEntry>(value.clone()) {
        Ok(entry) if entry.kind == LOCATION_ENTRY => {
            format!("{} (base64 encoded) - cached at {}", LOCATION_ENTRY, entry.cached_at)
        }
        Ok(entry) => {
            let preview: String = entry.data.chars().take(50).collect();
            format!("{} - {}...", entry.kind, preview)
        }
        Err(_) => {
            let preview: String = value.to_string().chars().take(50).collect();
            format!("unknown - {}...", preview)
        }
    }
}

/// Lit un fichier de cache pour inspection. `Ok(None)` si le fichier n'existe pas.
pub fn inspect(path: &Path) -> Result<Option<Inspection>, CacheError> {
    if !path.exists() {
        return Ok(None);
    }

    let file = read_cache_file(path)?;
    let entries = file
        .entries
        .iter()
        .map(|(key, value)| InspectedEntry {
            key: key.clone(),
            description: describe_entry(value),
        })
        .collect();

    Ok(Some(Inspection {
        cache_version: file.cache_version,
        format: file.format,
        created_by: file.created_by,
        last_updated: file.metadata.last_updated,
        total_entries: file.metadata.total_entries,
        entries,
    }))
}

/// Supprime le fichier de cache. Retourne `false` s'il n'existait pas.
pub fn remove_cache_file(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Removed cache file");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}
