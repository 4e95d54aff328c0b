//! Contexte d'exécution: ressources partagées et fermeture explicite
//!
//! Créé une fois dans `main`, il détient le limiteur de débit commun et la
//! liste de tous les caches ouverts. `shutdown` enregistre les caches modifiés
//! et doit être appelé une seule fois, que la commande ait réussi ou non.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::geocode::cache::lock_store;
use crate::geocode::{CacheStore, GeocodeCache, RateLimited, RateLimiter};

/// Bilan de l'enregistrement des caches à la fermeture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Caches écrits
    pub saved: usize,
    /// Caches dont l'écriture a échoué
    pub failed: usize,
    /// Caches inchangés, non réécrits
    pub unchanged: usize,
}

#[derive(Debug, Default)]
pub struct RuntimeContext {
    limiter: Arc<RateLimiter>,
    caches: Mutex<Vec<Arc<Mutex<CacheStore>>>>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limiteur partagé par tous les géocodeurs du contexte
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Enveloppe un géocodeur dans le limiteur partagé
    pub fn rate_limited<G>(&self, call_site: &str, window: Duration, inner: G) -> RateLimited<G> {
        RateLimited::new(self.rate_limiter(), call_site, window, inner)
    }

    /// Ouvre un cache persistant et l'inscrit pour l'enregistrement final
    pub fn persistent_cache<G>(&self, path: impl Into<PathBuf>, inner: G) -> GeocodeCache<G> {
        let store = Arc::new(Mutex::new(CacheStore::load(path)));
        self.caches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&store));
        GeocodeCache::new(store, inner)
    }

    /// Nombre de caches inscrits
    pub fn cache_count(&self) -> usize {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Enregistre chaque cache modifié dans son fichier.
    ///
    /// Un échec d'écriture est journalisé et compté, jamais retenté.
    pub fn shutdown(self) -> FlushSummary {
        let caches = self.caches.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut summary = FlushSummary::default();

        for store in &caches {
            let mut store = lock_store(store);
            if !store.is_dirty() {
                debug!(path = %store.path().display(), "Cache unchanged, not saving");
                summary.unchanged += 1;
                continue;
            }

            match store.save() {
                Ok(()) => summary.saved += 1,
                Err(e) => {
                    error!(error = %e, "Failed to save cache");
                    summary.failed += 1;
                }
            }
        }

        if summary.saved > 0 {
            info!(saved = summary.saved, "Saved cache file(s) on exit");
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{GeocodeError, Location, ReverseGeocoder};
    use tempfile::TempDir;

    struct Fixed;

    impl ReverseGeocoder for Fixed {
        fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Location>, GeocodeError> {
            Ok(Some(Location::new("fixed", latitude, longitude)))
        }
    }

    #[test]
    fn test_shutdown_saves_only_dirty_caches() {
        let dir = TempDir::new().unwrap();
        let used = dir.path().join("used.json");
        let untouched = dir.path().join("untouched.json");

        let context = RuntimeContext::new();
        let cache = context.persistent_cache(&used, Fixed);
        let _idle = context.persistent_cache(&untouched, Fixed);
        assert_eq!(context.cache_count(), 2);

        cache.reverse(1.0, 2.0).unwrap();

        let summary = context.shutdown();
        assert_eq!(
            summary,
            FlushSummary {
                saved: 1,
                failed: 0,
                unchanged: 1
            }
        );
        assert!(used.exists());
        assert!(!untouched.exists());
    }

    #[test]
    fn test_shutdown_counts_write_failures() {
        let dir = TempDir::new().unwrap();
        // Un fichier à la place du répertoire parent rend l'écriture impossible
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let context = RuntimeContext::new();
        let cache = context.persistent_cache(blocker.join("cache.json"), Fixed);
        cache.reverse(1.0, 2.0).unwrap();

        let summary = context.shutdown();
        assert_eq!(summary.saved, 0);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_rate_limited_shares_limiter() {
        let context = RuntimeContext::new();
        let a = context.rate_limited("site", Duration::from_secs(60), Fixed);
        let b = context.rate_limited("other", Duration::from_secs(60), Fixed);

        a.reverse(1.0, 2.0).unwrap();
        b.reverse(1.0, 2.0).unwrap();

        // Le même site d'appel est déjà réservé dans le limiteur partagé
        assert!(context.rate_limiter().reserve("site", Duration::from_secs(60)) > Duration::ZERO);
        assert_eq!(context.rate_limiter().reserve("fresh", Duration::from_secs(60)), Duration::ZERO);
    }
}
