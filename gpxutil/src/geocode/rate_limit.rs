//! Limiteur de débit par site d'appel
//!
//! Chaque site d'appel (ex: `nominatim.reverse`) garde l'instant de sa dernière
//! invocation. Un appel trop proche du précédent attend le reste de la fenêtre;
//! rien n'est jamais rejeté.
//!
//! Le créneau est réservé sous le verrou puis l'attente se fait hors verrou:
//! deux sites différents ne se ralentissent jamais l'un l'autre.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{GeocodeError, Location, ReverseGeocoder};

/// Registre partagé des derniers appels
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_calls: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Réserve le prochain créneau du site d'appel et retourne l'attente nécessaire
    pub fn reserve(&self, call_site: &str, window: Duration) -> Duration {
        let mut last_calls = self
            .last_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        let slot = match last_calls.get(call_site) {
            Some(&last) if now.duration_since(last) < window => last + window,
            _ => now,
        };
        last_calls.insert(call_site.to_string(), slot);

        slot.saturating_duration_since(now)
    }

    /// Bloque jusqu'à ce que le site d'appel puisse s'exécuter.
    ///
    /// Retourne la durée attendue.
    pub fn acquire(&self, call_site: &str, window: Duration) -> Duration {
        let wait = self.reserve(call_site, window);
        if wait.is_zero() {
            trace!(call_site, "Rate limit: no wait");
        } else {
            debug!(call_site, wait_secs = wait.as_secs_f64(), "Rate limiting: sleeping");
            thread::sleep(wait);
        }
        wait
    }
}

/// Géocodeur dont les appels sont espacés d'au moins `window`
pub struct RateLimited<G> {
    limiter: Arc<RateLimiter>,
    call_site: String,
    window: Duration,
    inner: G,
}

impl<G> RateLimited<G> {
    pub fn new(limiter: Arc<RateLimiter>, call_site: impl Into<String>, window: Duration, inner: G) -> Self {
        Self {
            limiter,
            call_site: call_site.into(),
            window,
            inner,
        }
    }

    pub fn call_site(&self) -> &str {
        &self.call_site
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: ReverseGeocoder> ReverseGeocoder for RateLimited<G> {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Location>, GeocodeError> {
        self.limiter.acquire(&self.call_site, self.window);
        self.inner.reverse(latitude, longitude)
    }
}
