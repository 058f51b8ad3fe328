//! Expiring cache for the streaming server's TLS configuration.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use podlite_shared::errors::{PodliteError, PodliteResult};

/// How long loaded TLS material is served before it is reloaded.
pub const CERT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Loaded TLS material served to streaming clients.
///
/// Certificate parsing belongs to the embedding server; the shim only
/// caches the loaded bytes so certificates can rotate without a restart.
#[derive(Debug, Clone)]
pub struct StreamTlsConfig {
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,

    /// When present, client certificates are required and verified
    /// against this bundle.
    pub client_ca: Option<Vec<u8>>,
}

/// Source of TLS material, typically backed by files that can rotate.
pub trait TlsConfigLoader: Send + Sync {
    fn load(&self) -> PodliteResult<StreamTlsConfig>;
}

struct CachedConfig {
    config: Arc<StreamTlsConfig>,
    expires: Instant,
}

/// Cache serving a TLS configuration, regenerated lazily after expiry.
///
/// Concurrent handshakes may race to regenerate; the last writer wins.
/// The requirement is only that a non-expired, valid configuration is
/// eventually served, not that regeneration happens exactly once.
pub struct CertConfigCache {
    loader: Box<dyn TlsConfigLoader>,
    refresh_interval: Duration,
    cached: RwLock<Option<CachedConfig>>,
}

impl CertConfigCache {
    /// Cache over `loader`, refreshing every [`CERT_REFRESH_INTERVAL`].
    pub fn new(loader: Box<dyn TlsConfigLoader>) -> Self {
        Self::with_refresh_interval(loader, CERT_REFRESH_INTERVAL)
    }

    /// Cache over `loader` with a custom refresh interval.
    pub fn with_refresh_interval(loader: Box<dyn TlsConfigLoader>, interval: Duration) -> Self {
        Self {
            loader,
            refresh_interval: interval,
            cached: RwLock::new(None),
        }
    }

    /// Configuration for the next client handshake.
    pub fn config_for_client(&self) -> PodliteResult<Arc<StreamTlsConfig>> {
        {
            let cached = self
                .cached
                .read()
                .map_err(|e| PodliteError::Internal(format!("tls cache lock poisoned: {e}")))?;
            if let Some(entry) = cached.as_ref()
                && Instant::now() < entry.expires
            {
                return Ok(Arc::clone(&entry.config));
            }
        }

        // Loaded outside the lock: concurrent callers may both load, and
        // whichever writes last wins.
        let config = Arc::new(self.loader.load()?);
        let mut cached = self
            .cached
            .write()
            .map_err(|e| PodliteError::Internal(format!("tls cache lock poisoned: {e}")))?;
        *cached = Some(CachedConfig {
            config: Arc::clone(&config),
            expires: Instant::now() + self.refresh_interval,
        });
        Ok(config)
    }
}
